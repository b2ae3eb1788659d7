//! Request parameter model and resolution
//!
//! The assistance service accepts a small, fixed set of request parameters
//! (data types, constellations, position, time accuracy). This module models
//! them as a closed set of typed optional fields, merges per-invocation
//! overrides over stored defaults, and produces the canonical fingerprint
//! used to decide whether cached data still matches a request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced while validating request parameters
#[derive(Debug, Error)]
pub enum ParameterError {
    /// The parameter name is not recognized
    #[error("Unknown parameter '{0}'; valid parameters are: data, gnss, lat, lon, alt, pacc, tacc, latency")]
    UnknownKey(String),

    /// A list value contains an entry outside the allowed choices
    #[error("Unknown value '{value}' for '{key}'; valid choices are: {choices}")]
    UnknownValue {
        key: &'static str,
        value: String,
        choices: &'static str,
    },

    /// A numeric value could not be parsed
    #[error("Invalid value '{value}' for '{key}'; not a number")]
    NotANumber { key: &'static str, value: String },

    /// A numeric value is outside its allowed range
    #[error("Invalid value '{value}' for '{key}'; not in [{min}, {max}]")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Assistance data types offered by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Ephemeris
    Eph,
    /// Almanac
    Alm,
    /// Auxiliary (ionosphere, UTC, health)
    Aux,
    /// Position aiding
    Pos,
}

impl DataType {
    const CHOICES: &'static str = "eph, alm, aux, pos";

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "eph" => Some(DataType::Eph),
            "alm" => Some(DataType::Alm),
            "aux" => Some(DataType::Aux),
            "pos" => Some(DataType::Pos),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DataType::Eph => "eph",
            DataType::Alm => "alm",
            DataType::Aux => "aux",
            DataType::Pos => "pos",
        }
    }
}

/// Satellite constellations the service can provide data for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constellation {
    Gps,
    Glo,
    Gal,
    Bds,
    Qzss,
}

impl Constellation {
    const CHOICES: &'static str = "gps, glo, gal, bds, qzss";

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "gps" => Some(Constellation::Gps),
            "glo" => Some(Constellation::Glo),
            "gal" => Some(Constellation::Gal),
            "bds" => Some(Constellation::Bds),
            "qzss" => Some(Constellation::Qzss),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Constellation::Gps => "gps",
            Constellation::Glo => "glo",
            Constellation::Gal => "gal",
            Constellation::Bds => "bds",
            Constellation::Qzss => "qzss",
        }
    }
}

/// The effective request parameters for one invocation
///
/// Every field is optional; an unset field is omitted from the outbound
/// request so the service applies its own default. List fields are kept
/// sorted and deduplicated, which makes equality and fingerprinting
/// independent of the order and casing the values were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    /// Requested assistance data types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataType>>,
    /// Requested constellations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnss: Option<Vec<Constellation>>,
    /// Approximate latitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Approximate longitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Approximate altitude in metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    /// Position accuracy in metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacc: Option<f64>,
    /// Time accuracy in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tacc: Option<f64>,
    /// Expected network latency in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
}

/// Result of resolving overrides against stored defaults
///
/// `effective` is what this invocation requests; `to_persist` is what
/// becomes the stored default for the next run. All recognized parameters
/// are persistable, so the two currently coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub effective: RequestParameters,
    pub to_persist: RequestParameters,
}

impl RequestParameters {
    /// Merges caller-supplied overrides over stored defaults
    ///
    /// Every key in `overrides` takes precedence over the same key in the
    /// stored defaults; keys present only in the defaults carry through
    /// unchanged. An override with an empty value clears the parameter.
    /// Unknown keys and invalid values fail, nothing is silently ignored.
    pub fn resolve(
        overrides: &BTreeMap<String, String>,
        stored_defaults: Option<&RequestParameters>,
    ) -> Result<Resolution, ParameterError> {
        let mut effective = stored_defaults.cloned().unwrap_or_default();
        for (key, value) in overrides {
            effective.apply_override(key, value)?;
        }
        let to_persist = effective.clone();
        Ok(Resolution {
            effective,
            to_persist,
        })
    }

    /// Applies a single `key=value` override, validating name and value
    fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ParameterError> {
        match key {
            "data" => self.data = parse_list(value, "data", DataType::CHOICES, DataType::from_str)?,
            "gnss" => {
                self.gnss = parse_list(value, "gnss", Constellation::CHOICES, Constellation::from_str)?
            }
            "lat" => self.lat = parse_number(value, "lat", -90.0, 90.0)?,
            "lon" => self.lon = parse_number(value, "lon", -180.0, 180.0)?,
            "alt" => self.alt = parse_number(value, "alt", -1000.0, 50000.0)?,
            "pacc" => self.pacc = parse_number(value, "pacc", 0.0, 6_000_000.0)?,
            "tacc" => self.tacc = parse_number(value, "tacc", 0.0, 3600.0)?,
            "latency" => self.latency = parse_number(value, "latency", 0.0, 3600.0)?,
            _ => return Err(ParameterError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// True when both latitude and longitude are set
    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// The normalized `(key, value)` pairs of every set parameter
    ///
    /// Keys are emitted in a fixed order and values in canonical form, so
    /// two equivalent parameter sets always produce the same pair list.
    pub fn canonical_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref data) = self.data {
            pairs.push(("data", join_values(data.iter().map(DataType::as_str))));
        }
        if let Some(ref gnss) = self.gnss {
            pairs.push(("gnss", join_values(gnss.iter().map(Constellation::as_str))));
        }
        if let Some(lat) = self.lat {
            pairs.push(("lat", format_number(lat)));
        }
        if let Some(lon) = self.lon {
            pairs.push(("lon", format_number(lon)));
        }
        if let Some(alt) = self.alt {
            pairs.push(("alt", format_number(alt)));
        }
        if let Some(pacc) = self.pacc {
            pairs.push(("pacc", format_number(pacc)));
        }
        if let Some(tacc) = self.tacc {
            pairs.push(("tacc", format_number(tacc)));
        }
        if let Some(latency) = self.latency {
            pairs.push(("latency", format_number(latency)));
        }
        pairs
    }

    /// Query pairs for the outbound data request
    ///
    /// Same as [`canonical_pairs`](Self::canonical_pairs) plus the derived
    /// `filteronpos` flag when a position is supplied, which asks the
    /// service to filter visible satellites by location.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.canonical_pairs();
        if self.has_position() {
            pairs.push(("filteronpos", "1".to_string()));
        }
        pairs
    }

    /// Order-independent, value-normalized hash of the parameter set
    ///
    /// Cached data is keyed on this fingerprint: any drift in the effective
    /// parameters changes the fingerprint and forces a fresh fetch.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in self.canonical_pairs() {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Parses a comma-separated list value, normalizing to sorted unique entries
///
/// An empty value clears the parameter (returns `None`).
fn parse_list<T: Ord + Copy>(
    value: &str,
    key: &'static str,
    choices: &'static str,
    parse_one: impl Fn(&str) -> Option<T>,
) -> Result<Option<Vec<T>>, ParameterError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let mut items = Vec::new();
    for raw in value.split(',') {
        let token = raw.trim().to_ascii_lowercase();
        let item = parse_one(&token).ok_or_else(|| ParameterError::UnknownValue {
            key,
            value: raw.trim().to_string(),
            choices,
        })?;
        items.push(item);
    }
    items.sort();
    items.dedup();
    Ok(Some(items))
}

/// Parses and range-checks a numeric value
///
/// An empty value clears the parameter (returns `None`).
fn parse_number(
    value: &str,
    key: &'static str,
    min: f64,
    max: f64,
) -> Result<Option<f64>, ParameterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let number: f64 = trimmed.parse().map_err(|_| ParameterError::NotANumber {
        key,
        value: value.to_string(),
    })?;
    if !(min..=max).contains(&number) {
        return Err(ParameterError::OutOfRange {
            key,
            value: number,
            min,
            max,
        });
    }
    Ok(Some(number))
}

/// Canonical formatting for numeric values ("45.0" and "45" compare equal)
fn format_number(value: f64) -> String {
    format!("{}", value)
}

fn join_values<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_with_no_defaults_and_no_overrides_is_empty() {
        let resolution = RequestParameters::resolve(&BTreeMap::new(), None).unwrap();
        assert_eq!(resolution.effective, RequestParameters::default());
        assert_eq!(resolution.to_persist, RequestParameters::default());
    }

    #[test]
    fn test_resolve_parses_typed_values() {
        let resolution = RequestParameters::resolve(
            &overrides(&[("data", "eph,alm"), ("gnss", "gps,glo"), ("lat", "45.0")]),
            None,
        )
        .unwrap();

        assert_eq!(
            resolution.effective.data,
            Some(vec![DataType::Eph, DataType::Alm])
        );
        assert_eq!(
            resolution.effective.gnss,
            Some(vec![Constellation::Gps, Constellation::Glo])
        );
        assert_eq!(resolution.effective.lat, Some(45.0));
        assert!(resolution.effective.lon.is_none());
    }

    #[test]
    fn test_overrides_take_precedence_over_defaults() {
        let stored = RequestParameters {
            gnss: Some(vec![Constellation::Gps]),
            lat: Some(10.0),
            ..Default::default()
        };

        let resolution =
            RequestParameters::resolve(&overrides(&[("lat", "45.0")]), Some(&stored)).unwrap();

        assert_eq!(resolution.effective.lat, Some(45.0));
        // Keys present only in the defaults carry through unchanged.
        assert_eq!(resolution.effective.gnss, Some(vec![Constellation::Gps]));
    }

    #[test]
    fn test_empty_override_clears_a_stored_default() {
        let stored = RequestParameters {
            lat: Some(10.0),
            ..Default::default()
        };

        let resolution =
            RequestParameters::resolve(&overrides(&[("lat", "")]), Some(&stored)).unwrap();

        assert!(resolution.effective.lat.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = RequestParameters::resolve(&overrides(&[("speed", "10")]), None);
        match result {
            Err(ParameterError::UnknownKey(key)) => assert_eq!(key, "speed"),
            other => panic!("Expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_list_value_is_rejected() {
        let result = RequestParameters::resolve(&overrides(&[("gnss", "gps,navic")]), None);
        match result {
            Err(ParameterError::UnknownValue { key, value, .. }) => {
                assert_eq!(key, "gnss");
                assert_eq!(value, "navic");
            }
            other => panic!("Expected UnknownValue, got {:?}", other),
        }
    }

    #[test]
    fn test_latitude_out_of_range_is_rejected() {
        let result = RequestParameters::resolve(&overrides(&[("lat", "90.5")]), None);
        match result {
            Err(ParameterError::OutOfRange { key, min, max, .. }) => {
                assert_eq!(key, "lat");
                assert_eq!(min, -90.0);
                assert_eq!(max, 90.0);
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let result = RequestParameters::resolve(&overrides(&[("lon", "east")]), None);
        assert!(matches!(result, Err(ParameterError::NotANumber { .. })));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let stored = RequestParameters {
            gnss: Some(vec![Constellation::Gps, Constellation::Glo]),
            ..Default::default()
        };
        let args = overrides(&[("lat", "45.0"), ("lon", "-122.5")]);

        let first = RequestParameters::resolve(&args, Some(&stored)).unwrap();
        let second = RequestParameters::resolve(&args, Some(&stored)).unwrap();

        assert_eq!(first.effective, second.effective);
        assert_eq!(first.to_persist, second.to_persist);
    }

    #[test]
    fn test_fingerprint_ignores_list_order_and_casing() {
        let a = RequestParameters::resolve(&overrides(&[("gnss", "gps,glo")]), None).unwrap();
        let b = RequestParameters::resolve(&overrides(&[("gnss", "GLO, Gps")]), None).unwrap();
        assert_eq!(a.effective.fingerprint(), b.effective.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_numeric_formatting() {
        let a = RequestParameters::resolve(&overrides(&[("lat", "45.0")]), None).unwrap();
        let b = RequestParameters::resolve(&overrides(&[("lat", "45")]), None).unwrap();
        assert_eq!(a.effective.fingerprint(), b.effective.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_when_a_parameter_changes() {
        let a = RequestParameters::resolve(&overrides(&[("gnss", "gps")]), None).unwrap();
        let b = RequestParameters::resolve(&overrides(&[("gnss", "gps,glo")]), None).unwrap();
        assert_ne!(a.effective.fingerprint(), b.effective.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_set_from_unset() {
        let empty = RequestParameters::default();
        let with_lat =
            RequestParameters::resolve(&overrides(&[("lat", "0")]), None).unwrap();
        assert_ne!(empty.fingerprint(), with_lat.effective.fingerprint());
    }

    #[test]
    fn test_query_pairs_omit_unset_parameters() {
        let params = RequestParameters {
            gnss: Some(vec![Constellation::Gps]),
            ..Default::default()
        };
        let pairs = params.query_pairs();
        assert_eq!(pairs, vec![("gnss", "gps".to_string())]);
    }

    #[test]
    fn test_query_pairs_add_filteronpos_when_position_is_set() {
        let params = RequestParameters {
            lat: Some(45.0),
            lon: Some(-122.5),
            ..Default::default()
        };
        let pairs = params.query_pairs();
        assert!(pairs.contains(&("filteronpos", "1".to_string())));

        // Latitude alone is not a position.
        let lat_only = RequestParameters {
            lat: Some(45.0),
            ..Default::default()
        };
        assert!(!lat_only
            .query_pairs()
            .contains(&("filteronpos", "1".to_string())));
    }

    #[test]
    fn test_filteronpos_does_not_affect_the_fingerprint() {
        let params = RequestParameters {
            lat: Some(45.0),
            lon: Some(-122.5),
            ..Default::default()
        };
        let canonical: Vec<_> = params.canonical_pairs();
        assert!(!canonical.iter().any(|(k, _)| *k == "filteronpos"));
    }

    #[test]
    fn test_serde_roundtrip_preserves_parameters() {
        let params = RequestParameters {
            data: Some(vec![DataType::Eph]),
            gnss: Some(vec![Constellation::Gps, Constellation::Qzss]),
            lat: Some(45.0),
            lon: Some(-122.5),
            alt: Some(120.0),
            ..Default::default()
        };

        let json = serde_json::to_string(&params).expect("Failed to serialize parameters");
        let back: RequestParameters =
            serde_json::from_str(&json).expect("Failed to deserialize parameters");

        assert_eq!(back, params);
        assert_eq!(back.fingerprint(), params.fingerprint());
    }

    #[test]
    fn test_unset_fields_are_omitted_from_json() {
        let params = RequestParameters {
            gnss: Some(vec![Constellation::Gps]),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("gnss"));
        assert!(!json.contains("lat"));
    }
}
