//! Run orchestration
//!
//! Sequences one invocation end to end: load persisted state, resolve the
//! effective parameters, make sure the device is registered, decide between
//! cache reuse and a fresh fetch, commit the updated state, and hand the
//! payload over. All storage I/O happens here; the resolver and the cache
//! evaluator stay pure. Persisted state is only committed after the cycle
//! has succeeded, so a failed run leaves the previous defaults and cache
//! authoritative.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::cache::{evaluate, CacheEntry, CacheStore, Decision};
use crate::gateway::{AssistService, FetchError, RegistrationError};
use crate::params::{ParameterError, RequestParameters};
use crate::sink::{PayloadSink, SinkError};
use crate::state::{Credentials, PersistedState, PersistenceError, StateStore};
use crate::ubx;

/// Everything a single invocation asks for
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Access token, required for (re-)registration
    pub token: Option<String>,
    /// Device identifier to register under
    pub device_id: Option<String>,
    /// Request parameter overrides for this run
    pub overrides: BTreeMap<String, String>,
    /// Validity window for cached data, in hours
    pub cache_duration_hours: f64,
    /// Where the payload is delivered
    pub sink: PayloadSink,
}

/// Where the delivered payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// Served from the on-disk cache without a network call
    Cache,
    /// Fetched from the service during this run
    Service,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the payload was reused or freshly fetched
    pub source: PayloadSource,
    /// Size of the delivered payload
    pub bytes: usize,
}

/// Everything that can end a run in failure
///
/// Each variant tells the caller how to proceed: fix the input, wait and
/// rerun, or investigate local storage. Nothing is retried within a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bad or unknown request parameter; correct the input and rerun
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The device is unregistered and no token was supplied
    #[error("Device is not registered; run again with token=TOKEN")]
    NotRegistered,

    /// Credential issuance failed; no state was mutated
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The data fetch failed; previous cache and defaults remain valid
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// State could not be committed; the obtained payload is not presented
    /// as cached
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The payload could not be handed over
    #[error(transparent)]
    Delivery(#[from] SinkError),
}

impl RunError {
    /// Process exit code for this failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Parameter(_) | RunError::NotRegistered => 2,
            RunError::Registration(_) => 3,
            RunError::Fetch(_) => 4,
            RunError::Persistence(_) => 5,
            RunError::Delivery(_) => 1,
        }
    }
}

/// Drives one invocation through the fetch-or-reuse cycle
pub struct Orchestrator<S> {
    state_store: StateStore,
    cache_store: CacheStore,
    service: S,
}

impl<S: AssistService> Orchestrator<S> {
    /// Creates an orchestrator over the given stores and service client
    pub fn new(state_store: StateStore, cache_store: CacheStore, service: S) -> Self {
        Self {
            state_store,
            cache_store,
            service,
        }
    }

    /// Runs one invocation to completion
    pub async fn run(&self, invocation: &Invocation) -> Result<Outcome, RunError> {
        let state = self.state_store.load();

        let resolution = RequestParameters::resolve(
            &invocation.overrides,
            state.as_ref().and_then(|s| s.last_parameters.as_ref()),
        )?;

        let stored_credentials = state.as_ref().and_then(|s| s.credentials.clone());
        let credentials = self
            .ensure_credentials(stored_credentials, invocation)
            .await?;

        let fingerprint = resolution.effective.fingerprint();
        let cache_entry = self.cache_store.load();
        let now = Utc::now();
        let decision = evaluate(
            &fingerprint,
            cache_entry.as_ref(),
            now,
            invocation.cache_duration_hours,
        );

        let reusable = match decision {
            Decision::Reuse => cache_entry,
            Decision::Refetch => None,
        };

        let (payload, source) = match reusable {
            Some(entry) => {
                info!(age_seconds = (now - entry.fetched_at).num_seconds(), "Valid cached data found; skipping fetch");
                (entry.payload, PayloadSource::Cache)
            }
            None => {
                let mut payload = self
                    .service
                    .fetch(&credentials, &resolution.effective)
                    .await?;
                payload = prepend_position(&resolution.effective, payload);
                let entry = CacheEntry {
                    payload: payload.clone(),
                    parameter_fingerprint: fingerprint,
                    fetched_at: now,
                };
                self.cache_store
                    .save(&entry)
                    .map_err(PersistenceError::Io)?;
                (payload, PayloadSource::Service)
            }
        };

        let updated = PersistedState {
            credentials: Some(credentials),
            last_parameters: Some(resolution.to_persist),
            updated_at: now,
        };
        self.state_store.save(&updated)?;

        invocation.sink.deliver(&payload)?;
        info!(bytes = payload.len(), "Delivered assistance data");

        Ok(Outcome {
            source,
            bytes: payload.len(),
        })
    }

    /// Returns usable credentials, registering the device when needed
    async fn ensure_credentials(
        &self,
        stored: Option<Credentials>,
        invocation: &Invocation,
    ) -> Result<Credentials, RunError> {
        match stored {
            Some(credentials) if !needs_registration(&credentials, invocation) => Ok(credentials),
            stored => {
                let token = invocation
                    .token
                    .clone()
                    .or_else(|| stored.as_ref().map(|c| c.token.clone()))
                    .ok_or(RunError::NotRegistered)?;
                let device_id = invocation
                    .device_id
                    .clone()
                    .or_else(|| stored.as_ref().and_then(|c| c.device_id.clone()));

                let credentials = self
                    .service
                    .register(&token, device_id.as_deref())
                    .await?;
                info!("Device registered");
                Ok(credentials)
            }
        }
    }
}

/// True when the stored credentials cannot be used as-is
///
/// Registration is a one-time step; it is repeated only when the device has
/// never been issued a session key, or the caller supplied a token or
/// device that differs from the stored ones.
fn needs_registration(credentials: &Credentials, invocation: &Invocation) -> bool {
    if !credentials.is_registered() {
        return true;
    }
    if let Some(ref token) = invocation.token {
        if *token != credentials.token {
            return true;
        }
    }
    if let Some(ref device_id) = invocation.device_id {
        if Some(device_id) != credentials.device_id.as_ref() {
            return true;
        }
    }
    false
}

/// Prepends the initial-position aiding frame when a position is supplied
fn prepend_position(params: &RequestParameters, payload: Vec<u8>) -> Vec<u8> {
    match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => {
            let frame = ubx::mga_ini_pos_llh(
                lat,
                lon,
                params.alt.unwrap_or(ubx::DEFAULT_ALT_M),
                params.pacc.unwrap_or(ubx::DEFAULT_PACC_KM),
            );
            let mut combined = frame;
            combined.extend_from_slice(&payload);
            combined
        }
        _ => payload,
    }
}
