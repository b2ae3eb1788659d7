//! AssistNow AGNSS fetch client library
//!
//! Exposes the parameter, cache, state and orchestration modules for use by
//! the binary and the integration tests.

pub mod cache;
pub mod cli;
pub mod gateway;
pub mod orchestrator;
pub mod params;
pub mod sink;
pub mod state;
pub mod ubx;
