//! Utility crate for the MaxIOFS object storage core: error types, time helpers,
//! identifier generation, streaming hash helpers, configuration, and metrics glue.

#[macro_use]
extern crate tracing;

pub mod async_hash;
pub mod cancel;
pub mod config;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod time;
