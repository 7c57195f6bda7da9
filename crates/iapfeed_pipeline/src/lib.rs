//! Pipeline driver for the iapfeed feed.
//!
//! A [`Pipeline`] runs one device group end to end (fetch, reconcile, build,
//! validate, compress, upload) and records every stage transition in a
//! [`GenerationRun`] whose JSON snapshot lives at
//! `<output_dir>/status/<group>.json`.

#![warn(missing_docs)]

pub mod driver;
pub mod error;
pub mod lock;
pub mod run;

pub use driver::{open_cache, Pipeline, RunOptions};
pub use error::PipelineError;
pub use lock::{RunGuard, RunLocks};
pub use run::{
    read_status, status_path, write_status, DeviceFailure, GenerationRun, RunFailure, RunState,
};
