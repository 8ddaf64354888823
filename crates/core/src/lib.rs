//! Domain core for generation-job orchestration.
//!
//! No I/O beyond the local filesystem lives here: prompt parsing, slash
//! commands, the job state machine, the backend and store contracts, and
//! the blocking worker pool.

pub mod backend;
pub mod blocking;
pub mod command;
pub mod error;
pub mod job;
pub mod params;
pub mod storage;
pub mod store;
pub mod types;
