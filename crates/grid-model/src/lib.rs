//! Domain types shared by the grid scheduler crates.
//!
//! Everything here is plain data: identifiers, job specifications with their
//! SLA, per-task outcomes and the read-only views handed to management tooling.

mod domain;
pub use domain::*;
