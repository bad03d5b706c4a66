//! Tempo command-line tools.
//!
//! Shared functionality for the `tempo-host` executable and the
//! `tempo-conformance` runner.

pub mod colors;
pub mod config;
pub mod conformance;
pub mod host;
pub mod linked;
pub mod logging;
