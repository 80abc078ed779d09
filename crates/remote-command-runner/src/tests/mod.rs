//! Fan-out tests for the command runner.
//!
//! - `harness.rs` - Scripted fleet executor
//! - `runner.rs`  - Result mapping, error policies, cancellation and pool bounds

mod runner;
