//! Audit-level tests for the fleet inventory crate.
//!
//! - `harness.rs` - In-memory region and instance listers
//! - `audit.rs`   - End-to-end audit runs over several regions
//! - `pool.rs`    - Worker pool bounds and ordering

pub(crate) mod harness;
