//! Ready-made trials.
//!
//! Used by the binary targets and by integration tests as realistic
//! workloads.

pub mod ber;
