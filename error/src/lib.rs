//! Errors and shared labels for the token bridge fork harness.
//!
//! Every scenario runs the same logical operation twice, once per
//! [`Side`]. Failures are always attributed to a side when one can be
//! identified, so a report can say which deployment misbehaved and where.

pub mod error;
pub mod side;

pub use {
    error::{Divergence, HarnessError, HarnessPanic},
    side::Side,
};
