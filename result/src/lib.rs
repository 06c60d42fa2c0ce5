//! Outcomes of one scenario side, and how they are validated.
//!
//! # Core Types
//!
//! * [`ExecutionResult`] - A transaction's final state (confirmed or failed)
//! * [`SideOutcome`] - The result plus the message account read back
//!   afterwards
//! * [`ErrorClass`] - Coarse error classification for negative scenarios
//!
//! # Validation
//!
//! * [`Check`] - Validate one side on its own
//! * [`Compare`] - Compare the candidate against the reference
//! * [`Config`] - Whether to panic or collect divergences
//!
//! # Example
//!
//! ```rust,ignore
//! use fork_harness_result::{Check, Compare, Config};
//!
//! let config = Config::default();
//! let mut divergences = candidate.run_checks(&[Check::success()], &config);
//! divergences.extend(reference.compare_with_config(&candidate, &Compare::defaults(), &config));
//! ```

pub mod check;
pub mod compare;
pub mod config;
pub mod types;

pub use {
    check::{Check, MessageCheckBuilder, TokenBalanceCheckBuilder},
    compare::{Compare, MessageFields},
    config::Config,
    types::{
        ErrorClass, ExecutionResult, FailureReason, SideOutcome, TokenBalanceChange,
        TransactionDetails, TransactionFailure,
    },
};
