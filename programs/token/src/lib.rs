//! SPL Token primitives consumed by the fork harness: address derivation,
//! the instructions the harness submits, and account layouts it reads back.

#[cfg(feature = "associated-token")]
pub mod associated_token;
#[cfg(feature = "token")]
pub mod token;
