//! Transaction key utilities for the fork harness.
//!
//! * [`keys::KeyMap`] compiles the account keys of an instruction sequence
//!   and answers which of them must sign.
//! * [`ephemeral::KeypairFactory`] hands out the fresh message-account
//!   keypairs that keep scenarios isolated from one another.

pub mod ephemeral;
pub mod keys;

pub use {
    ephemeral::{KeypairFactory, RandomKeypairs, SeededKeypairs},
    keys::{KeyMap, KeyMapError},
};
