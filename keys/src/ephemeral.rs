//! Ephemeral keypair factories.
//!
//! Every scenario needs one fresh message account per side. The bridge
//! program initializes that account, so it must never have existed before
//! and must never be shared between the candidate and the reference. All
//! message keypairs go through a [`KeypairFactory`] so the isolation rule
//! lives in one place.

use {
    fork_harness_error::Side,
    sha2::{Digest, Sha256},
    solana_keypair::Keypair,
    std::{
        cell::{Cell, RefCell},
        collections::HashMap,
    },
};

pub trait KeypairFactory {
    /// A keypair for the message account of `side` in `scenario`.
    fn message_keypair(&self, scenario: &str, side: Side) -> Keypair;
}

/// Fresh random keypairs. Use against live clusters.
#[derive(Debug, Default)]
pub struct RandomKeypairs {
    issued: Cell<usize>,
}

impl RandomKeypairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keypairs handed out so far.
    pub fn issued(&self) -> usize {
        self.issued.get()
    }
}

impl KeypairFactory for RandomKeypairs {
    fn message_keypair(&self, _scenario: &str, _side: Side) -> Keypair {
        self.issued.set(self.issued.get() + 1);
        Keypair::new()
    }
}

/// Keypairs derived from `sha256(seed || scenario || side || occurrence)`,
/// where `occurrence` counts earlier requests for the same scenario and
/// side.
///
/// A fresh factory reproduces the same keys for the same sequence of
/// requests, which keeps local reports stable. Running a suite twice, or
/// two scenarios under one name, still gets distinct message accounts.
#[derive(Clone, Debug)]
pub struct SeededKeypairs {
    seed: [u8; 32],
    occurrences: RefCell<HashMap<(String, Side), u64>>,
}

impl SeededKeypairs {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            occurrences: RefCell::default(),
        }
    }

    fn secret(&self, scenario: &str, side: Side, occurrence: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update((scenario.len() as u64).to_le_bytes());
        hasher.update(scenario.as_bytes());
        hasher.update(side.label().as_bytes());
        hasher.update(occurrence.to_le_bytes());
        hasher.finalize().into()
    }

    fn next_occurrence(&self, scenario: &str, side: Side) -> u64 {
        let mut occurrences = self.occurrences.borrow_mut();
        let count = occurrences.entry((scenario.to_string(), side)).or_default();
        let occurrence = *count;
        *count += 1;
        occurrence
    }
}

impl KeypairFactory for SeededKeypairs {
    fn message_keypair(&self, scenario: &str, side: Side) -> Keypair {
        let occurrence = self.next_occurrence(scenario, side);
        Keypair::new_from_array(self.secret(scenario, side, occurrence))
    }
}
