//! Static test inputs: mints, deployments and argument templates.

use {
    fork_harness_error::Side,
    fork_harness_programs_token_bridge::instruction::{TransferArgs, TransferWithPayloadArgs},
    solana_pubkey::{pubkey, Pubkey},
};

/// A fungible token used as the transferred asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintInfo {
    pub address: Pubkey,
    pub decimals: u8,
}

pub const MINT_INFO_8: MintInfo = MintInfo {
    address: pubkey!("HqNPRkwargALrhbTofkS3pnyPg2v5tBdTF7rqD4oKkQi"),
    decimals: 8,
};

pub const MINT_INFO_9: MintInfo = MintInfo {
    address: pubkey!("H89drq2EAUzFGdfnNjR1Q35wFvyEoQtKGiR1KDCrKeQJ"),
    decimals: 9,
};

/// The fixture mints, one at the message precision and one above it so
/// that truncation is exercised.
pub fn mints() -> Vec<MintInfo> {
    vec![MINT_INFO_8, MINT_INFO_9]
}

/// Minted into the payer's token account for every mint before a suite.
pub const PROVISION_AMOUNT: u64 = 1_000_000_000_000_000_000;

pub const DEFAULT_AMOUNT: u64 = 88_888_888;
pub const DEFAULT_NONCE: u32 = 420;
pub const DEFAULT_DESTINATION_CHAIN: u16 = 2;
pub const DEFAULT_PAYLOAD: &[u8] = b"All your base are belong to us.";

/// 32 bytes of repeated `deadbeef`.
pub const DEFAULT_DESTINATION: [u8; 32] = {
    let pattern = [0xde, 0xad, 0xbe, 0xef];
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = pattern[i % 4];
        i += 1;
    }
    out
};

pub fn default_transfer_with_payload_args(amount: u64) -> TransferWithPayloadArgs {
    TransferWithPayloadArgs {
        nonce: DEFAULT_NONCE,
        amount,
        redeemer: DEFAULT_DESTINATION,
        redeemer_chain: DEFAULT_DESTINATION_CHAIN,
        payload: DEFAULT_PAYLOAD.to_vec(),
        cpi_program_id: None,
    }
}

pub fn default_transfer_args(amount: u64) -> TransferArgs {
    TransferArgs {
        nonce: DEFAULT_NONCE,
        amount,
        relayer_fee: 0,
        recipient: DEFAULT_DESTINATION,
        recipient_chain: DEFAULT_DESTINATION_CHAIN,
    }
}

/// One deployment of the token bridge and the core bridge it posts
/// through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub token_bridge: Pubkey,
    pub core_bridge: Pubkey,
}

impl Deployment {
    pub const CANDIDATE: Deployment = Deployment {
        token_bridge: pubkey!("B6RHG3mfcckmrYN1UhmJzyS1XX3fZKbkeUcpJe9Sy3FE"),
        core_bridge: pubkey!("Bridge1p5gheXUvJ6jGWGeCsgPKgnE3YgdGKRVCMY9o"),
    };

    pub const REFERENCE: Deployment = Deployment {
        token_bridge: pubkey!("wormDTUJ6AWPNvk59vGQbDvGJmqbDTdgWgAqcLBCgUb"),
        core_bridge: pubkey!("worm2ZoG2kUd4vFXhvjh93UUH596ayRfgQ2MgjNMTth"),
    };

    pub fn program_ids(&self) -> Vec<Pubkey> {
        vec![self.token_bridge, self.core_bridge]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeploymentPair {
    pub candidate: Deployment,
    pub reference: Deployment,
}

impl Default for DeploymentPair {
    fn default() -> Self {
        Self {
            candidate: Deployment::CANDIDATE,
            reference: Deployment::REFERENCE,
        }
    }
}

impl DeploymentPair {
    pub fn get(&self, side: Side) -> &Deployment {
        match side {
            Side::Candidate => &self.candidate,
            Side::Reference => &self.reference,
        }
    }
}
