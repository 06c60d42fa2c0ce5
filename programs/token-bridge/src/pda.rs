//! Program-derived addresses of the token bridge and core bridge.
//!
//! Every address here depends on the deployment's program id, so the
//! candidate and reference deployments never share one.

use solana_pubkey::Pubkey;

pub fn config(token_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"config"], token_bridge).0
}

/// Token account holding native tokens locked by transfers of `mint`.
pub fn custody_token(token_bridge: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[mint.as_ref()], token_bridge).0
}

/// The delegate a sender approves before a transfer.
pub fn transfer_authority(token_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"authority_signer"], token_bridge).0
}

pub fn custody_authority(token_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"custody_signer"], token_bridge).0
}

/// The emitter the token bridge posts messages as.
pub fn emitter(token_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"emitter"], token_bridge).0
}

/// The sender authority a CPI caller must sign with.
pub fn sender_authority(cpi_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"sender"], cpi_program).0
}

pub fn core_bridge_config(core_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"Bridge"], core_bridge).0
}

pub fn core_emitter_sequence(core_bridge: &Pubkey, emitter: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"Sequence", emitter.as_ref()], core_bridge).0
}

pub fn core_fee_collector(core_bridge: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[b"fee_collector"], core_bridge).0
}
