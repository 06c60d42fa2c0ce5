//! The core bridge's legacy post-message instruction, as the token bridge
//! invokes it.

use {
    crate::pda,
    borsh::{BorshDeserialize, BorshSerialize},
    solana_instruction::{AccountMeta, Instruction},
    solana_program_error::ProgramError,
    solana_pubkey::Pubkey,
    solana_sdk_ids::{system_program, sysvar},
};

pub const POST_MESSAGE_SELECTOR: u8 = 1;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PostMessageArgs {
    pub nonce: u32,
    pub payload: Vec<u8>,
    pub consistency_level: u8,
}

impl PostMessageArgs {
    pub fn pack(&self) -> Vec<u8> {
        let mut data = vec![POST_MESSAGE_SELECTOR];
        self.serialize(&mut data).expect("serializing into a Vec cannot fail");
        data
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        match data.split_first() {
            Some((&POST_MESSAGE_SELECTOR, args)) => {
                Self::try_from_slice(args).map_err(|_| ProgramError::InvalidInstructionData)
            }
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}

/// Accounts, in order: bridge config, message, emitter, emitter sequence,
/// payer, fee collector, clock, system program, rent.
pub fn legacy_post_message(
    core_bridge: &Pubkey,
    message: &Pubkey,
    emitter: &Pubkey,
    payer: &Pubkey,
    args: &PostMessageArgs,
) -> Instruction {
    Instruction {
        program_id: *core_bridge,
        accounts: vec![
            AccountMeta::new(pda::core_bridge_config(core_bridge), false),
            AccountMeta::new(*message, true),
            AccountMeta::new_readonly(*emitter, true),
            AccountMeta::new(pda::core_emitter_sequence(core_bridge, emitter), false),
            AccountMeta::new(*payer, true),
            AccountMeta::new(pda::core_fee_collector(core_bridge), false),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: args.pack(),
    }
}
