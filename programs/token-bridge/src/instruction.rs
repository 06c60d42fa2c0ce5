//! Legacy token bridge instruction encoders.

use {
    crate::pda,
    borsh::{BorshDeserialize, BorshSerialize},
    fork_harness_programs_token::token,
    solana_instruction::{AccountMeta, Instruction},
    solana_program_error::ProgramError,
    solana_pubkey::Pubkey,
    solana_sdk_ids::{system_program, sysvar},
};

/// Legacy instruction selectors.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyInstruction {
    TransferTokensNative = 5,
    TransferTokensWithPayloadNative = 11,
}

impl TryFrom<u8> for LegacyInstruction {
    type Error = ProgramError;

    fn try_from(selector: u8) -> Result<Self, Self::Error> {
        match selector {
            5 => Ok(Self::TransferTokensNative),
            11 => Ok(Self::TransferTokensWithPayloadNative),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferArgs {
    pub nonce: u32,
    pub amount: u64,
    pub relayer_fee: u64,
    pub recipient: [u8; 32],
    pub recipient_chain: u16,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferWithPayloadArgs {
    pub nonce: u32,
    pub amount: u64,
    pub redeemer: [u8; 32],
    pub redeemer_chain: u16,
    pub payload: Vec<u8>,
    pub cpi_program_id: Option<Pubkey>,
}

/// Accounts of a native transfer that vary per call. Everything else is
/// derived from the two program ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferNativeAccounts {
    pub payer: Pubkey,
    pub mint: Pubkey,
    pub src_token: Pubkey,
    pub core_message: Pubkey,
    pub core_bridge_program: Pubkey,
}

/// Instruction data of a legacy instruction: the selector byte followed by
/// the Borsh-encoded arguments.
fn pack_legacy(selector: LegacyInstruction, args: &impl BorshSerialize) -> Vec<u8> {
    let mut data = vec![selector as u8];
    args.serialize(&mut data).expect("serializing into a Vec cannot fail");
    data
}

/// Decode `data` as the arguments of `selector`. The arguments must span
/// the rest of the data exactly.
fn unpack_legacy<T: BorshDeserialize>(
    selector: LegacyInstruction,
    data: &[u8],
) -> Result<T, ProgramError> {
    let (first, args) = data
        .split_first()
        .ok_or(ProgramError::InvalidInstructionData)?;
    if LegacyInstruction::try_from(*first)? != selector {
        return Err(ProgramError::InvalidInstructionData);
    }
    T::try_from_slice(args).map_err(|_| ProgramError::InvalidInstructionData)
}

impl TransferArgs {
    pub fn pack(&self) -> Vec<u8> {
        pack_legacy(LegacyInstruction::TransferTokensNative, self)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        unpack_legacy(LegacyInstruction::TransferTokensNative, data)
    }
}

impl TransferWithPayloadArgs {
    pub fn pack(&self) -> Vec<u8> {
        pack_legacy(LegacyInstruction::TransferTokensWithPayloadNative, self)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        unpack_legacy(LegacyInstruction::TransferTokensWithPayloadNative, data)
    }
}

/// Approve the token bridge's transfer authority to move `amount` out of
/// `token`. Must precede the transfer in the same transaction.
pub fn approve_transfer_authority(
    token_bridge: &Pubkey,
    token: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    token::approve(token, &pda::transfer_authority(token_bridge), owner, amount)
}

fn transfer_native_metas(
    token_bridge: &Pubkey,
    accounts: &TransferNativeAccounts,
) -> Vec<AccountMeta> {
    let core_bridge = &accounts.core_bridge_program;
    let emitter = pda::emitter(token_bridge);
    vec![
        AccountMeta::new(accounts.payer, true),
        AccountMeta::new_readonly(pda::config(token_bridge), false),
        AccountMeta::new(accounts.src_token, false),
        AccountMeta::new(accounts.mint, false),
        AccountMeta::new(pda::custody_token(token_bridge, &accounts.mint), false),
        AccountMeta::new_readonly(pda::transfer_authority(token_bridge), false),
        AccountMeta::new_readonly(pda::custody_authority(token_bridge), false),
        AccountMeta::new(pda::core_bridge_config(core_bridge), false),
        AccountMeta::new(accounts.core_message, true),
        AccountMeta::new_readonly(emitter, false),
        AccountMeta::new(pda::core_emitter_sequence(core_bridge, &emitter), false),
        AccountMeta::new(pda::core_fee_collector(core_bridge), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
    ]
}

fn transfer_native_trailer(accounts: &TransferNativeAccounts) -> [AccountMeta; 4] {
    [
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(accounts.core_bridge_program, false),
        AccountMeta::new_readonly(token::ID, false),
    ]
}

/// Index of the sender authority in a transfer-with-payload instruction.
pub const SENDER_AUTHORITY_INDEX: usize = 13;

/// Index of the core message account in both native transfer instructions.
pub const CORE_MESSAGE_INDEX: usize = 8;

pub fn legacy_transfer_tokens_native(
    token_bridge: &Pubkey,
    accounts: &TransferNativeAccounts,
    args: &TransferArgs,
) -> Instruction {
    let mut metas = transfer_native_metas(token_bridge, accounts);
    metas.extend(transfer_native_trailer(accounts));
    Instruction {
        program_id: *token_bridge,
        accounts: metas,
        data: args.pack(),
    }
}

pub fn legacy_transfer_tokens_with_payload_native(
    token_bridge: &Pubkey,
    accounts: &TransferNativeAccounts,
    sender_authority: &Pubkey,
    args: &TransferWithPayloadArgs,
) -> Instruction {
    let mut metas = transfer_native_metas(token_bridge, accounts);
    metas.push(AccountMeta::new_readonly(*sender_authority, true));
    metas.extend(transfer_native_trailer(accounts));
    Instruction {
        program_id: *token_bridge,
        accounts: metas,
        data: args.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> TransferNativeAccounts {
        TransferNativeAccounts {
            payer: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            src_token: Pubkey::new_unique(),
            core_message: Pubkey::new_unique(),
            core_bridge_program: Pubkey::new_unique(),
        }
    }

    fn with_payload_args() -> TransferWithPayloadArgs {
        TransferWithPayloadArgs {
            nonce: 420,
            amount: 88_888_888,
            redeemer: [0xde; 32],
            redeemer_chain: 2,
            payload: b"All your base are belong to us.".to_vec(),
            cpi_program_id: None,
        }
    }

    #[test]
    fn test_with_payload_layout() {
        let token_bridge = Pubkey::new_unique();
        let accounts = accounts();
        let sender = Pubkey::new_unique();

        let ix = legacy_transfer_tokens_with_payload_native(
            &token_bridge,
            &accounts,
            &sender,
            &with_payload_args(),
        );

        assert_eq!(ix.program_id, token_bridge);
        assert_eq!(ix.accounts.len(), 18);
        assert_eq!(ix.accounts[CORE_MESSAGE_INDEX].pubkey, accounts.core_message);
        assert!(ix.accounts[CORE_MESSAGE_INDEX].is_signer);
        assert_eq!(ix.accounts[SENDER_AUTHORITY_INDEX].pubkey, sender);
        assert!(ix.accounts[SENDER_AUTHORITY_INDEX].is_signer);
        assert_eq!(
            ix.accounts[5].pubkey,
            pda::transfer_authority(&token_bridge)
        );
        assert_eq!(ix.accounts[16].pubkey, accounts.core_bridge_program);
        assert_eq!(ix.accounts[17].pubkey, token::ID);

        assert_eq!(ix.data[0], 11);
        assert_eq!(&ix.data[1..5], &420u32.to_le_bytes());
        assert_eq!(*ix.data.last().unwrap(), 0);
    }

    #[test]
    fn test_native_layout_has_no_sender() {
        let token_bridge = Pubkey::new_unique();
        let accounts = accounts();
        let args = TransferArgs {
            nonce: 420,
            amount: 88_888_888,
            relayer_fee: 0,
            recipient: [0xde; 32],
            recipient_chain: 2,
        };

        let ix = legacy_transfer_tokens_native(&token_bridge, &accounts, &args);
        assert_eq!(ix.accounts.len(), 17);
        assert_eq!(ix.data.len(), 1 + 4 + 8 + 8 + 32 + 2);
        assert_eq!(
            ix.accounts.iter().filter(|meta| meta.is_signer).count(),
            2
        );
        assert_eq!(TransferArgs::unpack(&ix.data).unwrap(), args);
    }

    #[test]
    fn test_with_payload_unpack() {
        let mut args = with_payload_args();
        assert_eq!(TransferWithPayloadArgs::unpack(&args.pack()).unwrap(), args);

        let program_id = Pubkey::new_unique();
        args.cpi_program_id = Some(program_id);
        let data = args.pack();
        let payload_len = args.payload.len();
        assert_eq!(data.len(), 1 + 4 + 8 + 32 + 2 + 4 + payload_len + 1 + 32);
        assert_eq!(&data[47..51], &(payload_len as u32).to_le_bytes());
        assert_eq!(data[51 + payload_len], 1);
        assert_eq!(&data[52 + payload_len..], program_id.as_ref());
        assert_eq!(TransferWithPayloadArgs::unpack(&data).unwrap(), args);

        let mut bad_option = data.clone();
        bad_option[51 + payload_len] = 2;
        assert_eq!(
            TransferWithPayloadArgs::unpack(&bad_option),
            Err(ProgramError::InvalidInstructionData)
        );

        let mut trailing = data;
        trailing.push(0);
        assert_eq!(
            TransferWithPayloadArgs::unpack(&trailing),
            Err(ProgramError::InvalidInstructionData)
        );

        let mut truncated = args.pack();
        truncated.pop();
        assert_eq!(
            TransferWithPayloadArgs::unpack(&truncated),
            Err(ProgramError::InvalidInstructionData)
        );

        assert_eq!(
            TransferArgs::unpack(&args.pack()),
            Err(ProgramError::InvalidInstructionData)
        );
    }

    #[test]
    fn test_approve_targets_transfer_authority() {
        let token_bridge = Pubkey::new_unique();
        let src = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix = approve_transfer_authority(&token_bridge, &src, &owner, 5).unwrap();
        assert_eq!(ix.program_id, token::ID);
        assert_eq!(ix.accounts[1].pubkey, pda::transfer_authority(&token_bridge));
    }
}
