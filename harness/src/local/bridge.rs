//! Core bridge and token bridge models.
//!
//! These reproduce the observable behavior of the legacy native transfer
//! path: the custody debit, the posted message and its sequence number.
//! Governance, attestation and redemption are not modeled.

use {
    super::{
        context::{account_meta, is_uninitialized, require_key, require_signer, InvokeContext},
        token::{create_token_account, unpack_mint, unpack_token_account},
        Program,
    },
    fork_harness_programs_token::token,
    fork_harness_programs_token_bridge::{
        core_bridge::{legacy_post_message, PostMessageArgs},
        instruction::{
            LegacyInstruction, TransferArgs, TransferWithPayloadArgs, CORE_MESSAGE_INDEX,
            SENDER_AUTHORITY_INDEX,
        },
        message::{MessageStatus, PostedMessageV1, CONSISTENCY_LEVEL_FINALIZED},
        normalize_amount, pda,
        payload::{TokenBridgeMessage, Transfer, TransferWithPayload},
        transferable_amount, SOLANA_CHAIN,
    },
    solana_account::Account,
    solana_instruction::{error::InstructionError, AccountMeta, Instruction},
    solana_pubkey::Pubkey,
    solana_rent::Rent,
    spl_token_interface::instruction::TokenInstruction,
};

const CORE_BRIDGE_COMPUTE_UNITS: u64 = 25_000;
const TOKEN_BRIDGE_COMPUTE_UNITS: u64 = 40_000;

/// The core bridge's legacy post-message instruction.
#[derive(Debug, Default)]
pub struct CoreBridgeModel;

impl CoreBridgeModel {
    fn read_sequence(account: &Account) -> Result<u64, InstructionError> {
        match account.data.as_slice() {
            [] => Ok(0),
            data => data
                .get(..8)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u64::from_le_bytes)
                .ok_or(InstructionError::InvalidAccountData),
        }
    }
}

impl Program for CoreBridgeModel {
    fn name(&self) -> &str {
        "wormhole_core_bridge"
    }

    fn process(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
    ) -> Result<(), InstructionError> {
        let args = PostMessageArgs::unpack(&instruction.data)
            .map_err(|_| InstructionError::InvalidInstructionData)?;
        ctx.consume(CORE_BRIDGE_COMPUTE_UNITS);

        let program_id = instruction.program_id;
        let config = account_meta(instruction, 0)?;
        let message = account_meta(instruction, 1)?;
        let emitter = account_meta(instruction, 2)?;
        let sequence = account_meta(instruction, 3)?;
        let payer = account_meta(instruction, 4)?;
        let fee_collector = account_meta(instruction, 5)?;

        require_key(config, &pda::core_bridge_config(&program_id))?;
        require_key(
            sequence,
            &pda::core_emitter_sequence(&program_id, &emitter.pubkey),
        )?;
        require_key(fee_collector, &pda::core_fee_collector(&program_id))?;
        require_signer(message)?;
        require_signer(emitter)?;
        require_signer(payer)?;

        if !is_uninitialized(ctx.account(&message.pubkey)?) {
            return Err(InstructionError::AccountAlreadyInitialized);
        }

        let rent = Rent::default();
        let sequence_account = ctx.account(&sequence.pubkey)?;
        let current = Self::read_sequence(sequence_account)?;
        if is_uninitialized(sequence_account) {
            ctx.debit_lamports(payer, rent.minimum_balance(8))?;
            let account = ctx.account_mut(sequence)?;
            account.lamports = rent.minimum_balance(8);
            account.owner = program_id;
        }
        ctx.account_mut(sequence)?.data = current
            .checked_add(1)
            .ok_or(InstructionError::ArithmeticOverflow)?
            .to_le_bytes()
            .to_vec();

        let posted = PostedMessageV1 {
            consistency_level: args.consistency_level,
            emitter_authority: Pubkey::default(),
            status: MessageStatus::Published,
            posted_timestamp: ctx.clock().unix_timestamp as u32,
            nonce: args.nonce,
            sequence: current,
            emitter_chain: SOLANA_CHAIN,
            emitter: emitter.pubkey,
            payload: args.payload,
        };
        let data = posted.encode();
        let lamports = rent.minimum_balance(data.len());
        ctx.debit_lamports(payer, lamports)?;
        *ctx.account_mut(message)? = Account {
            lamports,
            data,
            owner: program_id,
            executable: false,
            rent_epoch: 0,
        };

        ctx.msg(format!("Sequence: {current}"));
        Ok(())
    }
}

/// The token bridge's legacy native transfers.
///
/// `truncate` controls whether the amount moved into custody is rounded
/// down to the message precision. A deployment that skips this locks
/// more than its message accounts for.
#[derive(Debug)]
pub struct TokenBridgeModel {
    truncate: bool,
}

impl Default for TokenBridgeModel {
    fn default() -> Self {
        Self::new()
    }
}

/// The parts of a legacy transfer that differ between the two variants.
enum TransferKind {
    Native(TransferArgs),
    WithPayload(TransferWithPayloadArgs),
}

impl TransferKind {
    fn nonce(&self) -> u32 {
        match self {
            TransferKind::Native(args) => args.nonce,
            TransferKind::WithPayload(args) => args.nonce,
        }
    }

    fn amount(&self) -> u64 {
        match self {
            TransferKind::Native(args) => args.amount,
            TransferKind::WithPayload(args) => args.amount,
        }
    }

    fn recipient_chain(&self) -> u16 {
        match self {
            TransferKind::Native(args) => args.recipient_chain,
            TransferKind::WithPayload(args) => args.redeemer_chain,
        }
    }

    /// Accounts before the rent, system, core bridge and token trailer.
    fn leading_accounts(&self) -> usize {
        match self {
            TransferKind::Native(_) => SENDER_AUTHORITY_INDEX,
            TransferKind::WithPayload(_) => SENDER_AUTHORITY_INDEX + 1,
        }
    }
}

impl TokenBridgeModel {
    pub fn new() -> Self {
        Self { truncate: true }
    }

    /// A deployment that moves the full requested amount into custody.
    pub fn without_truncation() -> Self {
        Self { truncate: false }
    }

    fn sender(
        instruction: &Instruction,
        args: &TransferWithPayloadArgs,
    ) -> Result<[u8; 32], InstructionError> {
        let sender_authority = account_meta(instruction, SENDER_AUTHORITY_INDEX)?;
        require_signer(sender_authority)?;
        match &args.cpi_program_id {
            Some(cpi_program_id) => {
                require_key(sender_authority, &pda::sender_authority(cpi_program_id))?;
                Ok(cpi_program_id.to_bytes())
            }
            None => Ok(sender_authority.pubkey.to_bytes()),
        }
    }

    fn transfer_native(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
        kind: TransferKind,
    ) -> Result<(), InstructionError> {
        let token_bridge = instruction.program_id;
        let payer = account_meta(instruction, 0)?;
        let config = account_meta(instruction, 1)?;
        let src_token = account_meta(instruction, 2)?;
        let mint = account_meta(instruction, 3)?;
        let custody_token = account_meta(instruction, 4)?;
        let transfer_authority = account_meta(instruction, 5)?;
        let custody_authority = account_meta(instruction, 6)?;
        let core_message = account_meta(instruction, CORE_MESSAGE_INDEX)?;
        let emitter = account_meta(instruction, 9)?;

        let trailer = kind.leading_accounts();
        let core_bridge = account_meta(instruction, trailer + 2)?;
        let token_program = account_meta(instruction, trailer + 3)?;

        require_signer(payer)?;
        require_key(config, &pda::config(&token_bridge))?;
        require_key(
            custody_token,
            &pda::custody_token(&token_bridge, &mint.pubkey),
        )?;
        require_key(transfer_authority, &pda::transfer_authority(&token_bridge))?;
        require_key(custody_authority, &pda::custody_authority(&token_bridge))?;
        require_key(emitter, &pda::emitter(&token_bridge))?;
        if token_program.pubkey != token::ID {
            return Err(InstructionError::IncorrectProgramId);
        }

        let decimals = unpack_mint(ctx.account(&mint.pubkey)?)?.decimals;
        if unpack_token_account(ctx.account(&src_token.pubkey)?)?.mint != mint.pubkey {
            return Err(InstructionError::InvalidAccountData);
        }
        if kind.recipient_chain() == SOLANA_CHAIN {
            return Err(InstructionError::InvalidArgument);
        }

        let amount = kind.amount();
        let normalized = normalize_amount(amount, decimals);
        if normalized == 0 {
            return Err(InstructionError::InvalidArgument);
        }
        let custody_amount = if self.truncate {
            transferable_amount(amount, decimals)
        } else {
            amount
        };

        let token_address = mint.pubkey.to_bytes();
        let message = match &kind {
            TransferKind::Native(args) => {
                if args.relayer_fee > amount {
                    return Err(InstructionError::InvalidArgument);
                }
                TokenBridgeMessage::Transfer(Transfer {
                    amount: normalized,
                    token_address,
                    token_chain: SOLANA_CHAIN,
                    recipient: args.recipient,
                    recipient_chain: args.recipient_chain,
                    relayer_fee: normalize_amount(args.relayer_fee, decimals),
                })
            }
            TransferKind::WithPayload(args) => {
                TokenBridgeMessage::TransferWithPayload(TransferWithPayload {
                    amount: normalized,
                    token_address,
                    token_chain: SOLANA_CHAIN,
                    redeemer: args.redeemer,
                    redeemer_chain: args.redeemer_chain,
                    sender: Self::sender(instruction, args)?,
                    payload: args.payload.clone(),
                })
            }
        };

        if is_uninitialized(ctx.account(&custody_token.pubkey)?) {
            create_token_account(
                ctx,
                payer,
                custody_token,
                &mint.pubkey,
                &custody_authority.pubkey,
            )?;
        }

        let transfer = custody_transfer(
            &src_token.pubkey,
            &custody_token.pubkey,
            &transfer_authority.pubkey,
            custody_amount,
        );
        ctx.invoke_signed(&transfer, &[transfer_authority.pubkey])?;

        let post_message = legacy_post_message(
            &core_bridge.pubkey,
            &core_message.pubkey,
            &emitter.pubkey,
            &payer.pubkey,
            &PostMessageArgs {
                nonce: kind.nonce(),
                payload: message.encode(),
                consistency_level: CONSISTENCY_LEVEL_FINALIZED,
            },
        );
        ctx.invoke_signed(&post_message, &[emitter.pubkey])
    }
}

/// Move `amount` into custody, spending the sender's approval to
/// `transfer_authority`.
#[allow(deprecated)]
fn custody_transfer(
    src_token: &Pubkey,
    custody_token: &Pubkey,
    transfer_authority: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: token::ID,
        accounts: vec![
            AccountMeta::new(*src_token, false),
            AccountMeta::new(*custody_token, false),
            AccountMeta::new_readonly(*transfer_authority, true),
        ],
        data: TokenInstruction::Transfer { amount }.pack(),
    }
}

impl Program for TokenBridgeModel {
    fn name(&self) -> &str {
        "wormhole_token_bridge"
    }

    fn process(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
    ) -> Result<(), InstructionError> {
        let selector = instruction
            .data
            .first()
            .copied()
            .ok_or(InstructionError::InvalidInstructionData)?;
        let kind = match LegacyInstruction::try_from(selector)
            .map_err(|_| InstructionError::InvalidInstructionData)?
        {
            LegacyInstruction::TransferTokensNative => TransferKind::Native(
                TransferArgs::unpack(&instruction.data)
                    .map_err(|_| InstructionError::InvalidInstructionData)?,
            ),
            LegacyInstruction::TransferTokensWithPayloadNative => TransferKind::WithPayload(
                TransferWithPayloadArgs::unpack(&instruction.data)
                    .map_err(|_| InstructionError::InvalidInstructionData)?,
            ),
        };
        ctx.consume(TOKEN_BRIDGE_COMPUTE_UNITS);
        ctx.msg(match kind {
            TransferKind::Native(_) => "Instruction: TransferTokensNative",
            TransferKind::WithPayload(_) => "Instruction: TransferTokensWithPayloadNative",
        });
        self.transfer_native(ctx, instruction, kind)
    }
}
