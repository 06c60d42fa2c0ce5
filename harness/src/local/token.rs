//! SPL Token and Associated Token Account models.

use {
    super::{
        context::{account_meta, is_uninitialized, require_signer, InvokeContext},
        Program,
    },
    fork_harness_programs_token::{
        associated_token,
        token::{self, TokenError},
    },
    solana_account::Account,
    solana_instruction::{error::InstructionError, AccountMeta, Instruction},
    solana_program_pack::Pack,
    solana_pubkey::Pubkey,
    spl_token_interface::{
        instruction::TokenInstruction,
        state::{Account as TokenAccount, AccountState, Mint},
    },
};

const TOKEN_COMPUTE_UNITS: u64 = 4_500;
const ASSOCIATED_TOKEN_COMPUTE_UNITS: u64 = 12_000;

fn token_err(error: TokenError) -> InstructionError {
    InstructionError::Custom(error as u32)
}

pub(crate) fn unpack_token_account(account: &Account) -> Result<TokenAccount, InstructionError> {
    if account.owner != token::ID {
        return Err(InstructionError::IncorrectProgramId);
    }
    TokenAccount::unpack(&account.data).map_err(|_| InstructionError::InvalidAccountData)
}

pub(crate) fn unpack_mint(account: &Account) -> Result<Mint, InstructionError> {
    if account.owner != token::ID {
        return Err(InstructionError::IncorrectProgramId);
    }
    Mint::unpack(&account.data).map_err(|_| InstructionError::InvalidAccountData)
}

fn store_token_account(
    ctx: &mut InvokeContext,
    meta: &AccountMeta,
    state: TokenAccount,
) -> Result<(), InstructionError> {
    let account = ctx.account_mut(meta)?;
    TokenAccount::pack(state, &mut account.data).map_err(|_| InstructionError::InvalidAccountData)
}

fn validate_owner(owner: &Pubkey, authority: &AccountMeta) -> Result<(), InstructionError> {
    if owner != &authority.pubkey {
        return Err(token_err(TokenError::OwnerMismatch));
    }
    require_signer(authority)
}

/// Create a zero-balance token account at `meta`, paid for by `funding`.
pub(crate) fn create_token_account(
    ctx: &mut InvokeContext,
    funding: &AccountMeta,
    meta: &AccountMeta,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<(), InstructionError> {
    let account = token::create_account_for_token_account(token::new_token_account(mint, owner, 0));
    ctx.debit_lamports(funding, account.lamports)?;
    *ctx.account_mut(meta)? = account;
    Ok(())
}

/// The subset of SPL Token the harness drives: minting, delegating and
/// transferring.
#[derive(Debug, Default)]
pub struct TokenModel;

impl TokenModel {
    fn mint_to(
        ctx: &mut InvokeContext,
        instruction: &Instruction,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let mint_meta = account_meta(instruction, 0)?;
        let destination_meta = account_meta(instruction, 1)?;
        let authority = account_meta(instruction, 2)?;

        let mut mint = unpack_mint(ctx.account(&mint_meta.pubkey)?)?;
        let mut destination = unpack_token_account(ctx.account(&destination_meta.pubkey)?)?;

        if destination.state == AccountState::Frozen {
            return Err(token_err(TokenError::AccountFrozen));
        }
        if destination.mint != mint_meta.pubkey {
            return Err(token_err(TokenError::MintMismatch));
        }
        match Option::<Pubkey>::from(mint.mint_authority) {
            Some(mint_authority) => validate_owner(&mint_authority, authority)?,
            None => return Err(token_err(TokenError::FixedSupply)),
        }

        destination.amount = destination
            .amount
            .checked_add(amount)
            .ok_or(token_err(TokenError::Overflow))?;
        mint.supply = mint
            .supply
            .checked_add(amount)
            .ok_or(token_err(TokenError::Overflow))?;

        store_token_account(ctx, destination_meta, destination)?;
        let mint_account = ctx.account_mut(mint_meta)?;
        Mint::pack(mint, &mut mint_account.data).map_err(|_| InstructionError::InvalidAccountData)
    }

    fn approve(
        ctx: &mut InvokeContext,
        instruction: &Instruction,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let source_meta = account_meta(instruction, 0)?;
        let delegate = account_meta(instruction, 1)?;
        let owner = account_meta(instruction, 2)?;

        let mut source = unpack_token_account(ctx.account(&source_meta.pubkey)?)?;
        if source.state == AccountState::Frozen {
            return Err(token_err(TokenError::AccountFrozen));
        }
        validate_owner(&source.owner, owner)?;

        source.delegate = Some(delegate.pubkey).into();
        source.delegated_amount = amount;
        store_token_account(ctx, source_meta, source)
    }

    fn revoke(ctx: &mut InvokeContext, instruction: &Instruction) -> Result<(), InstructionError> {
        let source_meta = account_meta(instruction, 0)?;
        let owner = account_meta(instruction, 1)?;

        let mut source = unpack_token_account(ctx.account(&source_meta.pubkey)?)?;
        if source.state == AccountState::Frozen {
            return Err(token_err(TokenError::AccountFrozen));
        }
        validate_owner(&source.owner, owner)?;

        source.delegate = None.into();
        source.delegated_amount = 0;
        store_token_account(ctx, source_meta, source)
    }

    fn transfer(
        ctx: &mut InvokeContext,
        source_meta: &AccountMeta,
        mint: Option<(&AccountMeta, u8)>,
        destination_meta: &AccountMeta,
        authority: &AccountMeta,
        amount: u64,
    ) -> Result<(), InstructionError> {
        let mut source = unpack_token_account(ctx.account(&source_meta.pubkey)?)?;
        let mut destination = unpack_token_account(ctx.account(&destination_meta.pubkey)?)?;

        if source.state == AccountState::Frozen || destination.state == AccountState::Frozen {
            return Err(token_err(TokenError::AccountFrozen));
        }
        if source.amount < amount {
            return Err(token_err(TokenError::InsufficientFunds));
        }
        if source.mint != destination.mint {
            return Err(token_err(TokenError::MintMismatch));
        }
        if let Some((mint_meta, decimals)) = mint {
            if mint_meta.pubkey != source.mint {
                return Err(token_err(TokenError::MintMismatch));
            }
            if unpack_mint(ctx.account(&mint_meta.pubkey)?)?.decimals != decimals {
                return Err(token_err(TokenError::MintDecimalsMismatch));
            }
        }

        match Option::<Pubkey>::from(source.delegate) {
            Some(delegate) if delegate == authority.pubkey => {
                require_signer(authority)?;
                if source.delegated_amount < amount {
                    return Err(token_err(TokenError::InsufficientFunds));
                }
                source.delegated_amount -= amount;
                if source.delegated_amount == 0 {
                    source.delegate = None.into();
                }
            }
            _ => validate_owner(&source.owner, authority)?,
        }

        if source_meta.pubkey == destination_meta.pubkey {
            return store_token_account(ctx, source_meta, source);
        }

        source.amount -= amount;
        destination.amount = destination
            .amount
            .checked_add(amount)
            .ok_or(token_err(TokenError::Overflow))?;
        store_token_account(ctx, source_meta, source)?;
        store_token_account(ctx, destination_meta, destination)
    }
}

impl Program for TokenModel {
    fn name(&self) -> &str {
        "spl_token"
    }

    #[allow(deprecated)]
    fn process(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
    ) -> Result<(), InstructionError> {
        let token_instruction = TokenInstruction::unpack(&instruction.data)
            .map_err(|_| InstructionError::InvalidInstructionData)?;
        ctx.consume(TOKEN_COMPUTE_UNITS);

        match token_instruction {
            TokenInstruction::MintTo { amount } => {
                ctx.msg("Instruction: MintTo");
                Self::mint_to(ctx, instruction, amount)
            }
            TokenInstruction::Approve { amount } => {
                ctx.msg("Instruction: Approve");
                Self::approve(ctx, instruction, amount)
            }
            TokenInstruction::Revoke => {
                ctx.msg("Instruction: Revoke");
                Self::revoke(ctx, instruction)
            }
            TokenInstruction::Transfer { amount } => {
                ctx.msg("Instruction: Transfer");
                Self::transfer(
                    ctx,
                    account_meta(instruction, 0)?,
                    None,
                    account_meta(instruction, 1)?,
                    account_meta(instruction, 2)?,
                    amount,
                )
            }
            TokenInstruction::TransferChecked { amount, decimals } => {
                ctx.msg("Instruction: TransferChecked");
                Self::transfer(
                    ctx,
                    account_meta(instruction, 0)?,
                    Some((account_meta(instruction, 1)?, decimals)),
                    account_meta(instruction, 2)?,
                    account_meta(instruction, 3)?,
                    amount,
                )
            }
            _ => Err(InstructionError::InvalidInstructionData),
        }
    }
}

/// Associated Token Account creation, plain and idempotent.
#[derive(Debug, Default)]
pub struct AssociatedTokenModel;

impl Program for AssociatedTokenModel {
    fn name(&self) -> &str {
        "spl_associated_token_account"
    }

    fn process(
        &self,
        ctx: &mut InvokeContext,
        instruction: &Instruction,
    ) -> Result<(), InstructionError> {
        let idempotent = match instruction.data.as_slice() {
            [] | [0] => false,
            [1] => true,
            _ => return Err(InstructionError::InvalidInstructionData),
        };
        ctx.consume(ASSOCIATED_TOKEN_COMPUTE_UNITS);
        ctx.msg(if idempotent {
            "CreateIdempotent"
        } else {
            "Create"
        });

        let funding = account_meta(instruction, 0)?;
        let associated = account_meta(instruction, 1)?;
        let wallet = account_meta(instruction, 2)?;
        let mint = account_meta(instruction, 3)?;

        require_signer(funding)?;
        if associated_token::address(&wallet.pubkey, &mint.pubkey) != associated.pubkey {
            return Err(InstructionError::InvalidSeeds);
        }

        let existing = ctx.account(&associated.pubkey)?;
        if !is_uninitialized(existing) {
            if !idempotent {
                return Err(InstructionError::AccountAlreadyInitialized);
            }
            let state = unpack_token_account(existing)?;
            if state.owner != wallet.pubkey || state.mint != mint.pubkey {
                return Err(InstructionError::IllegalOwner);
            }
            return Ok(());
        }

        unpack_mint(ctx.account(&mint.pubkey)?)?;
        create_token_account(ctx, funding, associated, &mint.pubkey, &wallet.pubkey)
    }
}
