use {
    solana_account::{Account, ReadableAccount},
    solana_instruction::Instruction,
    solana_program_error::ProgramError,
    solana_program_pack::Pack,
    solana_pubkey::Pubkey,
    solana_rent::Rent,
    spl_token_interface::{
        instruction,
        state::{Account as TokenAccount, AccountState, Mint},
    },
};

pub use spl_token_interface::error::TokenError;

pub const ID: Pubkey = solana_pubkey::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Delegate `amount` of `source` to `delegate`, signed by `owner`.
pub fn approve(
    source: &Pubkey,
    delegate: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    instruction::approve(&ID, source, delegate, owner, &[], amount)
}

/// Clear any delegation on `source`, signed by `owner`.
pub fn revoke(source: &Pubkey, owner: &Pubkey) -> Result<Instruction, ProgramError> {
    instruction::revoke(&ID, source, owner, &[])
}

/// Mint `amount` into `destination`, signed by `mint_authority`.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    mint_authority: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    instruction::mint_to(&ID, mint, destination, mint_authority, &[], amount)
}

/// Create a Mint Account
pub fn create_account_for_mint(mint_data: Mint) -> Account {
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(mint_data, &mut data).expect("mint data fits Mint::LEN");

    Account {
        lamports: Rent::default().minimum_balance(Mint::LEN),
        data,
        owner: ID,
        executable: false,
        rent_epoch: 0,
    }
}

/// Create an initialized mint with no freeze authority.
pub fn new_mint(mint_authority: &Pubkey, decimals: u8, supply: u64) -> Mint {
    Mint {
        mint_authority: Some(*mint_authority).into(),
        supply,
        decimals,
        is_initialized: true,
        freeze_authority: None.into(),
    }
}

/// Create a Token Account
pub fn create_account_for_token_account(token_account_data: TokenAccount) -> Account {
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(token_account_data, &mut data).expect("token data fits Account::LEN");

    Account {
        lamports: Rent::default().minimum_balance(TokenAccount::LEN),
        data,
        owner: ID,
        executable: false,
        rent_epoch: 0,
    }
}

/// Create an initialized token account with no delegate.
pub fn new_token_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> TokenAccount {
    TokenAccount {
        mint: *mint,
        owner: *owner,
        amount,
        delegate: None.into(),
        state: AccountState::Initialized,
        is_native: None.into(),
        delegated_amount: 0,
        close_authority: None.into(),
    }
}

/// Decode a token account owned by the token program.
pub fn unpack_token_account(account: &impl ReadableAccount) -> Option<TokenAccount> {
    if account.owner() != &ID {
        return None;
    }
    TokenAccount::unpack(account.data()).ok()
}

/// Decode a mint owned by the token program.
pub fn unpack_mint(account: &impl ReadableAccount) -> Option<Mint> {
    if account.owner() != &ID {
        return None;
    }
    Mint::unpack(account.data()).ok()
}

#[cfg(test)]
mod tests {
    use {super::*, spl_token_interface::instruction::TokenInstruction};

    #[test]
    fn test_approve_encodes_amount_and_accounts() {
        let source = Pubkey::new_unique();
        let delegate = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix = approve(&source, &delegate, &owner, 88_888_888).unwrap();
        assert_eq!(ix.program_id, ID);
        assert_eq!(ix.accounts[0].pubkey, source);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, delegate);
        assert_eq!(ix.accounts[2].pubkey, owner);
        assert!(ix.accounts[2].is_signer);
        assert_eq!(
            TokenInstruction::unpack(&ix.data).unwrap(),
            TokenInstruction::Approve { amount: 88_888_888 }
        );
    }

    #[test]
    fn test_revoke_is_signed_by_owner() {
        let source = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let ix = revoke(&source, &owner).unwrap();
        assert_eq!(ix.program_id, ID);
        assert_eq!(ix.accounts.len(), 2);
        assert!(ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[1].pubkey, owner);
        assert!(ix.accounts[1].is_signer);
        assert_eq!(TokenInstruction::unpack(&ix.data).unwrap(), TokenInstruction::Revoke);
    }

    #[test]
    fn test_token_account_round_trip() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let account = create_account_for_token_account(new_token_account(&mint, &owner, 42));
        let decoded = unpack_token_account(&account).unwrap();
        assert_eq!(decoded.amount, 42);
        assert_eq!(decoded.owner, owner);
        assert!(decoded.delegate.is_none());

        let mint_account = create_account_for_mint(new_mint(&owner, 9, 42));
        assert_eq!(unpack_mint(&mint_account).unwrap().decimals, 9);
        assert!(unpack_token_account(&mint_account).is_none());
    }

    #[test]
    fn test_unpack_rejects_foreign_owner() {
        let mut account =
            create_account_for_token_account(new_token_account(&Pubkey::new_unique(), &ID, 1));
        account.owner = Pubkey::new_unique();
        assert!(unpack_token_account(&account).is_none());
    }
}
