use {
    crate::token,
    solana_account::Account,
    solana_instruction::Instruction,
    solana_pubkey::Pubkey,
    spl_associated_token_account_interface::{
        address::get_associated_token_address_with_program_id,
        instruction::create_associated_token_account_idempotent,
    },
    spl_token_interface::state::Account as TokenAccount,
};

pub const ID: Pubkey = solana_pubkey::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// The canonical token account of `wallet` for `mint`.
pub fn address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(wallet, mint, &token::ID)
}

/// Create the canonical token account of `wallet` for `mint`, succeeding
/// if it already exists.
pub fn create_idempotent(funding: &Pubkey, wallet: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(funding, wallet, mint, &token::ID)
}

/// Create an Associated Token Account
pub fn create_account_for_associated_token_account(
    token_account_data: TokenAccount,
) -> (Pubkey, Account) {
    let associated_token_address = address(&token_account_data.owner, &token_account_data.mint);
    let account = token::create_account_for_token_account(token_account_data);
    (associated_token_address, account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_deterministic_per_wallet_and_mint() {
        let wallet = Pubkey::new_unique();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();

        assert_eq!(address(&wallet, &mint_a), address(&wallet, &mint_a));
        assert_ne!(address(&wallet, &mint_a), address(&wallet, &mint_b));
    }

    #[test]
    fn test_create_idempotent_targets_derived_address() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ix = create_idempotent(&wallet, &wallet, &mint);
        assert_eq!(ix.program_id, ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts[1].pubkey, address(&wallet, &mint));
    }

    #[test]
    fn test_keyed_token_account() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let (key, account) = create_account_for_associated_token_account(
            token::new_token_account(&mint, &wallet, 10),
        );
        assert_eq!(key, address(&wallet, &mint));
        assert_eq!(token::unpack_token_account(&account).unwrap().amount, 10);
    }
}
