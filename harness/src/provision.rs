//! Funds the payer with tokens of every fixture mint before a suite runs.

use {
    crate::{cluster::Cluster, fixtures::MintInfo},
    fork_harness_error::HarnessError,
    fork_harness_programs_token::{associated_token, token},
    log::{debug, info},
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
};

/// Make sure `payer` owns an associated token account for every mint and
/// mint `amount` into each, one transaction per mint. The payer must be
/// the mint authority.
///
/// Returns the token accounts in mint order.
pub async fn provision<C: Cluster>(
    cluster: &C,
    mints: &[MintInfo],
    payer: &Keypair,
    amount: u64,
) -> Result<Vec<Pubkey>, HarnessError> {
    let owner = payer.pubkey();
    let mut token_accounts = Vec::with_capacity(mints.len());

    for mint in mints {
        let token_account = associated_token::address(&owner, &mint.address);
        let mint_to = token::mint_to(&mint.address, &token_account, &owner, amount).map_err(
            |err| HarnessError::Provision {
                mint: mint.address,
                reason: err.to_string(),
            },
        )?;
        let instructions = [
            associated_token::create_idempotent(&owner, &owner, &mint.address),
            mint_to,
        ];

        debug!(
            "Provisioning {amount} of {} into {token_account}",
            mint.address
        );
        let result = cluster
            .process_transaction(&instructions, &owner, &[payer])
            .await;
        if result.is_err() {
            return Err(HarnessError::Provision {
                mint: mint.address,
                reason: result.summary(),
            });
        }
        info!("Provisioned {token_account} ({} decimals)", mint.decimals);
        token_accounts.push(token_account);
    }

    Ok(token_accounts)
}
