//! The capability the harness needs from a cluster: submit a transaction,
//! read an account.

use {
    fork_harness_error::HarnessError,
    fork_harness_result::ExecutionResult,
    solana_account::Account,
    solana_instruction::Instruction,
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
};

/// A cluster hosting both deployments.
///
/// Futures are not required to be `Send`: the engine joins both sides on
/// the current task instead of spawning them.
#[allow(async_fn_in_trait)]
pub trait Cluster {
    /// Sign `instructions` as one transaction paid for by `payer`, submit
    /// it and wait until it is confirmed or rejected.
    ///
    /// `signers` must hold exactly the keypairs the transaction requires.
    async fn process_transaction(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> ExecutionResult;

    /// Read an account, `None` if it does not exist.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, HarnessError>;
}
