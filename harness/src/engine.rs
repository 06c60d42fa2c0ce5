//! Submits both sides of an instruction pair concurrently and collects
//! what each left behind.

use {
    crate::{cluster::Cluster, pair::InstructionPair, pair::InstructionSequence},
    fork_harness_error::{HarnessError, Side},
    fork_harness_keys::KeyMap,
    fork_harness_result::{ExecutionResult, FailureReason, SideOutcome, TransactionFailure},
    log::{debug, warn},
    solana_account::Account,
    solana_keypair::Keypair,
    solana_signer::Signer,
    solana_transaction_error::TransactionError,
};

async fn submit<C: Cluster>(
    cluster: &C,
    sequence: &InstructionSequence,
    payer: &Keypair,
    sender_authority: &Keypair,
) -> ExecutionResult {
    let payer_key = payer.pubkey();
    let key_map = KeyMap::compile_with_payer(&payer_key, &sequence.instructions);
    let available = [payer, &sequence.message, sender_authority];
    let signers = match key_map.select_signers(&available) {
        Ok(signers) => signers,
        Err(err) => {
            warn!("[{}] {err}", sequence.side);
            return ExecutionResult::Failed(TransactionFailure {
                reason: FailureReason::Transaction(TransactionError::SignatureFailure),
                logs: vec![],
            });
        }
    };

    debug!(
        "[{}] Submitting {} instruction(s) with {} signer(s)",
        sequence.side,
        sequence.instructions.len(),
        signers.len()
    );
    let result = cluster
        .process_transaction(&sequence.instructions, &payer_key, &signers)
        .await;
    debug!("[{}] {}", sequence.side, result.summary());
    result
}

async fn read_message<C: Cluster>(
    cluster: &C,
    sequence: &InstructionSequence,
) -> Result<Option<Account>, HarnessError> {
    let address = sequence.message_address();
    cluster.get_account(&address).await.map_err(|err| {
        warn!(
            "[{}] Could not read message account {address}: {err}",
            sequence.side
        );
        HarnessError::ReadBack {
            side: sequence.side,
            address,
            reason: err.to_string().trim().to_string(),
        }
    })
}

/// Both sides of an executed pair.
#[derive(Debug)]
pub struct PairExecution {
    pub candidate: SideOutcome,
    pub reference: SideOutcome,
    /// Message accounts that could not be read back. The matching outcome
    /// carries no message account, whatever the cluster actually holds.
    pub read_errors: Vec<HarnessError>,
}

impl PairExecution {
    /// Whether the message account of `side` was read back.
    pub fn was_read(&self, side: Side) -> bool {
        !self.read_errors.iter().any(|err| err.side() == Some(side))
    }
}

/// Execute both sides of `pair`, each as its own transaction.
///
/// The two submissions are joined on the current task, so neither waits
/// for the other to confirm. Once both have settled, both message
/// accounts are read back, again concurrently.
pub async fn execute<C: Cluster>(
    cluster: &C,
    pair: &InstructionPair,
    payer: &Keypair,
    sender_authority: &Keypair,
) -> PairExecution {
    let (candidate_result, reference_result) = tokio::join!(
        submit(cluster, &pair.candidate, payer, sender_authority),
        submit(cluster, &pair.reference, payer, sender_authority),
    );
    let (candidate_message, reference_message) = tokio::join!(
        read_message(cluster, &pair.candidate),
        read_message(cluster, &pair.reference),
    );

    let mut read_errors = vec![];
    let mut outcome = |sequence: &InstructionSequence,
                       result: ExecutionResult,
                       message: Result<Option<Account>, HarnessError>| SideOutcome {
        side: sequence.side,
        program_ids: sequence.deployment.program_ids(),
        message_address: sequence.message_address(),
        result,
        message_account: match message {
            Ok(account) => account,
            Err(err) => {
                read_errors.push(err);
                None
            }
        },
    };
    let candidate = outcome(&pair.candidate, candidate_result, candidate_message);
    let reference = outcome(&pair.reference, reference_result, reference_message);
    PairExecution {
        candidate,
        reference,
        read_errors,
    }
}
