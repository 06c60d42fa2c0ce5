//! A live cluster behind a JSON-RPC endpoint.

use {
    crate::cluster::Cluster,
    fork_harness_error::HarnessError,
    fork_harness_result::{
        ExecutionResult, FailureReason, TokenBalanceChange, TransactionDetails,
        TransactionFailure,
    },
    log::{debug, warn},
    solana_account::Account,
    solana_client::{
        client_error::{ClientError, ClientErrorKind},
        nonblocking::rpc_client::RpcClient,
        rpc_config::RpcTransactionConfig,
        rpc_request::{RpcError, RpcResponseErrorData},
    },
    solana_commitment_config::CommitmentConfig,
    solana_instruction::Instruction,
    solana_keypair::Keypair,
    solana_message::Message,
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    solana_transaction::Transaction,
    solana_transaction_error::TransactionError,
    solana_transaction_status_client_types::{UiTransactionEncoding, UiTransactionTokenBalance},
    std::{collections::BTreeMap, str::FromStr},
};

pub struct RpcCluster {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcCluster {
    pub fn new(url: impl Into<String>) -> Self {
        Self::new_with_commitment(url, CommitmentConfig::confirmed())
    }

    pub fn new_with_commitment(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), commitment),
            commitment,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Fetch slot, logs, compute units and token balances of a confirmed
    /// transaction.
    async fn fetch_details(
        &self,
        signature: Signature,
        message: &Message,
    ) -> Result<TransactionDetails, ClientError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let transaction = self
            .client
            .get_transaction_with_config(&signature, config)
            .await?;

        let Some(meta) = transaction.transaction.meta else {
            warn!("Transaction {signature} returned without status meta");
            return Ok(TransactionDetails {
                signature,
                slot: transaction.slot,
                logs: vec![],
                compute_units_consumed: None,
                token_balances: vec![],
            });
        };

        let logs: Option<Vec<String>> = meta.log_messages.into();
        let pre: Option<Vec<UiTransactionTokenBalance>> = meta.pre_token_balances.into();
        let post: Option<Vec<UiTransactionTokenBalance>> = meta.post_token_balances.into();

        Ok(TransactionDetails {
            signature,
            slot: transaction.slot,
            logs: logs.unwrap_or_default(),
            compute_units_consumed: meta.compute_units_consumed.into(),
            token_balances: token_balance_changes(
                &message.account_keys,
                &pre.unwrap_or_default(),
                &post.unwrap_or_default(),
            ),
        })
    }
}

/// Pair pre and post token balances by account index. An account missing
/// on one side was created or closed by the transaction and counts as 0.
fn token_balance_changes(
    account_keys: &[Pubkey],
    pre: &[UiTransactionTokenBalance],
    post: &[UiTransactionTokenBalance],
) -> Vec<TokenBalanceChange> {
    type PrePost<'a> = (
        Option<&'a UiTransactionTokenBalance>,
        Option<&'a UiTransactionTokenBalance>,
    );
    let mut by_index: BTreeMap<u8, PrePost> = BTreeMap::new();
    for balance in pre {
        by_index.entry(balance.account_index).or_default().0 = Some(balance);
    }
    for balance in post {
        by_index.entry(balance.account_index).or_default().1 = Some(balance);
    }

    by_index
        .into_iter()
        .filter_map(|(index, (pre, post))| {
            let address = account_keys.get(index as usize)?;
            let mint = pre.or(post).map(|b| b.mint.as_str())?;
            let Ok(mint) = Pubkey::from_str(mint) else {
                warn!("Unparseable mint {mint} in token balance of {address}");
                return None;
            };
            // No balance on one side means the account did not exist then.
            let amount = |balance: Option<&UiTransactionTokenBalance>| match balance {
                None => Some(0),
                Some(balance) => balance.ui_token_amount.amount.parse::<u64>().ok(),
            };
            let (Some(pre), Some(post)) = (amount(pre), amount(post)) else {
                warn!("Unparseable amount in token balance of {address}");
                return None;
            };
            Some(TokenBalanceChange {
                address: *address,
                mint,
                pre,
                post,
            })
        })
        .collect()
}

/// Logs of a transaction rejected during preflight simulation.
fn preflight_logs(err: &ClientError) -> Vec<String> {
    match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(simulation),
            ..
        }) => simulation.logs.clone().unwrap_or_default(),
        _ => vec![],
    }
}

fn failure_from_client_error(err: &ClientError) -> TransactionFailure {
    let reason = match err.get_transaction_error() {
        Some(error) => FailureReason::Transaction(error),
        None => FailureReason::Rpc(err.to_string()),
    };
    TransactionFailure {
        reason,
        logs: preflight_logs(err),
    }
}

impl Cluster for RpcCluster {
    async fn process_transaction(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
    ) -> ExecutionResult {
        let blockhash = match self.client.get_latest_blockhash().await {
            Ok(blockhash) => blockhash,
            Err(err) => return ExecutionResult::Failed(failure_from_client_error(&err)),
        };

        let message = Message::new(instructions, Some(payer));
        let mut transaction = Transaction::new_unsigned(message.clone());
        if let Err(err) = transaction.try_sign(signers, blockhash) {
            debug!("Signing failed: {err}");
            return ExecutionResult::Failed(TransactionFailure {
                reason: FailureReason::Transaction(TransactionError::SignatureFailure),
                logs: vec![],
            });
        }

        let signature = match self.client.send_and_confirm_transaction(&transaction).await {
            Ok(signature) => signature,
            Err(err) => {
                debug!("Transaction rejected: {err}");
                return ExecutionResult::Failed(failure_from_client_error(&err));
            }
        };
        debug!("Transaction confirmed: {signature}");

        match self.fetch_details(signature, &message).await {
            Ok(details) => ExecutionResult::Confirmed(details),
            Err(err) => ExecutionResult::Failed(TransactionFailure {
                reason: FailureReason::Rpc(format!(
                    "confirmed {signature} but could not fetch it: {err}"
                )),
                logs: vec![],
            }),
        }
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, HarnessError> {
        self.client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|err| HarnessError::Rpc(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(index: u8, mint: &Pubkey, amount: u64) -> UiTransactionTokenBalance {
        serde_json::from_value(serde_json::json!({
            "accountIndex": index,
            "mint": mint.to_string(),
            "uiTokenAmount": {
                "uiAmount": null,
                "decimals": 8,
                "amount": amount.to_string(),
                "uiAmountString": "0",
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_token_balance_changes_pair_by_index() {
        let keys = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let mint = Pubkey::new_unique();

        let changes = token_balance_changes(
            &keys,
            &[balance(1, &mint, 1_000)],
            &[balance(1, &mint, 400), balance(2, &mint, 600)],
        );

        assert_eq!(
            changes,
            vec![
                TokenBalanceChange {
                    address: keys[1],
                    mint,
                    pre: 1_000,
                    post: 400,
                },
                TokenBalanceChange {
                    address: keys[2],
                    mint,
                    pre: 0,
                    post: 600,
                },
            ]
        );
    }

    #[test]
    fn test_token_balance_changes_skip_unknown_index() {
        let mint = Pubkey::new_unique();
        let changes = token_balance_changes(&[Pubkey::new_unique()], &[], &[balance(5, &mint, 1)]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_token_balance_changes_skip_unparseable_amount() {
        let keys = [Pubkey::new_unique(), Pubkey::new_unique()];
        let mint = Pubkey::new_unique();
        let mut garbled = balance(0, &mint, 0);
        garbled.ui_token_amount.amount = "12e3".to_string();

        let changes = token_balance_changes(
            &keys,
            &[garbled, balance(1, &mint, 10)],
            &[balance(0, &mint, 5), balance(1, &mint, 7)],
        );

        assert_eq!(
            changes,
            vec![TokenBalanceChange {
                address: keys[1],
                mint,
                pre: 10,
                post: 7,
            }]
        );
    }

    #[tokio::test]
    async fn test_new_uses_url() {
        let cluster = RpcCluster::new("http://127.0.0.1:8899");
        assert_eq!(cluster.url(), "http://127.0.0.1:8899");
    }
}
