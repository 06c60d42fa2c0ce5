//! Compare system for checking the two sides of a scenario against each
//! other.

use {
    crate::{
        config::{compare, throw, Config},
        types::SideOutcome,
    },
    fork_harness_error::Divergence,
    fork_harness_programs_token_bridge::{message::PostedMessageV1, payload::TokenBridgeMessage},
    solana_pubkey::Pubkey,
    std::collections::{BTreeMap, BTreeSet},
};

/// Which fields of the posted message must be identical on both sides.
///
/// The default skips the fields that necessarily differ between two
/// deployments: the emitter (a PDA of each token bridge), the emitter
/// authority and the posting timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct MessageFields {
    pub consistency_level: bool,
    pub emitter_authority: bool,
    pub status: bool,
    pub posted_timestamp: bool,
    pub nonce: bool,
    pub sequence: bool,
    pub emitter_chain: bool,
    pub emitter: bool,
    pub payload: bool,
}

impl Default for MessageFields {
    fn default() -> Self {
        Self {
            consistency_level: true,
            emitter_authority: false,
            status: true,
            posted_timestamp: false,
            nonce: true,
            sequence: true,
            emitter_chain: true,
            emitter: false,
            payload: true,
        }
    }
}

/// Checks to run between the reference and candidate outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub enum Compare {
    /// Both sides confirmed, or both failed with the same error class.
    Outcome,
    /// Token balance changes are numerically identical.
    TokenBalanceDeltas,
    /// The posted messages match on the selected fields.
    MessageAccount { fields: MessageFields },
    /// Logs match once each side's program ids are normalized.
    Logs,
    /// Compute units consumed are identical.
    ComputeUnits,
}

impl Compare {
    pub fn message_account() -> Self {
        Self::MessageAccount {
            fields: MessageFields::default(),
        }
    }

    /// Everything a candidate must match to be equivalent.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::Outcome,
            Self::TokenBalanceDeltas,
            Self::message_account(),
        ]
    }

    /// Validate everything, including logs and compute units.
    pub fn everything() -> Vec<Self> {
        vec![
            Self::Outcome,
            Self::TokenBalanceDeltas,
            Self::message_account(),
            Self::Logs,
            Self::ComputeUnits,
        ]
    }
}

impl SideOutcome {
    fn compare_token_balances(&self, b: &Self, c: &Config, out: &mut Vec<Divergence>) {
        let a_balances = self.result.token_balances();
        let b_balances = b.result.token_balances();

        // Accounts both transactions touched are compared by address. The
        // rest (custody accounts) belong to one deployment each and are
        // compared by mint.
        let mut a_unshared: BTreeMap<Pubkey, Vec<i128>> = BTreeMap::new();
        for a in a_balances {
            match b_balances.iter().find(|b| b.address == a.address) {
                Some(b) => {
                    compare!(
                        c,
                        out,
                        None,
                        format!("token_balance_delta[{}]", a.address),
                        a.delta(),
                        b.delta()
                    );
                }
                None => a_unshared.entry(a.mint).or_default().push(a.delta()),
            }
        }
        let mut b_unshared: BTreeMap<Pubkey, Vec<i128>> = BTreeMap::new();
        for b in b_balances {
            if !a_balances.iter().any(|a| a.address == b.address) {
                b_unshared.entry(b.mint).or_default().push(b.delta());
            }
        }
        for deltas in a_unshared.values_mut().chain(b_unshared.values_mut()) {
            deltas.sort_unstable();
        }
        let mints = a_unshared
            .keys()
            .chain(b_unshared.keys())
            .collect::<BTreeSet<_>>();
        for mint in mints {
            compare!(
                c,
                out,
                None,
                format!("token_balance_deltas[mint {mint}]"),
                a_unshared.get(mint),
                b_unshared.get(mint)
            );
        }
    }

    fn compare_messages(
        &self,
        b: &Self,
        fields: &MessageFields,
        c: &Config,
        out: &mut Vec<Divergence>,
    ) {
        let (a_msg, b_msg) = match (self.posted_message(), b.posted_message()) {
            (None, None) => return,
            (Some(Ok(a)), Some(Ok(b))) => (a, b),
            (a, b) => {
                throw!(
                    c,
                    out,
                    None,
                    "message_account",
                    describe(a.as_ref()),
                    "{}",
                    describe(b.as_ref())
                );
                return;
            }
        };

        if fields.consistency_level {
            compare!(
                c,
                out,
                None,
                "message.consistency_level",
                a_msg.consistency_level,
                b_msg.consistency_level
            );
        }
        if fields.emitter_authority {
            compare!(
                c,
                out,
                None,
                "message.emitter_authority",
                a_msg.emitter_authority,
                b_msg.emitter_authority
            );
        }
        if fields.status {
            compare!(c, out, None, "message.status", a_msg.status, b_msg.status);
        }
        if fields.posted_timestamp {
            compare!(
                c,
                out,
                None,
                "message.posted_timestamp",
                a_msg.posted_timestamp,
                b_msg.posted_timestamp
            );
        }
        if fields.nonce {
            compare!(c, out, None, "message.nonce", a_msg.nonce, b_msg.nonce);
        }
        if fields.sequence {
            compare!(c, out, None, "message.sequence", a_msg.sequence, b_msg.sequence);
        }
        if fields.emitter_chain {
            compare!(
                c,
                out,
                None,
                "message.emitter_chain",
                a_msg.emitter_chain,
                b_msg.emitter_chain
            );
        }
        if fields.emitter {
            compare!(c, out, None, "message.emitter", a_msg.emitter, b_msg.emitter);
        }
        if fields.payload && a_msg.payload != b_msg.payload {
            compare_payloads(&a_msg, &b_msg, c, out);
        }
    }

    /// Compare the reference outcome (`self`) against the candidate
    /// outcome. Divergences carry the reference value as `expected`.
    pub fn compare_with_config(
        &self,
        candidate: &Self,
        checks: &[Compare],
        config: &Config,
    ) -> Vec<Divergence> {
        let c = config;
        let b = candidate;
        let mut out = Vec::new();
        for check in checks {
            match check {
                Compare::Outcome => {
                    if compare!(c, &mut out, None, "result", self.result.is_ok(), b.result.is_ok())
                    {
                        compare!(
                            c,
                            &mut out,
                            None,
                            "error_class",
                            self.result.error_class(),
                            b.result.error_class()
                        );
                    }
                }
                Compare::TokenBalanceDeltas => {
                    self.compare_token_balances(b, c, &mut out);
                }
                Compare::MessageAccount { fields } => {
                    self.compare_messages(b, fields, c, &mut out);
                }
                Compare::Logs => {
                    compare!(
                        c,
                        &mut out,
                        None,
                        "logs",
                        self.normalized_logs(),
                        b.normalized_logs()
                    );
                }
                Compare::ComputeUnits => {
                    compare!(
                        c,
                        &mut out,
                        None,
                        "compute_units_consumed",
                        self.result.compute_units_consumed(),
                        b.result.compute_units_consumed()
                    );
                }
            }
        }
        out
    }

    /// Compare against the candidate outcome, panicking on any mismatch.
    pub fn compare(&self, candidate: &Self) {
        self.compare_with_config(
            candidate,
            &Compare::defaults(),
            &Config {
                panic: true,
                verbose: true,
            },
        );
    }
}

fn describe<E: std::fmt::Display>(message: Option<&Result<PostedMessageV1, E>>) -> String {
    match message {
        None => "absent".to_string(),
        Some(Ok(_)) => "present".to_string(),
        Some(Err(err)) => format!("undecodable ({err})"),
    }
}

/// Break a payload mismatch down to the transfer field that differs.
fn compare_payloads(
    a: &PostedMessageV1,
    b: &PostedMessageV1,
    c: &Config,
    out: &mut Vec<Divergence>,
) {
    let (a_transfer, b_transfer) = match (
        TokenBridgeMessage::decode(&a.payload),
        TokenBridgeMessage::decode(&b.payload),
    ) {
        (Ok(a), Ok(b)) => (a, b),
        _ => {
            compare!(
                c,
                out,
                None,
                "message.payload",
                hex::encode(&a.payload),
                hex::encode(&b.payload)
            );
            return;
        }
    };

    match (&a_transfer, &b_transfer) {
        (TokenBridgeMessage::TransferWithPayload(a), TokenBridgeMessage::TransferWithPayload(b)) => {
            compare!(c, out, None, "message.amount", a.amount, b.amount);
            compare!(
                c,
                out,
                None,
                "message.token_address",
                hex::encode(a.token_address),
                hex::encode(b.token_address)
            );
            compare!(c, out, None, "message.token_chain", a.token_chain, b.token_chain);
            compare!(
                c,
                out,
                None,
                "message.redeemer",
                hex::encode(a.redeemer),
                hex::encode(b.redeemer)
            );
            compare!(
                c,
                out,
                None,
                "message.redeemer_chain",
                a.redeemer_chain,
                b.redeemer_chain
            );
            compare!(
                c,
                out,
                None,
                "message.sender",
                hex::encode(a.sender),
                hex::encode(b.sender)
            );
            compare!(
                c,
                out,
                None,
                "message.payload",
                hex::encode(&a.payload),
                hex::encode(&b.payload)
            );
        }
        (TokenBridgeMessage::Transfer(a), TokenBridgeMessage::Transfer(b)) => {
            compare!(c, out, None, "message.amount", a.amount, b.amount);
            compare!(
                c,
                out,
                None,
                "message.token_address",
                hex::encode(a.token_address),
                hex::encode(b.token_address)
            );
            compare!(c, out, None, "message.token_chain", a.token_chain, b.token_chain);
            compare!(
                c,
                out,
                None,
                "message.recipient",
                hex::encode(a.recipient),
                hex::encode(b.recipient)
            );
            compare!(
                c,
                out,
                None,
                "message.recipient_chain",
                a.recipient_chain,
                b.recipient_chain
            );
            compare!(c, out, None, "message.relayer_fee", a.relayer_fee, b.relayer_fee);
        }
        _ => {
            compare!(
                c,
                out,
                None,
                "message.payload_type",
                a.payload.first(),
                b.payload.first()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{
            ExecutionResult, FailureReason, TokenBalanceChange, TransactionDetails,
            TransactionFailure,
        },
        fork_harness_error::Side,
        fork_harness_programs_token_bridge::{message::MessageStatus, payload::TransferWithPayload},
        solana_account::Account,
        solana_instruction::error::InstructionError,
        solana_signature::Signature,
        solana_transaction_error::TransactionError,
    };

    struct Fixture {
        source: Pubkey,
        mint: Pubkey,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                source: Pubkey::new_unique(),
                mint: Pubkey::new_unique(),
            }
        }

        fn outcome(&self, side: Side, debit: u64, amount: u64, sequence: u64) -> SideOutcome {
            let custody = Pubkey::new_unique();
            let transfer = TokenBridgeMessage::TransferWithPayload(TransferWithPayload {
                amount,
                token_address: self.mint.to_bytes(),
                token_chain: 1,
                redeemer: [0xde; 32],
                redeemer_chain: 2,
                sender: [4; 32],
                payload: b"All your base are belong to us.".to_vec(),
            });
            let posted = PostedMessageV1 {
                consistency_level: 32,
                emitter_authority: Pubkey::new_unique(),
                status: MessageStatus::Published,
                posted_timestamp: 1,
                nonce: 420,
                sequence,
                emitter_chain: 1,
                emitter: Pubkey::new_unique(),
                payload: transfer.encode(),
            };
            SideOutcome {
                side,
                program_ids: vec![Pubkey::new_unique()],
                message_address: Pubkey::new_unique(),
                result: ExecutionResult::Confirmed(TransactionDetails {
                    signature: Signature::default(),
                    slot: 1,
                    logs: vec![],
                    compute_units_consumed: None,
                    token_balances: vec![
                        TokenBalanceChange {
                            address: self.source,
                            mint: self.mint,
                            pre: 1_000,
                            post: 1_000 - debit,
                        },
                        TokenBalanceChange {
                            address: custody,
                            mint: self.mint,
                            pre: 0,
                            post: debit,
                        },
                    ],
                }),
                message_account: Some(Account {
                    lamports: 1,
                    data: posted.encode(),
                    owner: Pubkey::new_unique(),
                    executable: false,
                    rent_epoch: 0,
                }),
            }
        }
    }

    fn failed(side: Side, error: InstructionError) -> SideOutcome {
        SideOutcome {
            side,
            program_ids: vec![],
            message_address: Pubkey::new_unique(),
            result: ExecutionResult::Failed(TransactionFailure {
                reason: FailureReason::Transaction(TransactionError::InstructionError(1, error)),
                logs: vec![],
            }),
            message_account: None,
        }
    }

    #[test]
    fn test_equivalent_outcomes_ignore_deployment_fields() {
        let fixture = Fixture::new();
        let reference = fixture.outcome(Side::Reference, 100, 100, 0);
        let candidate = fixture.outcome(Side::Candidate, 100, 100, 0);

        let divergences =
            reference.compare_with_config(&candidate, &Compare::defaults(), &Config::default());
        assert!(divergences.is_empty(), "{divergences:?}");
        reference.compare(&candidate);
    }

    #[test]
    fn test_amount_divergence_names_field() {
        let fixture = Fixture::new();
        let reference = fixture.outcome(Side::Reference, 80, 8, 0);
        let candidate = fixture.outcome(Side::Candidate, 88, 88, 0);

        let divergences =
            reference.compare_with_config(&candidate, &Compare::defaults(), &Config::default());
        let fields = divergences
            .iter()
            .map(|d| d.field.clone())
            .collect::<Vec<_>>();

        assert!(fields.contains(&format!("token_balance_delta[{}]", fixture.source)));
        assert!(fields.contains(&format!("token_balance_deltas[mint {}]", fixture.mint)));
        assert!(fields.contains(&"message.amount".to_string()));
        assert!(!fields.contains(&"message.payload".to_string()));
        assert!(divergences.iter().all(|d| d.side.is_none()));

        let amount = divergences
            .iter()
            .find(|d| d.field == "message.amount")
            .unwrap();
        assert_eq!(amount.expected, "8");
        assert_eq!(amount.actual, "88");
    }

    #[test]
    fn test_sequence_is_compared_unless_disabled() {
        let fixture = Fixture::new();
        let reference = fixture.outcome(Side::Reference, 1, 1, 3);
        let candidate = fixture.outcome(Side::Candidate, 1, 1, 4);

        let divergences = reference.compare_with_config(
            &candidate,
            &[Compare::message_account()],
            &Config::default(),
        );
        assert_eq!(divergences.len(), 1);
        assert_eq!(divergences[0].field, "message.sequence");

        let relaxed = Compare::MessageAccount {
            fields: MessageFields {
                sequence: false,
                ..MessageFields::default()
            },
        };
        assert!(reference
            .compare_with_config(&candidate, &[relaxed], &Config::default())
            .is_empty());
    }

    #[test]
    fn test_outcome_requires_same_error_class() {
        let reference = failed(Side::Reference, InstructionError::Custom(4));
        let same = failed(Side::Candidate, InstructionError::Custom(4));
        let different = failed(Side::Candidate, InstructionError::MissingRequiredSignature);

        let config = Config::default();
        assert!(reference
            .compare_with_config(&same, &Compare::defaults(), &config)
            .is_empty());

        let divergences =
            reference.compare_with_config(&different, &Compare::defaults(), &config);
        assert_eq!(divergences.len(), 1);
        assert_eq!(divergences[0].field, "error_class");
    }

    #[test]
    fn test_one_sided_failure() {
        let fixture = Fixture::new();
        let reference = fixture.outcome(Side::Reference, 1, 1, 0);
        let candidate = failed(Side::Candidate, InstructionError::Custom(4));

        let divergences = reference.compare_with_config(
            &candidate,
            &[Compare::Outcome, Compare::message_account()],
            &Config::default(),
        );
        let fields = divergences
            .iter()
            .map(|d| d.field.as_str())
            .collect::<Vec<_>>();
        assert_eq!(fields, vec!["result", "message_account"]);
        assert_eq!(divergences[1].expected, "present");
        assert_eq!(divergences[1].actual, "absent");
    }

    #[test]
    #[should_panic(expected = "COMPARE FAILED: result")]
    fn test_compare_panics() {
        let fixture = Fixture::new();
        let reference = fixture.outcome(Side::Reference, 1, 1, 0);
        let candidate = failed(Side::Candidate, InstructionError::Custom(4));
        reference.compare(&candidate);
    }
}
