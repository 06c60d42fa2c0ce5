//! Core result types for one side's transaction.

use {
    fork_harness_error::Side,
    fork_harness_programs_token::token::TokenError,
    fork_harness_programs_token_bridge::{
        message::{DecodeError, PostedMessageV1},
        payload::TokenBridgeMessage,
    },
    solana_account::Account,
    solana_instruction::error::InstructionError,
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    solana_transaction_error::TransactionError,
    std::fmt::{self, Display},
};

/// Coarse classification of a transaction error, so that two deployments
/// failing for the same reason compare equal even when the instruction
/// index or the exact error variant differs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorClass {
    /// A token movement was not authorized by the owner or a delegate.
    Authorization,
    InsufficientFunds,
    MissingSignature,
    AccountInUse,
    Custom(u32),
    Other(String),
}

impl ErrorClass {
    fn from_instruction_error(error: &InstructionError) -> Self {
        match error {
            InstructionError::Custom(code) if *code == TokenError::OwnerMismatch as u32 => {
                ErrorClass::Authorization
            }
            InstructionError::Custom(code) if *code == TokenError::InsufficientFunds as u32 => {
                ErrorClass::InsufficientFunds
            }
            InstructionError::Custom(code) => ErrorClass::Custom(*code),
            InstructionError::MissingRequiredSignature => ErrorClass::MissingSignature,
            InstructionError::InsufficientFunds => ErrorClass::InsufficientFunds,
            InstructionError::AccountAlreadyInitialized => ErrorClass::AccountInUse,
            other => ErrorClass::Other(format!("{other:?}")),
        }
    }
}

impl From<&TransactionError> for ErrorClass {
    fn from(error: &TransactionError) -> Self {
        match error {
            TransactionError::InstructionError(_, error) => Self::from_instruction_error(error),
            TransactionError::AccountInUse => ErrorClass::AccountInUse,
            TransactionError::InsufficientFundsForFee => ErrorClass::InsufficientFunds,
            TransactionError::SignatureFailure | TransactionError::MissingSignatureForFee => {
                ErrorClass::MissingSignature
            }
            other => ErrorClass::Other(format!("{other:?}")),
        }
    }
}

impl Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Custom(code) => write!(f, "Custom({code})"),
            ErrorClass::Other(reason) => write!(f, "Other({reason})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The balance of one token account before and after a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBalanceChange {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub pre: u64,
    pub post: u64,
}

impl TokenBalanceChange {
    pub fn delta(&self) -> i128 {
        self.post as i128 - self.pre as i128
    }
}

/// A confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDetails {
    pub signature: Signature,
    pub slot: u64,
    pub logs: Vec<String>,
    /// Not every RPC node reports this.
    pub compute_units_consumed: Option<u64>,
    pub token_balances: Vec<TokenBalanceChange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The cluster executed the transaction and rejected it.
    Transaction(TransactionError),
    /// The transaction never reached a final state.
    Rpc(String),
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transaction(error) => write!(f, "{error}"),
            FailureReason::Rpc(reason) => write!(f, "rpc: {reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionFailure {
    pub reason: FailureReason,
    pub logs: Vec<String>,
}

impl TransactionFailure {
    pub fn error_class(&self) -> ErrorClass {
        match &self.reason {
            FailureReason::Transaction(error) => ErrorClass::from(error),
            FailureReason::Rpc(reason) => ErrorClass::Other(reason.clone()),
        }
    }
}

/// The final state of one submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    Confirmed(TransactionDetails),
    Failed(TransactionFailure),
}

impl ExecutionResult {
    pub const fn is_ok(&self) -> bool {
        matches!(self, ExecutionResult::Confirmed(_))
    }

    pub const fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn logs(&self) -> &[String] {
        match self {
            ExecutionResult::Confirmed(details) => &details.logs,
            ExecutionResult::Failed(failure) => &failure.logs,
        }
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            ExecutionResult::Confirmed(_) => None,
            ExecutionResult::Failed(failure) => Some(failure.error_class()),
        }
    }

    pub fn compute_units_consumed(&self) -> Option<u64> {
        match self {
            ExecutionResult::Confirmed(details) => details.compute_units_consumed,
            ExecutionResult::Failed(_) => None,
        }
    }

    pub fn token_balances(&self) -> &[TokenBalanceChange] {
        match self {
            ExecutionResult::Confirmed(details) => &details.token_balances,
            ExecutionResult::Failed(_) => &[],
        }
    }

    pub fn token_balance(&self, address: &Pubkey) -> Option<&TokenBalanceChange> {
        self.token_balances().iter().find(|b| &b.address == address)
    }

    /// A short human readable verdict for reports.
    pub fn summary(&self) -> String {
        match self {
            ExecutionResult::Confirmed(details) => format!("confirmed in slot {}", details.slot),
            ExecutionResult::Failed(failure) => format!("failed: {}", failure.reason),
        }
    }
}

/// Everything the assertion layer knows about one side of a scenario.
#[derive(Clone, Debug, PartialEq)]
pub struct SideOutcome {
    pub side: Side,
    /// Program ids that legitimately differ between the sides. Log
    /// comparison replaces them with placeholders.
    pub program_ids: Vec<Pubkey>,
    pub message_address: Pubkey,
    pub result: ExecutionResult,
    /// The message account as read after the transaction settled.
    pub message_account: Option<Account>,
}

impl SideOutcome {
    pub fn posted_message(&self) -> Option<Result<PostedMessageV1, DecodeError>> {
        self.message_account
            .as_ref()
            .map(|account| PostedMessageV1::decode(&account.data))
    }

    /// The decoded message and its token bridge payload, if the message
    /// account exists.
    pub fn decoded_message(
        &self,
    ) -> Option<Result<(PostedMessageV1, TokenBridgeMessage), DecodeError>> {
        self.posted_message().map(|posted| {
            let posted = posted?;
            let transfer = TokenBridgeMessage::decode(&posted.payload)?;
            Ok((posted, transfer))
        })
    }

    /// Logs with this side's program ids and message address replaced by
    /// positional placeholders.
    pub fn normalized_logs(&self) -> Vec<String> {
        let replacements = self
            .program_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), format!("<program:{i}>")))
            .chain(std::iter::once((
                self.message_address.to_string(),
                "<message>".to_string(),
            )))
            .collect::<Vec<_>>();

        self.result
            .logs()
            .iter()
            .map(|line| {
                replacements
                    .iter()
                    .fold(line.clone(), |line, (from, to)| line.replace(from, to))
            })
            .collect()
    }
}
