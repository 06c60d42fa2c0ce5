//! Check system for validating one side's outcome on its own.

use {
    crate::{
        config::{compare, throw, Config},
        types::{ErrorClass, ExecutionResult, SideOutcome},
    },
    fork_harness_error::Divergence,
    fork_harness_programs_token_bridge::payload::TokenBridgeMessage,
    solana_pubkey::Pubkey,
};

enum CheckType<'a> {
    /// The transaction confirmed.
    Success,
    /// The transaction failed with an error of this class.
    Err(ErrorClass),
    /// Check the number of compute units consumed.
    ComputeUnits(u64),
    /// Check a token account's balance change.
    TokenBalance(TokenBalanceCheck),
    /// Check the posted message written to the message account.
    Message(MessageCheck<'a>),
    /// The message account must not exist.
    NoMessage,
}

pub struct Check<'a> {
    check: CheckType<'a>,
}

impl<'a> Check<'a> {
    fn new(check: CheckType<'a>) -> Self {
        Self { check }
    }

    /// Assert that the transaction confirmed.
    pub fn success() -> Self {
        Check::new(CheckType::Success)
    }

    /// Assert that the transaction failed with an error of `class`.
    pub fn err(class: ErrorClass) -> Self {
        Check::new(CheckType::Err(class))
    }

    pub fn compute_units(units: u64) -> Self {
        Check::new(CheckType::ComputeUnits(units))
    }

    /// Check the balance change of the token account at `address`.
    pub fn token_balance(address: &Pubkey) -> TokenBalanceCheckBuilder {
        TokenBalanceCheckBuilder::new(address)
    }

    /// Check the posted message.
    pub fn message() -> MessageCheckBuilder<'a> {
        MessageCheckBuilder::new()
    }

    /// Assert that no message account was created.
    pub fn no_message() -> Self {
        Check::new(CheckType::NoMessage)
    }
}

struct TokenBalanceCheck {
    address: Pubkey,
    check_delta: Option<i128>,
    check_post: Option<u64>,
}

pub struct TokenBalanceCheckBuilder {
    check: TokenBalanceCheck,
}

impl TokenBalanceCheckBuilder {
    fn new(address: &Pubkey) -> Self {
        Self {
            check: TokenBalanceCheck {
                address: *address,
                check_delta: None,
                check_post: None,
            },
        }
    }

    /// Signed change in base units. A debit is negative.
    pub fn delta(mut self, delta: i128) -> Self {
        self.check.check_delta = Some(delta);
        self
    }

    pub fn post(mut self, post: u64) -> Self {
        self.check.check_post = Some(post);
        self
    }

    pub fn build<'a>(self) -> Check<'a> {
        Check::new(CheckType::TokenBalance(self.check))
    }
}

#[derive(Default)]
struct MessageCheck<'a> {
    check_amount: Option<u64>,
    check_consistency_level: Option<u8>,
    check_emitter: Option<Pubkey>,
    check_nonce: Option<u32>,
    check_payload: Option<&'a [u8]>,
    check_recipient: Option<[u8; 32]>,
    check_recipient_chain: Option<u16>,
    check_relayer_fee: Option<u64>,
    check_sender: Option<[u8; 32]>,
    check_token_address: Option<[u8; 32]>,
    check_token_chain: Option<u16>,
}

pub struct MessageCheckBuilder<'a> {
    check: MessageCheck<'a>,
}

impl<'a> MessageCheckBuilder<'a> {
    fn new() -> Self {
        Self {
            check: MessageCheck::default(),
        }
    }

    /// The normalized amount recorded in the transfer payload.
    pub fn amount(mut self, amount: u64) -> Self {
        self.check.check_amount = Some(amount);
        self
    }

    pub fn consistency_level(mut self, level: u8) -> Self {
        self.check.check_consistency_level = Some(level);
        self
    }

    pub fn emitter(mut self, emitter: &Pubkey) -> Self {
        self.check.check_emitter = Some(*emitter);
        self
    }

    pub fn nonce(mut self, nonce: u32) -> Self {
        self.check.check_nonce = Some(nonce);
        self
    }

    /// The redeemer payload of a transfer with payload.
    pub fn payload(mut self, payload: &'a [u8]) -> Self {
        self.check.check_payload = Some(payload);
        self
    }

    pub fn recipient(mut self, recipient: [u8; 32]) -> Self {
        self.check.check_recipient = Some(recipient);
        self
    }

    pub fn recipient_chain(mut self, chain: u16) -> Self {
        self.check.check_recipient_chain = Some(chain);
        self
    }

    pub fn relayer_fee(mut self, fee: u64) -> Self {
        self.check.check_relayer_fee = Some(fee);
        self
    }

    pub fn sender(mut self, sender: &Pubkey) -> Self {
        self.check.check_sender = Some(sender.to_bytes());
        self
    }

    pub fn token_address(mut self, mint: &Pubkey) -> Self {
        self.check.check_token_address = Some(mint.to_bytes());
        self
    }

    pub fn token_chain(mut self, chain: u16) -> Self {
        self.check.check_token_chain = Some(chain);
        self
    }

    pub fn build(self) -> Check<'a> {
        Check::new(CheckType::Message(self.check))
    }
}

impl SideOutcome {
    /// Run checks against this side alone. Every divergence is attributed
    /// to this side.
    pub fn run_checks(&self, checks: &[Check], config: &Config) -> Vec<Divergence> {
        let c = config;
        let side = Some(self.side);
        let mut out = Vec::new();
        for check in checks {
            match &check.check {
                CheckType::Success => {
                    if let ExecutionResult::Failed(failure) = &self.result {
                        throw!(c, &mut out, side, "result", "success", "{}", failure.reason);
                    }
                }
                CheckType::Err(expected) => match self.result.error_class() {
                    None => {
                        throw!(
                            c,
                            &mut out,
                            side,
                            "result",
                            format!("error {expected}"),
                            "success"
                        );
                    }
                    Some(actual) => {
                        compare!(c, &mut out, side, "error_class", expected, &actual);
                    }
                },
                CheckType::ComputeUnits(units) => {
                    let actual = self.result.compute_units_consumed();
                    compare!(c, &mut out, side, "compute_units", Some(*units), actual);
                }
                CheckType::TokenBalance(balance) => {
                    let Some(change) = self.result.token_balance(&balance.address) else {
                        throw!(
                            c,
                            &mut out,
                            side,
                            "token_balance",
                            balance.address.to_string(),
                            "no balance recorded for {}",
                            balance.address
                        );
                        continue;
                    };
                    if let Some(delta) = balance.check_delta {
                        compare!(c, &mut out, side, "token_balance.delta", delta, change.delta());
                    }
                    if let Some(post) = balance.check_post {
                        compare!(c, &mut out, side, "token_balance.post", post, change.post);
                    }
                }
                CheckType::NoMessage => {
                    if self.message_account.is_some() {
                        throw!(
                            c,
                            &mut out,
                            side,
                            "message_account",
                            "absent",
                            "account exists at {}",
                            self.message_address
                        );
                    }
                }
                CheckType::Message(message) => {
                    self.check_message(message, c, &mut out);
                }
            }
        }
        out
    }

    fn check_message(&self, check: &MessageCheck, c: &Config, out: &mut Vec<Divergence>) {
        let side = Some(self.side);
        let (posted, transfer) = match self.decoded_message() {
            None => {
                throw!(
                    c,
                    out,
                    side,
                    "message_account",
                    "present",
                    "no account at {}",
                    self.message_address
                );
                return;
            }
            Some(Err(err)) => {
                throw!(c, out, side, "message_account", "decodable", "{}", err);
                return;
            }
            Some(Ok(decoded)) => decoded,
        };

        if let Some(level) = check.check_consistency_level {
            compare!(c, out, side, "message.consistency_level", level, posted.consistency_level);
        }
        if let Some(emitter) = check.check_emitter {
            compare!(c, out, side, "message.emitter", emitter, posted.emitter);
        }
        if let Some(nonce) = check.check_nonce {
            compare!(c, out, side, "message.nonce", nonce, posted.nonce);
        }
        if let Some(amount) = check.check_amount {
            compare!(c, out, side, "message.amount", amount, transfer.amount());
        }
        if let Some(mint) = check.check_token_address {
            compare!(
                c,
                out,
                side,
                "message.token_address",
                hex::encode(mint),
                hex::encode(transfer.token_address())
            );
        }
        if let Some(chain) = check.check_token_chain {
            compare!(c, out, side, "message.token_chain", chain, transfer.token_chain());
        }
        if let Some(recipient) = check.check_recipient {
            compare!(
                c,
                out,
                side,
                "message.recipient",
                hex::encode(recipient),
                hex::encode(transfer.recipient())
            );
        }
        if let Some(chain) = check.check_recipient_chain {
            compare!(c, out, side, "message.recipient_chain", chain, transfer.recipient_chain());
        }

        match &transfer {
            TokenBridgeMessage::TransferWithPayload(transfer) => {
                if let Some(sender) = check.check_sender {
                    compare!(
                        c,
                        out,
                        side,
                        "message.sender",
                        hex::encode(sender),
                        hex::encode(transfer.sender)
                    );
                }
                if let Some(payload) = check.check_payload {
                    compare!(
                        c,
                        out,
                        side,
                        "message.payload",
                        hex::encode(payload),
                        hex::encode(&transfer.payload)
                    );
                }
                if check.check_relayer_fee.is_some() {
                    throw!(c, out, side, "message.relayer_fee", "transfer", "transfer with payload");
                }
            }
            TokenBridgeMessage::Transfer(transfer) => {
                if let Some(fee) = check.check_relayer_fee {
                    compare!(c, out, side, "message.relayer_fee", fee, transfer.relayer_fee);
                }
                if check.check_sender.is_some() || check.check_payload.is_some() {
                    throw!(
                        c,
                        out,
                        side,
                        "message.payload",
                        "transfer with payload",
                        "transfer"
                    );
                }
            }
        }
    }
}
