//! One logical operation run against both deployments, validated on each
//! side and then compared across sides.

use {
    crate::{
        cluster::Cluster,
        engine,
        fixtures::{
            default_transfer_args, default_transfer_with_payload_args, Deployment, MintInfo,
        },
        pair::{build_pair, ApprovePolicy, BridgeOperation, TransferAccounts},
        HarnessContext,
    },
    fork_harness_error::{Divergence, HarnessError, Side},
    fork_harness_keys::KeypairFactory,
    fork_harness_programs_token::associated_token,
    fork_harness_programs_token_bridge::{
        message::CONSISTENCY_LEVEL_FINALIZED, normalize_amount, pda, transferable_amount,
        SOLANA_CHAIN,
    },
    fork_harness_result::{Check, ErrorClass, ExecutionResult, SideOutcome},
    log::{debug, info, warn},
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    std::fmt::{self, Display},
};

/// What both deployments are required to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    Ok,
    Err(ErrorClass),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
}

/// Progress of a scenario. `Confirmed` and `Failed` describe the
/// transactions (both confirmed, or at least one did not); the verdict is
/// only reached after comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioState {
    Built,
    Submitted,
    Confirmed,
    Failed,
    Compared,
    Done(Verdict),
}

impl ScenarioState {
    /// Whether a scenario in this state may move to `next`. A scenario can
    /// finish early from `Built` when its instructions cannot be built.
    pub fn can_advance_to(&self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        matches!(
            (self, next),
            (Built, Submitted)
                | (Built, Done(Verdict::Failed))
                | (Submitted, Confirmed)
                | (Submitted, Failed)
                | (Confirmed, Compared)
                | (Failed, Compared)
                | (Compared, Done(_))
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioState::Done(_))
    }
}

impl Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioState::Done(Verdict::Passed) => write!(f, "Passed"),
            ScenarioState::Done(Verdict::Failed) => write!(f, "Failed"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub mint: MintInfo,
    pub operation: BridgeOperation,
    pub approve: ApprovePolicy,
    pub expectation: Expectation,
}

impl Scenario {
    fn default_name(operation: &BridgeOperation, mint: &MintInfo, suffix: &str) -> String {
        format!("{}_{}_decimals{suffix}", operation.name(), mint.decimals)
    }

    /// A transfer with payload of `amount` that must succeed.
    pub fn transfer_with_payload(mint: MintInfo, amount: u64) -> Self {
        let operation = BridgeOperation::TransferTokensWithPayloadNative(
            default_transfer_with_payload_args(amount),
        );
        Self {
            name: Self::default_name(&operation, &mint, ""),
            mint,
            operation,
            approve: ApprovePolicy::Include,
            expectation: Expectation::Ok,
        }
    }

    /// A transfer without payload of `amount` that must succeed.
    pub fn transfer(mint: MintInfo, amount: u64) -> Self {
        let operation = BridgeOperation::TransferTokensNative(default_transfer_args(amount));
        Self {
            name: Self::default_name(&operation, &mint, ""),
            mint,
            operation,
            approve: ApprovePolicy::Include,
            expectation: Expectation::Ok,
        }
    }

    /// A transfer with payload whose approve is left out. Both deployments
    /// must refuse to move the tokens.
    pub fn missing_approve(mint: MintInfo, amount: u64) -> Self {
        let operation = BridgeOperation::TransferTokensWithPayloadNative(
            default_transfer_with_payload_args(amount),
        );
        Self {
            name: Self::default_name(&operation, &mint, "_missing_approve"),
            mint,
            operation,
            approve: ApprovePolicy::Omit,
            expectation: Expectation::Err(ErrorClass::Authorization),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// Base units leaving the sender's token account on success.
    pub fn expected_debit(&self) -> u64 {
        transferable_amount(self.operation.amount(), self.mint.decimals)
    }

    /// Amount recorded in the posted message on success.
    pub fn expected_message_amount(&self) -> u64 {
        normalize_amount(self.operation.amount(), self.mint.decimals)
    }

    fn side_checks<'a>(
        &'a self,
        deployment: &Deployment,
        src_token: &Pubkey,
        sender_authority: &Pubkey,
    ) -> Vec<Check<'a>> {
        let class = match &self.expectation {
            Expectation::Ok => None,
            Expectation::Err(class) => Some(class.clone()),
        };
        if let Some(class) = class {
            return vec![Check::err(class), Check::no_message()];
        }

        let message = Check::message()
            .amount(self.expected_message_amount())
            .consistency_level(CONSISTENCY_LEVEL_FINALIZED)
            .emitter(&pda::emitter(&deployment.token_bridge))
            .nonce(self.operation.nonce())
            .token_address(&self.mint.address)
            .token_chain(SOLANA_CHAIN);
        let message = match &self.operation {
            BridgeOperation::TransferTokensWithPayloadNative(args) => message
                .recipient(args.redeemer)
                .recipient_chain(args.redeemer_chain)
                .sender(args.cpi_program_id.as_ref().unwrap_or(sender_authority))
                .payload(&args.payload),
            BridgeOperation::TransferTokensNative(args) => message
                .recipient(args.recipient)
                .recipient_chain(args.recipient_chain)
                .relayer_fee(normalize_amount(args.relayer_fee, self.mint.decimals)),
        };

        vec![
            Check::success(),
            Check::token_balance(src_token)
                .delta(-(self.expected_debit() as i128))
                .build(),
            message.build(),
        ]
    }

    /// Build, submit, check and compare. Never returns early with an
    /// error: everything that goes wrong ends up in the report.
    pub async fn run<C: Cluster, K: KeypairFactory>(
        &self,
        ctx: &HarnessContext<C, K>,
    ) -> ScenarioReport {
        let mut report = ScenarioReport::new(self);
        let payer = ctx.payer.pubkey();
        let sender_authority = ctx.sender_authority.pubkey();
        let src_token = associated_token::address(&payer, &self.mint.address);
        let accounts = TransferAccounts {
            payer,
            mint: self.mint.address,
            src_token,
        };

        let pair = match build_pair(
            &ctx.deployments,
            &self.operation,
            &accounts,
            &sender_authority,
            &ctx.keys,
            &self.name,
            self.approve,
        ) {
            Ok(pair) => pair,
            Err(err) => {
                warn!("[{}] {err}", self.name);
                report.errors.push(err);
                report.advance(ScenarioState::Done(Verdict::Failed));
                return report;
            }
        };
        report.advance(ScenarioState::Built);

        report.advance(ScenarioState::Submitted);
        let execution =
            engine::execute(&ctx.cluster, &pair, &ctx.payer, &ctx.sender_authority).await;
        if execution.candidate.result.is_ok() && execution.reference.result.is_ok() {
            report.advance(ScenarioState::Confirmed);
        } else {
            report.advance(ScenarioState::Failed);
        }

        if self.expectation == Expectation::Ok {
            for outcome in [&execution.candidate, &execution.reference] {
                if let ExecutionResult::Failed(failure) = &outcome.result {
                    report.errors.push(HarnessError::Submission {
                        side: outcome.side,
                        error: failure.reason.to_string(),
                        logs: failure.logs.clone(),
                    });
                }
            }
        }

        // A side whose message account could not be read has nothing to
        // check or compare against.
        for outcome in [&execution.candidate, &execution.reference] {
            if !execution.was_read(outcome.side) {
                continue;
            }
            let checks = self.side_checks(
                ctx.deployments.get(outcome.side),
                &src_token,
                &sender_authority,
            );
            report
                .divergences
                .extend(outcome.run_checks(&checks, &ctx.config));
        }
        if execution.read_errors.is_empty() {
            report
                .divergences
                .extend(execution.reference.compare_with_config(
                    &execution.candidate,
                    &ctx.compares,
                    &ctx.config,
                ));
        }
        report.advance(ScenarioState::Compared);

        report.errors.extend(execution.read_errors);
        report.candidate = Some(execution.candidate);
        report.reference = Some(execution.reference);
        let verdict = if report.divergences.is_empty() && report.errors.is_empty() {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        report.advance(ScenarioState::Done(verdict));
        info!(
            "[{}] {} ({} divergence(s))",
            self.name,
            report.state(),
            report.divergences.len()
        );
        report
    }
}

/// Everything a scenario produced.
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: String,
    pub mint: MintInfo,
    pub operation: &'static str,
    pub amount: u64,
    pub expected_debit: u64,
    /// Every state the scenario passed through, in order.
    pub states: Vec<ScenarioState>,
    pub divergences: Vec<Divergence>,
    pub errors: Vec<HarnessError>,
    pub candidate: Option<SideOutcome>,
    pub reference: Option<SideOutcome>,
}

impl ScenarioReport {
    fn new(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            mint: scenario.mint,
            operation: scenario.operation.name(),
            amount: scenario.operation.amount(),
            expected_debit: scenario.expected_debit(),
            states: vec![],
            divergences: vec![],
            errors: vec![],
            candidate: None,
            reference: None,
        }
    }

    fn advance(&mut self, next: ScenarioState) {
        if let Some(current) = self.states.last() {
            debug_assert!(
                current.can_advance_to(next),
                "illegal transition {current} -> {next}"
            );
        }
        debug!("[{}] -> {next}", self.name);
        self.states.push(next);
    }

    /// The latest state; `Built` before anything happened.
    pub fn state(&self) -> ScenarioState {
        self.states.last().copied().unwrap_or(ScenarioState::Built)
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self.state() {
            ScenarioState::Done(verdict) => Some(verdict),
            _ => None,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict() == Some(Verdict::Passed)
    }

    pub fn outcome(&self, side: Side) -> Option<&SideOutcome> {
        match side {
            Side::Candidate => self.candidate.as_ref(),
            Side::Reference => self.reference.as_ref(),
        }
    }

    /// Sides any divergence is attributed to. Cross-side divergences are
    /// not included.
    pub fn diverged_sides(&self) -> Vec<Side> {
        Side::ALL
            .into_iter()
            .filter(|side| self.divergences.iter().any(|d| d.side == Some(*side)))
            .collect()
    }

    /// `Ok` if the scenario passed; otherwise its first harness error, or
    /// all divergences.
    pub fn into_result(mut self) -> Result<Self, HarnessError> {
        if self.passed() {
            return Ok(self);
        }
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        Err(HarnessError::Divergence(std::mem::take(&mut self.divergences)))
    }
}
