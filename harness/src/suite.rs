//! A provisioned batch of scenarios.

use {
    crate::{
        cluster::Cluster,
        fixtures::{MintInfo, DEFAULT_AMOUNT},
        provision::provision,
        scenario::{Scenario, ScenarioReport},
        HarnessContext,
    },
    fork_harness_error::HarnessError,
    fork_harness_keys::KeypairFactory,
    log::info,
    solana_pubkey::Pubkey,
};

#[derive(Clone, Debug, Default)]
pub struct Suite {
    /// Mints provisioned before any scenario runs.
    pub mints: Vec<MintInfo>,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn new(mints: &[MintInfo]) -> Self {
        Self {
            mints: mints.to_vec(),
            scenarios: vec![],
        }
    }

    /// The standard scenarios at `DEFAULT_AMOUNT`.
    pub fn standard(mints: &[MintInfo]) -> Self {
        Self::standard_with_amount(mints, DEFAULT_AMOUNT)
    }

    /// Per mint: the missing-approve negative, the transfer with payload and
    /// the plain transfer, all of `amount`.
    pub fn standard_with_amount(mints: &[MintInfo], amount: u64) -> Self {
        let scenarios = mints
            .iter()
            .flat_map(|mint| {
                [
                    Scenario::missing_approve(*mint, amount),
                    Scenario::transfer_with_payload(*mint, amount),
                    Scenario::transfer(*mint, amount),
                ]
            })
            .collect();
        Self {
            mints: mints.to_vec(),
            scenarios,
        }
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Provision every mint with `provision_amount`, then run each scenario
    /// in order. Only a provisioning failure is returned as an error;
    /// scenario failures are part of the report.
    pub async fn run<C: Cluster, K: KeypairFactory>(
        &self,
        ctx: &HarnessContext<C, K>,
        provision_amount: u64,
    ) -> Result<SuiteReport, HarnessError> {
        let token_accounts =
            provision(&ctx.cluster, &self.mints, &ctx.payer, provision_amount).await?;

        let mut scenarios = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            scenarios.push(scenario.run(ctx).await);
        }

        let report = SuiteReport {
            token_accounts,
            scenarios,
        };
        info!(
            "Suite finished: {} passed, {} failed",
            report.passed(),
            report.failed()
        );
        Ok(report)
    }
}

#[derive(Debug)]
pub struct SuiteReport {
    /// The payer's provisioned token accounts, in mint order.
    pub token_accounts: Vec<Pubkey>,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            fixtures::{mints, MINT_INFO_8},
            pair::ApprovePolicy,
        },
    };

    #[test]
    fn test_standard_suite_layout() {
        let suite = Suite::standard(&mints());
        assert_eq!(suite.scenarios.len(), 6);
        assert_eq!(suite.mints, mints());
        assert_eq!(suite.scenarios[0].approve, ApprovePolicy::Omit);
        assert_eq!(suite.scenarios[3].mint.decimals, 9);
        assert!(suite
            .scenarios
            .iter()
            .all(|scenario| scenario.operation.amount() == DEFAULT_AMOUNT));
    }

    #[test]
    fn test_custom_suite() {
        let suite = Suite::new(&[MINT_INFO_8])
            .with_scenario(Scenario::transfer(MINT_INFO_8, 100).with_name("small"));
        assert_eq!(suite.scenarios[0].name, "small");
    }

    #[test]
    fn test_standard_suite_with_amount() {
        let suite = Suite::standard_with_amount(&[MINT_INFO_8], 1_000);
        assert_eq!(suite.scenarios.len(), 3);
        assert!(suite
            .scenarios
            .iter()
            .all(|scenario| scenario.operation.amount() == 1_000));
    }
}
