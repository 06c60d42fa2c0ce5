//! CLI runner. Runs a suite against any cluster and prints one verdict line
//! per scenario.

use {
    crate::report::SuiteMarkdownReport,
    fork_harness::{
        error::Side,
        keys::KeypairFactory,
        scenario::ScenarioReport,
        suite::{Suite, SuiteReport},
        Cluster, HarnessContext,
    },
    log::error,
};

pub struct Runner {
    cluster_label: String,
    report: Option<SuiteMarkdownReport>,
    verbose: bool,
}

impl Runner {
    pub fn new(
        cluster_label: impl Into<String>,
        report: Option<SuiteMarkdownReport>,
        verbose: bool,
    ) -> Self {
        Self {
            cluster_label: cluster_label.into(),
            report,
            verbose,
        }
    }

    fn print_scenario(&self, scenario: &ScenarioReport) -> bool {
        if self.verbose {
            println!("----------------------------------------");
            println!("[TEST]: {} ({})", scenario.name, scenario.operation);
            for side in Side::ALL {
                if let Some(outcome) = scenario.outcome(side) {
                    println!("[{}]: Message: {}", side, outcome.message_address);
                    println!("[{}]: Result: {}", side, outcome.result.summary());
                }
            }
            println!();
            for error in &scenario.errors {
                println!("{error}");
            }
            for divergence in &scenario.divergences {
                println!("{divergence}");
            }
            if !scenario.errors.is_empty() || !scenario.divergences.is_empty() {
                println!();
            }
        }

        let pass = scenario.passed();
        if pass {
            println!("PASS: {}", scenario.name);
        } else {
            println!("FAIL: {}", scenario.name);
        }

        if self.verbose {
            println!("----------------------------------------");
            println!();
        }

        pass
    }

    fn write_report(&self, report: &SuiteReport) {
        if let Some(markdown) = &self.report {
            match markdown.write(&self.cluster_label, report) {
                Ok(()) => println!("[DONE][REPORT]: {}", markdown.path().display()),
                Err(err) => error!("Failed to write report {}: {err}", markdown.path().display()),
            }
        }
    }

    /// Provision, run every scenario and print the verdicts. Returns whether
    /// the whole suite passed.
    pub async fn run_all<C: Cluster, K: KeypairFactory>(
        &self,
        ctx: &HarnessContext<C, K>,
        suite: &Suite,
        provision_amount: u64,
    ) -> bool {
        let report = match suite.run(ctx, provision_amount).await {
            Ok(report) => report,
            Err(err) => {
                println!("{err}");
                println!();
                println!("[DONE][TEST RESULT]: provisioning failed");
                return false;
            }
        };

        let mut failures = 0;
        for scenario in &report.scenarios {
            if !self.print_scenario(scenario) {
                failures += 1;
            }
        }

        println!();
        println!("[DONE][TEST RESULT]: {} failures", failures);

        self.write_report(&report);
        failures == 0
    }
}
