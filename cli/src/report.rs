//! Markdown suite reports.

use {
    chrono::Utc,
    fork_harness::{
        error::Side,
        result::SideOutcome,
        scenario::{ScenarioReport, Verdict},
        suite::SuiteReport,
    },
    num_format::{Locale, ToFormattedString},
    solana_pubkey::Pubkey,
    std::path::{Path, PathBuf},
};

const REPORT_FILE: &str = "fork_harness.md";

pub struct SuiteMarkdownReport {
    out_dir: PathBuf,
    table_header: String,
}

impl SuiteMarkdownReport {
    pub fn new(out_dir: impl Into<PathBuf>, table_header: Option<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            table_header: table_header.unwrap_or_else(|| "Fork Harness".to_string()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.out_dir.join(REPORT_FILE)
    }

    /// Prepend a table for `report` to the report file, newest first.
    pub fn write(&self, cluster: &str, report: &SuiteReport) -> std::io::Result<()> {
        let table = render(&self.table_header, cluster, &report.scenarios);
        prepend_to_md_file(&self.path(), &table)
    }
}

/// The first eight base58 characters of `key`.
fn short_key(key: &Pubkey) -> String {
    let mut encoded = bs58::encode(key.as_ref()).into_string();
    encoded.truncate(8);
    encoded
}

fn side_cell(outcome: Option<&SideOutcome>) -> String {
    match outcome {
        None => "--".to_string(),
        Some(outcome) => match outcome.result.error_class() {
            None => format!("ok (`{}`)", short_key(&outcome.message_address)),
            Some(class) => class.to_string(),
        },
    }
}

fn md_header(table_header: &str, cluster: &str) -> String {
    format!(
        r#"#### {}

Cluster: {}
Run: {}

| Scenario | Decimals | Amount | Debit | Candidate | Reference | Verdict |
|----------|----------|--------|-------|-----------|-----------|---------|
"#,
        table_header,
        cluster,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

fn render(table_header: &str, cluster: &str, scenarios: &[ScenarioReport]) -> String {
    let mut md_table = md_header(table_header, cluster);

    for scenario in scenarios {
        let verdict = match scenario.verdict() {
            Some(Verdict::Passed) => "PASS",
            Some(Verdict::Failed) => "FAIL",
            None => "--",
        };
        md_table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            scenario.name,
            scenario.mint.decimals,
            scenario.amount.to_formatted_string(&Locale::en),
            scenario.expected_debit.to_formatted_string(&Locale::en),
            side_cell(scenario.outcome(Side::Candidate)),
            side_cell(scenario.outcome(Side::Reference)),
            verdict,
        ));
    }
    md_table.push('\n');

    let failed = scenarios.iter().filter(|s| !s.passed()).collect::<Vec<_>>();
    for scenario in failed {
        md_table.push_str(&format!("##### {}\n\n", scenario.name));
        for error in &scenario.errors {
            md_table.push_str(&format!("- {}\n", error.to_string().trim()));
        }
        for divergence in &scenario.divergences {
            let side = divergence
                .side
                .map(|side| side.to_string())
                .unwrap_or_else(|| "BOTH".to_string());
            md_table.push_str(&format!(
                "- [{}] `{}`: expected `{}`, got `{}`\n",
                side, divergence.field, divergence.expected, divergence.actual
            ));
        }
        md_table.push('\n');
    }

    md_table
}

fn prepend_to_md_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut new_contents = content.to_string();
    new_contents.push_str(&contents);

    std::fs::write(path, new_contents)
}
