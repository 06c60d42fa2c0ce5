//! Harness errors. Provisioning errors abort a whole suite; every other
//! variant fails only the scenario that raised it.

use {
    crate::side::Side,
    solana_pubkey::Pubkey,
    std::fmt::{self, Display},
    thiserror::Error,
};

/// A single field on which an outcome did not match what was required.
///
/// `side` is `None` when the mismatch is between the two deployments
/// themselves. In that case `expected` holds the reference value and
/// `actual` the candidate value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence {
    pub side: Option<Side>,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl Divergence {
    pub fn new(
        side: Option<Side>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            side,
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(
                f,
                "CHECK FAILED [{}]: {}\n  Expected: `{}`,\n  Got: `{}`",
                side, self.field, self.expected, self.actual
            ),
            None => write!(
                f,
                "COMPARE FAILED: {}\n  Reference: `{}`,\n  Candidate: `{}`",
                self.field, self.expected, self.actual
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Funding setup did not complete. No scenario can run.
    #[error("    [HARNESS]: Provisioning failed for mint {mint}: {reason}")]
    Provision { mint: Pubkey, reason: String },
    /// Instruction construction rejected its inputs.
    #[error("    [HARNESS][{side}]: Failed to build instructions: {reason}")]
    Build { side: Side, reason: String },
    /// The cluster rejected a transaction that was expected to land.
    #[error("    [HARNESS][{side}]: Transaction failed: {error}")]
    Submission {
        side: Side,
        error: String,
        logs: Vec<String>,
    },
    /// A side settled, but its message account could not be read back.
    #[error("    [HARNESS][{side}]: Failed to read message account {address}: {reason}")]
    ReadBack {
        side: Side,
        address: Pubkey,
        reason: String,
    },
    /// Both deployments settled, but their effects were not equivalent.
    #[error("    [HARNESS]: {} divergence(s) between candidate and reference:\n{}", .0.len(), DisplayDivergences(.0))]
    Divergence(Vec<Divergence>),
    /// The RPC endpoint could not be reached or returned garbage.
    #[error("    [HARNESS]: RPC error: {0}")]
    Rpc(String),
    /// The harness configuration is unusable.
    #[error("    [HARNESS]: Invalid configuration: {0}")]
    Config(String),
}

impl HarnessError {
    /// The side the error is attributed to, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            HarnessError::Build { side, .. }
            | HarnessError::Submission { side, .. }
            | HarnessError::ReadBack { side, .. } => Some(*side),
            HarnessError::Divergence(divergences) => {
                let mut sides = divergences.iter().filter_map(|d| d.side);
                let first = sides.next()?;
                sides.all(|s| s == first).then_some(first)
            }
            _ => None,
        }
    }
}

struct DisplayDivergences<'a>(&'a [Divergence]);

impl Display for DisplayDivergences<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for divergence in self.0 {
            writeln!(f, "{}", divergence)?;
        }
        Ok(())
    }
}

/// Turns misconfiguration of test inputs into a panic carrying the harness
/// error, for helpers that have no caller to propagate to.
pub trait HarnessPanic<T> {
    fn or_panic_with(self, error: HarnessError) -> T;
}

impl<T, E> HarnessPanic<T> for Result<T, E>
where
    E: Display,
{
    fn or_panic_with(self, harness_err: HarnessError) -> T {
        self.unwrap_or_else(|err| panic!("{}: {}", harness_err, err))
    }
}

impl<T> HarnessPanic<T> for Option<T> {
    fn or_panic_with(self, harness_err: HarnessError) -> T {
        self.unwrap_or_else(|| panic!("{}", harness_err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_attribution() {
        let build = HarnessError::Build {
            side: Side::Reference,
            reason: "bad".to_string(),
        };
        assert_eq!(build.side(), Some(Side::Reference));

        let one_sided = HarnessError::Divergence(vec![
            Divergence::new(Some(Side::Candidate), "a", "1", "2"),
            Divergence::new(Some(Side::Candidate), "b", "1", "2"),
        ]);
        assert_eq!(one_sided.side(), Some(Side::Candidate));

        let cross = HarnessError::Divergence(vec![
            Divergence::new(Some(Side::Candidate), "a", "1", "2"),
            Divergence::new(None, "b", "1", "2"),
        ]);
        assert_eq!(cross.side(), Some(Side::Candidate));

        let both = HarnessError::Divergence(vec![
            Divergence::new(Some(Side::Candidate), "a", "1", "2"),
            Divergence::new(Some(Side::Reference), "a", "1", "2"),
        ]);
        assert_eq!(both.side(), None);

        assert_eq!(HarnessError::Rpc("down".to_string()).side(), None);

        let read_back = HarnessError::ReadBack {
            side: Side::Candidate,
            address: Pubkey::new_unique(),
            reason: "down".to_string(),
        };
        assert_eq!(read_back.side(), Some(Side::Candidate));
        assert!(read_back.to_string().contains("[CANDIDATE]"));
    }

    #[test]
    fn test_divergence_display_names_side_and_field() {
        let msg = Divergence::new(Some(Side::Candidate), "message.amount", "8888888", "88888888")
            .to_string();
        assert!(msg.contains("[CANDIDATE]"));
        assert!(msg.contains("message.amount"));

        let msg = Divergence::new(None, "program_result", "Success", "Failure").to_string();
        assert!(msg.starts_with("COMPARE FAILED: program_result"));
    }

    #[test]
    #[should_panic(expected = "Provisioning failed")]
    fn test_or_panic_with_none() {
        let missing: Option<u8> = None;
        missing.or_panic_with(HarnessError::Provision {
            mint: Pubkey::new_unique(),
            reason: "mint account missing".to_string(),
        });
    }
}
