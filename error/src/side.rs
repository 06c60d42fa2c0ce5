use std::fmt::{self, Display};

/// Which deployment of the program under test an artifact belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// The build being validated.
    Candidate,
    /// The trusted fork build the candidate is compared against.
    Reference,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Candidate, Side::Reference];

    pub const fn label(&self) -> &'static str {
        match self {
            Side::Candidate => "CANDIDATE",
            Side::Reference => "REFERENCE",
        }
    }

    pub const fn other(&self) -> Side {
        match self {
            Side::Candidate => Side::Reference,
            Side::Reference => Side::Candidate,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
