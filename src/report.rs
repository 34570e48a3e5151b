use std::{
    process::{ExitCode, Termination},
    time::Duration,
};

use crate::{formatter::FormatError, outcome::NodeOutcome};

/// Node outcomes in the order the nodes finished.
pub type NodeOutcomes = Vec<NodeOutcome>;

#[derive(Debug)]
#[non_exhaustive]
pub struct RunReport<FmtError> {
    pub outcomes: NodeOutcomes,
    pub duration: Duration,
    pub fmt_errors: Vec<(FormatError, FmtError)>,
}

impl<FmtError> RunReport<FmtError> {
    /// Whether every node of the run succeeded.
    ///
    /// Failures roll up to ancestors, so this is the status of the root node.
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.status.is_good())
    }

    /// Find the outcome of a node by its full name.
    pub fn outcome(&self, name: &str) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|outcome| outcome.name == name)
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.passed() {
            true => ExitCode::SUCCESS,
            false => ExitCode::FAILURE,
        }
    }
}

impl<FmtError> Termination for RunReport<FmtError> {
    fn report(self) -> ExitCode {
        self.exit_code()
    }
}
