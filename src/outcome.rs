use std::time::Duration;

/// The outcome of a single node (a test, a sub-test or the root of a run).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct NodeOutcome {
    pub name: String,
    pub status: NodeStatus,
    pub duration: Duration,
    pub logs: Vec<String>,
}

impl NodeOutcome {
    pub fn passed(&self) -> bool {
        self.status.passed()
    }

    pub fn failed(&self) -> bool {
        self.status.failed()
    }

    pub fn skipped(&self) -> bool {
        self.status.skipped()
    }

    /// The number of `/` separated segments in the name, zero for the root.
    pub fn depth(&self) -> usize {
        self.name.matches('/').count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Passed,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn passed(&self) -> bool {
        matches!(self, NodeStatus::Passed)
    }

    pub fn failed(&self) -> bool {
        matches!(self, NodeStatus::Failed)
    }

    pub fn skipped(&self) -> bool {
        matches!(self, NodeStatus::Skipped)
    }

    /// Whether this status lets the run succeed.
    pub fn is_good(&self) -> bool {
        !self.failed()
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            NodeStatus::Passed => "PASS",
            NodeStatus::Failed => "FAIL",
            NodeStatus::Skipped => "SKIP",
        }
    }
}
