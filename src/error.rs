use thiserror::Error;

/// Errors in the configuration of a suite run.
///
/// These are fatal: a run with an invalid configuration executes no test.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {which} pattern `{pattern}`: {source}")]
    InvalidPattern {
        which: PatternKind,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("missing value for `{flag}`")]
    MissingValue { flag: String },
}

/// Which of the two selection patterns an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Include,
    Exclude,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Include => f.write_str("include"),
            PatternKind::Exclude => f.write_str("exclude"),
        }
    }
}
