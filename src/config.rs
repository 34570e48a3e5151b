//! Run selection configuration.
//!
//! [`SuiteConfig`] is a plain value passed into [`Suite::run`](crate::suite::Suite::run).
//! It can be filled in by hand, from command line arguments or from the
//! environment. Nothing here is global state.

use std::env;

use crate::{
    error::{ConfigError, PatternKind},
    suite::catalog::MethodFilter,
};

/// Command line flag selecting tests to run.
pub const INCLUDE_FLAG: &str = "--suite.m";
/// Command line flag selecting tests to leave out.
pub const EXCLUDE_FLAG: &str = "--suite.x";

/// Environment variable read by [`SuiteConfig::from_env`] for the include pattern.
pub const INCLUDE_ENV: &str = "KISUITE_INCLUDE";
/// Environment variable read by [`SuiteConfig::from_env`] for the exclude pattern.
pub const EXCLUDE_ENV: &str = "KISUITE_EXCLUDE";

/// Which test operations of a suite run.
///
/// By default both patterns are absent and every operation whose name starts
/// with `Test` runs. An empty pattern counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Only operations matching this regular expression run.
    pub include: Option<String>,
    /// Operations matching this regular expression are left out, also when
    /// they match `include`.
    pub exclude: Option<String>,
}

impl SuiteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include(self, pattern: impl Into<String>) -> Self {
        Self {
            include: Some(pattern.into()),
            ..self
        }
    }

    pub fn with_exclude(self, pattern: impl Into<String>) -> Self {
        Self {
            exclude: Some(pattern.into()),
            ..self
        }
    }

    /// Read `--suite.m` and `--suite.x` from command line arguments.
    ///
    /// Both `--suite.m <re>` and `--suite.m=<re>` are accepted, unrelated
    /// arguments are ignored. The last occurrence of a flag wins.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg, None),
            };

            let slot = match flag {
                INCLUDE_FLAG => &mut config.include,
                EXCLUDE_FLAG => &mut config.exclude,
                _ => continue,
            };

            let value = match inline {
                Some(value) => value,
                None => args
                    .next()
                    .map(|value| value.as_ref().to_string())
                    .ok_or_else(|| ConfigError::MissingValue {
                        flag: flag.to_string(),
                    })?,
            };
            *slot = Some(value);
        }
        Ok(config)
    }

    /// Read the patterns from `KISUITE_INCLUDE` and `KISUITE_EXCLUDE`.
    pub fn from_env() -> Self {
        Self {
            include: env::var(INCLUDE_ENV).ok(),
            exclude: env::var(EXCLUDE_ENV).ok(),
        }
    }

    /// Compile the patterns into a [`MethodFilter`].
    pub fn compile(&self) -> Result<MethodFilter, ConfigError> {
        let include = compile_pattern(self.include.as_deref(), PatternKind::Include)?;
        let exclude = compile_pattern(self.exclude.as_deref(), PatternKind::Exclude)?;
        Ok(MethodFilter::new(include, exclude))
    }
}

fn compile_pattern(
    pattern: Option<&str>,
    which: PatternKind,
) -> Result<Option<regex::Regex>, ConfigError> {
    match pattern {
        None | Some("") => Ok(None),
        Some(pattern) => regex::Regex::new(pattern)
            .map(Some)
            .map_err(|source| ConfigError::InvalidPattern {
                which,
                pattern: pattern.to_string(),
                source,
            }),
    }
}
