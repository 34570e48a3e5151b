//! Output formatting for engine runs.
//!
//! The engine never writes output itself. It hands events to a
//! [`RunFormatter`] on a dedicated thread, so nodes running in parallel do not
//! contend on the output target and the formatter sees events in the order
//! they happened.
//!
//! Formatter errors do not abort a run. They are collected together with the
//! [`FormatError`] naming the call that failed and end up in the
//! [`RunReport`](crate::RunReport).

use std::{num::NonZeroUsize, time::Duration};

use crate::outcome::NodeOutcome;

pub mod common;
pub mod no;
pub mod pretty;

/// Identifies which formatter call produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatError {
    RunStart,
    NodeStart,
    NodeOutcome,
    RunOutcome,
}

/// Data for [`RunFormatter::fmt_run_start`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct FmtRunStart<'r> {
    pub name: &'r str,
    pub parallelism: NonZeroUsize,
}

/// Data for [`RunFormatter::fmt_node_start`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct FmtNodeStart<'r> {
    pub name: &'r str,
}

/// Data for [`RunFormatter::fmt_node_outcome`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct FmtNodeOutcome<'o> {
    pub outcome: &'o NodeOutcome,
}

/// Data for [`RunFormatter::fmt_run_outcome`].
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct FmtRunOutcome<'o> {
    pub outcomes: &'o [NodeOutcome],
    pub duration: Duration,
}

impl FmtRunOutcome<'_> {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.skipped()).count()
    }
}

/// A strategy for turning engine events into output.
///
/// Every method has a no-op default so a formatter only implements the
/// events it cares about.
pub trait RunFormatter {
    type Error: Send;

    fn fmt_run_start(&mut self, data: FmtRunStart<'_>) -> Result<(), Self::Error> {
        let _ = data;
        Ok(())
    }

    fn fmt_node_start(&mut self, data: FmtNodeStart<'_>) -> Result<(), Self::Error> {
        let _ = data;
        Ok(())
    }

    fn fmt_node_outcome(&mut self, data: FmtNodeOutcome<'_>) -> Result<(), Self::Error> {
        let _ = data;
        Ok(())
    }

    fn fmt_run_outcome(&mut self, data: FmtRunOutcome<'_>) -> Result<(), Self::Error> {
        let _ = data;
        Ok(())
    }
}

pub(crate) trait FmtErrors<E> {
    fn push_on_error(&mut self, result: (FormatError, Result<(), E>));
}

impl<E> FmtErrors<E> for Vec<(FormatError, E)> {
    fn push_on_error(&mut self, (kind, result): (FormatError, Result<(), E>)) {
        if let Err(err) = result {
            self.push((kind, err));
        }
    }
}

macro_rules! named_fmt {
    ($formatter:ident.fmt_run_start($data:expr)) => {
        (
            $crate::formatter::FormatError::RunStart,
            $formatter.fmt_run_start($data),
        )
    };
    ($formatter:ident.fmt_node_start($data:expr)) => {
        (
            $crate::formatter::FormatError::NodeStart,
            $formatter.fmt_node_start($data),
        )
    };
    ($formatter:ident.fmt_node_outcome($data:expr)) => {
        (
            $crate::formatter::FormatError::NodeOutcome,
            $formatter.fmt_node_outcome($data),
        )
    };
    ($formatter:ident.fmt_run_outcome($data:expr)) => {
        (
            $crate::formatter::FormatError::RunOutcome,
            $formatter.fmt_run_outcome($data),
        )
    };
}

pub(crate) use named_fmt;
