//! The built-in execution engine.
//!
//! The engine runs a tree of named nodes. It mirrors the semantics suites
//! rely on:
//!
//! - a child started via [`TestHandle::run`] runs to completion before `run`
//!   returns, unless it opts into [`TestHandle::parallel`]
//! - parallel children are paused until their parent's body returned and then
//!   run concurrently, at most [`Engine::with_parallelism`] at a time; a node
//!   waiting for its paused children hands its own slot to them
//! - cleanups of a node run after its body and every child finished, in
//!   reverse registration order
//! - failures roll up to every ancestor
//!
//! Events are forwarded to a [`RunFormatter`] on a dedicated thread and the
//! outcome of the whole run is returned as a [`RunReport`].

use std::{
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::{
    RunReport,
    formatter::{
        FmtErrors, FmtNodeOutcome, FmtNodeStart, FmtRunOutcome, FmtRunStart, RunFormatter,
        named_fmt, no::NoFormatter, pretty::PrettyFormatter,
    },
    outcome::NodeOutcome,
};

mod node;
pub use node::T;
use node::RunShared;

mod slots;
use slots::Slots;

pub(crate) enum NodeEvent {
    Start { name: String },
    Outcome(NodeOutcome),
    Done,
}

/// Builder and entry point for engine runs.
#[derive(Debug)]
pub struct Engine<Formatter> {
    parallelism: NonZeroUsize,
    fail_fast: bool,
    timeout: Option<Duration>,
    formatter: Formatter,
}

impl Default for Engine<PrettyFormatter<std::io::Stdout>> {
    fn default() -> Self {
        Self {
            parallelism: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            fail_fast: false,
            timeout: None,
            formatter: PrettyFormatter::default(),
        }
    }
}

impl Engine<PrettyFormatter<std::io::Stdout>> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine<NoFormatter> {
    /// An engine that reports nothing, for runs driven from inside other tests.
    pub fn quiet() -> Self {
        Engine::default().with_formatter(NoFormatter)
    }
}

impl<Formatter> Engine<Formatter> {
    /// Limit how many parallel nodes may run at the same time.
    pub fn with_parallelism(self, parallelism: NonZeroUsize) -> Self {
        Self {
            parallelism,
            ..self
        }
    }

    /// Stop starting new nodes once any node failed.
    pub fn with_fail_fast(self, fail_fast: bool) -> Self {
        Self { fail_fast, ..self }
    }

    /// Report a deadline of `timeout` after the run started to every node.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_formatter<WithFormatter>(self, formatter: WithFormatter) -> Engine<WithFormatter> {
        Engine {
            parallelism: self.parallelism,
            fail_fast: self.fail_fast,
            timeout: self.timeout,
            formatter,
        }
    }
}

impl<Formatter: RunFormatter + Send> Engine<Formatter> {
    /// Run `f` as the root node named `name` on the current thread.
    pub fn run<F>(self, name: &str, f: F) -> RunReport<Formatter::Error>
    where
        F: FnOnce(T),
    {
        let now = Instant::now();
        let mut formatter = self.formatter;
        let mut fmt_errors = Vec::new();
        fmt_errors.push_on_error(named_fmt!(formatter.fmt_run_start(FmtRunStart {
            name,
            parallelism: self.parallelism,
        })));

        let (etx, erx) = crossbeam_channel::unbounded();
        let shared = Arc::new(RunShared::new(
            etx.clone(),
            Slots::new(self.parallelism),
            self.fail_fast,
            self.timeout.map(|timeout| now + timeout),
        ));

        let (outcomes, mut formatter, mut fmt_errors) = thread::scope(move |scope| {
            let fmt_thread = scope.spawn(move || {
                let mut outcomes = Vec::new();
                // Handles may outlive the run, so the channel is closed by `Done`
                // rather than by dropping every sender.
                while let Ok(event) = erx.recv() {
                    match event {
                        NodeEvent::Start { name } => fmt_errors.push_on_error(named_fmt!(
                            formatter.fmt_node_start(FmtNodeStart { name: &name })
                        )),
                        NodeEvent::Outcome(outcome) => {
                            fmt_errors.push_on_error(named_fmt!(
                                formatter.fmt_node_outcome(FmtNodeOutcome { outcome: &outcome })
                            ));
                            outcomes.push(outcome);
                        }
                        NodeEvent::Done => break,
                    }
                }
                (outcomes, formatter, fmt_errors)
            });

            // The root runs like any node and holds a slot while it does.
            shared.slots.acquire();
            let root = T::root(name, shared);
            root.execute(f);
            drop(root);

            let _ = etx.send(NodeEvent::Done);
            fmt_thread
                .join()
                .expect("format thread should join without issues")
        });

        let duration = now.elapsed();
        fmt_errors.push_on_error(named_fmt!(formatter.fmt_run_outcome(FmtRunOutcome {
            outcomes: &outcomes,
            duration,
        })));

        RunReport {
            outcomes,
            duration,
            fmt_errors,
        }
    }
}
