//! The contract between suites and the engine that executes them.
//!
//! A suite never schedules anything by itself. Every node it creates, every
//! teardown it defers and every failure it reports goes through a
//! [`TestHandle`]. The engine behind the handle decides how nodes are
//! scheduled, how parallelism is limited and how outcomes are reported.
//!
//! [`engine::T`](crate::engine::T) is the implementation shipped with this
//! crate, but suites are generic over the handle so other engines can be
//! plugged in.

use std::{any::Any, time::Instant};

/// A handle to one node of a test run.
///
/// Handles are cheap to clone and every clone refers to the same node.
pub trait TestHandle: Clone + Send + Sync + 'static {
    /// The full name of this node, parent names joined by `/`.
    fn name(&self) -> &str;

    /// Run `f` as a named child node of this node.
    ///
    /// Returns once the child finished or opted into parallel scheduling via
    /// [`parallel`](Self::parallel). The return value is `false` if the child
    /// is known to have failed or was never started.
    fn run<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(Self) + Send + 'static;

    /// Mark this node as eligible to run concurrently with its siblings.
    fn parallel(&self);

    /// Register `f` to run after this node and every child it spawned have
    /// completed.
    ///
    /// Cleanups run in reverse registration order.
    fn cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static;

    /// Attach a log line to this node.
    fn log(&self, msg: &str);

    /// Log `msg` and mark this node as failed without stopping it.
    fn error(&self, msg: &str) {
        self.log(msg);
        self.fail();
    }

    /// Mark this node as failed without stopping it.
    fn fail(&self);

    /// Mark this node as failed and stop executing it.
    fn fail_now(&self) -> !;

    /// Whether this node has been marked as failed.
    fn failed(&self) -> bool;

    /// Log `reason` and stop executing this node, reporting it as skipped.
    fn skip(&self, reason: &str) -> !;

    /// Whether this node has been skipped.
    fn skipped(&self) -> bool;

    /// The point in time the run should be finished by, if there is one.
    fn deadline(&self) -> Option<Instant>;

    /// Whether a caught unwind payload is one of the engine's own control
    /// signals (raised by [`fail_now`](Self::fail_now) or
    /// [`skip`](Self::skip)) rather than a panic.
    ///
    /// Control signals must be resumed, never reported as panics.
    fn is_exit(payload: &(dyn Any + Send)) -> bool;
}
