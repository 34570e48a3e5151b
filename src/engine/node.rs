use std::{
    any::Any,
    mem,
    panic::{self, AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::{
    capture::{self, ManagedThreadGuard},
    engine::{NodeEvent, slots::Slots},
    handle::TestHandle,
    outcome::{NodeOutcome, NodeStatus},
};

/// Unwind payload used by [`T::fail_now`] and [`T::skip`].
///
/// Raised with [`panic::resume_unwind`], so the panic hook never sees it.
#[derive(Debug)]
enum Exit {
    FailNow,
    Skip,
}

/// What a child tells the parent waiting in [`T::run`].
#[derive(Debug)]
enum Signal {
    Paused,
    Finished { passed: bool },
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// State shared by every node of one engine run.
pub(crate) struct RunShared {
    pub(crate) events: Sender<NodeEvent>,
    pub(crate) slots: Slots,
    pub(crate) fail_fast: bool,
    pub(crate) deadline: Option<Instant>,
    failures: AtomicUsize,
}

impl RunShared {
    pub(crate) fn new(
        events: Sender<NodeEvent>,
        slots: Slots,
        fail_fast: bool,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            events,
            slots,
            fail_fast,
            deadline,
            failures: AtomicUsize::new(0),
        }
    }

    fn should_fail_fast(&self) -> bool {
        self.fail_fast && self.failures.load(Ordering::Acquire) > 0
    }
}

struct PausedChild {
    resume: Sender<()>,
    signal: Receiver<Signal>,
    thread: JoinHandle<()>,
}

#[derive(Default)]
struct NodeState {
    failed: bool,
    skipped: bool,
    parallel: bool,
    logs: Vec<String>,
    cleanups: Vec<Cleanup>,
    paused: Vec<PausedChild>,
}

struct Node {
    name: String,
    parent: Option<T>,
    run: Arc<RunShared>,
    signal: Option<Sender<Signal>>,
    resume: Option<Receiver<()>>,
    state: Mutex<NodeState>,
}

/// The node handle of the built-in engine.
///
/// Every test and sub-test is backed by its own thread. A node that calls
/// [`parallel`](TestHandle::parallel) hands control back to its parent and
/// waits until the parent's body returned, after which all such siblings
/// run concurrently, limited by the engine's parallelism.
#[derive(Clone)]
pub struct T(Arc<Node>);

impl std::fmt::Debug for T {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("T").field(&self.0.name).finish()
    }
}

impl T {
    pub(crate) fn root(name: &str, run: Arc<RunShared>) -> Self {
        Self(Arc::new(Node {
            name: name.to_string(),
            parent: None,
            run,
            signal: None,
            resume: None,
            state: Mutex::new(NodeState::default()),
        }))
    }

    fn child(&self, name: &str, signal: Sender<Signal>, resume: Receiver<()>) -> Self {
        Self(Arc::new(Node {
            name: format!("{}/{}", self.0.name, name),
            parent: Some(self.clone()),
            run: Arc::clone(&self.0.run),
            signal: Some(signal),
            resume: Some(resume),
            state: Mutex::new(NodeState::default()),
        }))
    }

    /// Execute `f` as the body of this node and finish the node.
    ///
    /// Finishing means: wait for every paused child, run the cleanups and
    /// report the outcome. Returns whether the node passed.
    pub(crate) fn execute<F>(&self, f: F) -> bool
    where
        F: FnOnce(T),
    {
        let _managed = ManagedThreadGuard::enter();
        let start = Instant::now();
        let _ = self.0.run.events.send(NodeEvent::Start {
            name: self.0.name.clone(),
        });

        let handle = self.clone();
        let result = catch_unwind(AssertUnwindSafe(move || f(handle)));
        self.absorb(result);

        self.join_paused();
        self.run_cleanups();
        self.finish(start.elapsed())
    }

    /// Turn the result of a caught call into node state.
    fn absorb(&self, result: thread::Result<()>) {
        let Err(payload) = result else { return };
        if payload.is::<Exit>() {
            return;
        }

        let message = capture::payload_as_string(payload.as_ref());
        match capture::take_panic_detail() {
            Some(detail) => self.error(&format!("panicked: {message}\n{detail}")),
            None => self.error(&format!("panicked: {message}")),
        }
    }

    /// Hand the slot of this node to its paused children and wait for them.
    ///
    /// A running node always holds one slot, sequential children run on the
    /// slot of their parent. A sequential node takes a slot back once its
    /// children are done, a parallel node is finished with it.
    fn join_paused(&self) {
        let (paused, parallel) = {
            let mut state = self.0.state.lock();
            (mem::take(&mut state.paused), state.parallel)
        };

        if paused.is_empty() {
            if parallel {
                self.0.run.slots.release();
            }
            return;
        }

        self.0.run.slots.release();
        for child in paused.iter() {
            let _ = child.resume.send(());
        }
        for child in paused {
            let _ = child.signal.recv();
            let _ = child.thread.join();
        }
        if !parallel {
            self.0.run.slots.acquire();
        }
    }

    fn run_cleanups(&self) {
        // Popped one by one, cleanups may register further cleanups.
        loop {
            let Some(cleanup) = self.0.state.lock().cleanups.pop() else {
                break;
            };
            let result = catch_unwind(AssertUnwindSafe(cleanup));
            self.absorb(result);
        }
    }

    fn finish(&self, duration: Duration) -> bool {
        let (status, logs) = {
            let mut state = self.0.state.lock();
            let status = match (state.failed, state.skipped) {
                (true, _) => NodeStatus::Failed,
                (false, true) => NodeStatus::Skipped,
                (false, false) => NodeStatus::Passed,
            };
            (status, mem::take(&mut state.logs))
        };

        if status.failed() {
            self.0.run.failures.fetch_add(1, Ordering::AcqRel);
        }

        let passed = status.is_good();
        let _ = self.0.run.events.send(NodeEvent::Outcome(NodeOutcome {
            name: self.0.name.clone(),
            status,
            duration,
            logs,
        }));
        passed
    }

    fn signal(&self, signal: Signal) {
        if let Some(tx) = &self.0.signal {
            let _ = tx.send(signal);
        }
    }
}

impl TestHandle for T {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn run<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(Self) + Send + 'static,
    {
        if self.0.run.should_fail_fast() {
            tracing::debug!(parent = %self.0.name, name, "fail fast, not starting node");
            return false;
        }

        let (signal_tx, signal_rx) = crossbeam_channel::bounded(2);
        let (resume_tx, resume_rx) = crossbeam_channel::bounded(1);
        let child = self.child(name, signal_tx, resume_rx);

        let spawned = thread::Builder::new()
            .name(child.0.name.clone())
            .spawn(move || {
                let passed = child.execute(f);
                child.signal(Signal::Finished { passed });
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                tracing::error!(parent = %self.0.name, name, %err, "failed to spawn node thread");
                self.error(&format!("failed to spawn `{name}`: {err}"));
                return false;
            }
        };

        match signal_rx.recv() {
            Ok(Signal::Paused) => {
                self.0.state.lock().paused.push(PausedChild {
                    resume: resume_tx,
                    signal: signal_rx,
                    thread,
                });
                true
            }
            Ok(Signal::Finished { passed }) => {
                let _ = thread.join();
                passed
            }
            Err(_) => {
                let _ = thread.join();
                false
            }
        }
    }

    fn parallel(&self) {
        {
            let mut state = self.0.state.lock();
            if state.parallel {
                drop(state);
                panic!("{}: parallel called multiple times", self.0.name);
            }
            state.parallel = true;
        }

        // The root has nobody to hand control back to.
        let (Some(_), Some(resume)) = (&self.0.signal, &self.0.resume) else {
            return;
        };
        self.signal(Signal::Paused);
        let _ = resume.recv();

        self.0.run.slots.acquire();
    }

    fn cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.state.lock().cleanups.push(Box::new(f));
    }

    fn log(&self, msg: &str) {
        self.0.state.lock().logs.push(msg.to_string());
    }

    fn fail(&self) {
        self.0.state.lock().failed = true;
        if let Some(parent) = &self.0.parent {
            parent.fail();
        }
    }

    fn fail_now(&self) -> ! {
        self.fail();
        panic::resume_unwind(Box::new(Exit::FailNow))
    }

    fn failed(&self) -> bool {
        self.0.state.lock().failed
    }

    fn skip(&self, reason: &str) -> ! {
        {
            let mut state = self.0.state.lock();
            if !reason.is_empty() {
                state.logs.push(reason.to_string());
            }
            state.skipped = true;
        }
        panic::resume_unwind(Box::new(Exit::Skip))
    }

    fn skipped(&self) -> bool {
        self.0.state.lock().skipped
    }

    fn deadline(&self) -> Option<Instant> {
        self.0.run.deadline
    }

    fn is_exit(payload: &(dyn Any + Send)) -> bool {
        payload.is::<Exit>()
    }
}
