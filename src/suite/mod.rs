//! Suites: named test operations sharing lifecycle hooks.
//!
//! A [`Suite`] is built once and run against a [`TestHandle`]. Running it
//! selects the test operations to run (see [`catalog`]), brackets the run with
//! the suite hooks and every test with the test hooks:
//!
//! ```text
//! SetupSuite
//!   SetupTest, BeforeTest, <test>, AfterTest, TearDownTest    (per test)
//!     SetupSubTest, <sub-test>, TearDownSubTest                (per sub-test)
//! TearDownSuite
//! HandleStats
//! ```
//!
//! Teardowns are registered as cleanups of the node they belong to, so they
//! only run once the node and everything it spawned, parallel children
//! included, finished. A panic in any hook or body fails only the node it
//! happened in.

use std::{borrow::Cow, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{config::SuiteConfig, engine::T, error::ConfigError, handle::TestHandle};

pub mod catalog;
pub mod recover;
pub mod stats;
pub use stats::{SuiteStats, TestStats};

mod ctx;
pub use ctx::{Ancestor, Ctx};

mod hooks;
pub use hooks::{Capabilities, Hook, Hooks, StatsHook, TestHook};

type TestFn<D, G, H> = Arc<dyn Fn(&mut Ctx<D, G, H>) + Send + Sync>;

/// A named test operation of a suite.
pub struct SuiteTest<D, G, H = T> {
    pub name: Cow<'static, str>,
    func: TestFn<D, G, H>,
}

impl<D, G, H> SuiteTest<D, G, H> {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl<D, G, H> fmt::Debug for SuiteTest<D, G, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteTest")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What every node of one suite run can reach besides its own data.
pub(crate) struct SuiteShared<D, G, H> {
    pub(crate) name: String,
    pub(crate) hooks: Hooks<D, G, H>,
}

/// A suite of tests with per-node private data `D` and run-wide global data
/// `G`, executed through handles of type `H`.
///
/// Only operations whose name starts with `Test` are run, see
/// [`catalog::TEST_PREFIX`].
pub struct Suite<D, G, H = T> {
    name: Cow<'static, str>,
    tests: Vec<SuiteTest<D, G, H>>,
    hooks: Hooks<D, G, H>,
}

impl<D, G, H> fmt::Debug for Suite<D, G, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tests", &self.tests)
            .field("capabilities", &self.hooks.capabilities())
            .finish()
    }
}

impl<D, G, H> Suite<D, G, H> {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered operations in declaration order.
    pub fn tests(&self) -> &[SuiteTest<D, G, H>] {
        &self.tests
    }

    pub fn capabilities(&self) -> Capabilities {
        self.hooks.capabilities()
    }

    /// Register a test operation.
    pub fn test<F>(mut self, name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.tests.push(SuiteTest::new(name, func));
        self
    }

    /// Runs once before the first test, on the suite's own node.
    ///
    /// This is the place to fill in the global data, see [`Ctx::global_mut`].
    pub fn setup_suite<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.setup_suite = Some(Arc::new(f));
        self
    }

    /// Runs once every test, parallel ones included, finished.
    pub fn teardown_suite<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.teardown_suite = Some(Arc::new(f));
        self
    }

    pub fn setup_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.setup_test = Some(Arc::new(f));
        self
    }

    /// Runs after a test and all of its sub-tests finished.
    pub fn teardown_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.teardown_test = Some(Arc::new(f));
        self
    }

    pub fn setup_sub_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.setup_sub_test = Some(Arc::new(f));
        self
    }

    pub fn teardown_sub_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>) + Send + Sync + 'static,
    {
        self.hooks.teardown_sub_test = Some(Arc::new(f));
        self
    }

    /// Runs right before a test body with the suite and test name.
    pub fn before_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>, &str, &str) + Send + Sync + 'static,
    {
        self.hooks.before_test = Some(Arc::new(f));
        self
    }

    /// Runs after a test with the suite and test name, before its teardown.
    pub fn after_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>, &str, &str) + Send + Sync + 'static,
    {
        self.hooks.after_test = Some(Arc::new(f));
        self
    }

    /// Receives the statistics of the run after the suite teardown.
    pub fn handle_stats<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Ctx<D, G, H>, &str, &SuiteStats) + Send + Sync + 'static,
    {
        self.hooks.handle_stats = Some(Arc::new(f));
        self
    }
}

impl<D, G, H> Suite<D, G, H>
where
    D: Default + Send + Sync + 'static,
    G: Default + Send + Sync + 'static,
    H: TestHandle,
{
    /// Run the suite on the node behind `t`.
    ///
    /// Every selected test becomes a child node of `t`. An invalid pattern in
    /// `config` fails `t` and is returned, no hook runs in that case. When no
    /// test is selected a warning is logged and no hook runs either.
    ///
    /// A panic in the suite setup stops the suite: no test runs, the suite
    /// teardown and the stats hook still do.
    pub fn run(&self, t: &H, config: &SuiteConfig) -> Result<(), ConfigError> {
        let filter = match config.compile() {
            Ok(filter) => filter,
            Err(err) => {
                tracing::error!(suite = %self.name, %err, "invalid suite configuration");
                t.error(&format!("{}: {err}", self.name));
                return Err(err);
            }
        };

        let run_set = catalog::select(&self.tests, &filter);
        if run_set.is_empty() {
            tracing::warn!(
                suite = %self.name,
                filtered_out = run_set.filtered_out,
                "no tests to run"
            );
            t.log("warning: no tests to run");
            return Ok(());
        }

        tracing::debug!(
            suite = %self.name,
            tests = run_set.tests.len(),
            filtered_out = run_set.filtered_out,
            capabilities = ?self.hooks.capabilities(),
            "running suite"
        );

        let shared = Arc::new(SuiteShared {
            name: self.name.to_string(),
            hooks: self.hooks.clone(),
        });
        let root = Arc::new(Mutex::new(Ctx::new(
            t.clone(),
            D::default(),
            Arc::new(G::default()),
            None,
            Arc::clone(&shared),
        )));

        recover::guard(t, || {
            let stats = shared.hooks.handle_stats.clone().map(|hook| {
                let stats = Arc::new(Mutex::new(SuiteStats::new()));
                let (root, shared, finished) =
                    (Arc::clone(&root), Arc::clone(&shared), Arc::clone(&stats));
                defer_guarded(t, move || {
                    let mut stats = finished.lock();
                    stats.end_suite();
                    hook(&mut root.lock(), &shared.name, &stats);
                });
                stats.lock().start_suite();
                stats
            });

            if let Some(hook) = shared.hooks.teardown_suite.clone() {
                let root = Arc::clone(&root);
                defer_guarded(t, move || hook(&mut root.lock()));
            }
            if let Some(hook) = &shared.hooks.setup_suite {
                hook(&mut root.lock());
            }

            // Taken after the setup so it had exclusive access.
            let global = root.lock().global_arc();
            for test in run_set.tests {
                let node = TestNode {
                    name: test.name.to_string(),
                    func: Arc::clone(&test.func),
                    global: Arc::clone(&global),
                    suite: Arc::clone(&shared),
                    stats: stats.clone(),
                };
                t.run(&test.name, move |t| node.execute(t));
            }
        });

        Ok(())
    }
}

/// Everything one top-level test needs on its own node.
struct TestNode<D, G, H> {
    name: String,
    func: TestFn<D, G, H>,
    global: Arc<G>,
    suite: Arc<SuiteShared<D, G, H>>,
    stats: Option<Arc<Mutex<SuiteStats>>>,
}

impl<D, G, H> TestNode<D, G, H>
where
    D: Default + Send + Sync + 'static,
    G: Send + Sync + 'static,
    H: TestHandle,
{
    fn execute(self, t: H) {
        let Self {
            name,
            func,
            global,
            suite,
            stats,
        } = self;
        let ctx = Arc::new(Mutex::new(Ctx::new(
            t.clone(),
            D::default(),
            global,
            None,
            Arc::clone(&suite),
        )));

        recover::guard(&t, || {
            if let Some(stats) = stats {
                stats.lock().start_test(&name);
                let (handle, name) = (t.clone(), name.clone());
                t.cleanup(move || stats.lock().end_test(&name, !handle.failed()));
            }

            if let Some(hook) = suite.hooks.teardown_test.clone() {
                let ctx = Arc::clone(&ctx);
                defer_guarded(&t, move || hook(&mut ctx.lock()));
            }
            if let Some(hook) = &suite.hooks.setup_test {
                hook(&mut ctx.lock());
            }

            if let Some(hook) = suite.hooks.after_test.clone() {
                let (ctx, suite, name) = (Arc::clone(&ctx), Arc::clone(&suite), name.clone());
                defer_guarded(&t, move || hook(&mut ctx.lock(), &suite.name, &name));
            }
            if let Some(hook) = &suite.hooks.before_test {
                hook(&mut ctx.lock(), &suite.name, &name);
            }

            func(&mut ctx.lock());
        })
    }
}

/// Register `f` as a cleanup of `t`, guarded like any hook.
pub(crate) fn defer_guarded<H, F>(t: &H, f: F)
where
    H: TestHandle,
    F: FnOnce() + Send + 'static,
{
    let handle = t.clone();
    t.cleanup(move || recover::guard(&handle, f));
}
