use std::sync::Arc;

use crate::suite::{Ctx, SuiteStats};

/// A hook receiving only the node it runs for.
pub type Hook<D, G, H> = Arc<dyn Fn(&mut Ctx<D, G, H>) + Send + Sync>;

/// A hook additionally receiving the suite and test name.
pub type TestHook<D, G, H> = Arc<dyn Fn(&mut Ctx<D, G, H>, &str, &str) + Send + Sync>;

/// A hook receiving the suite name and the statistics of the finished run.
pub type StatsHook<D, G, H> = Arc<dyn Fn(&mut Ctx<D, G, H>, &str, &SuiteStats) + Send + Sync>;

/// The optional lifecycle capabilities of a suite.
pub struct Hooks<D, G, H> {
    pub(crate) setup_suite: Option<Hook<D, G, H>>,
    pub(crate) teardown_suite: Option<Hook<D, G, H>>,
    pub(crate) setup_test: Option<Hook<D, G, H>>,
    pub(crate) teardown_test: Option<Hook<D, G, H>>,
    pub(crate) setup_sub_test: Option<Hook<D, G, H>>,
    pub(crate) teardown_sub_test: Option<Hook<D, G, H>>,
    pub(crate) before_test: Option<TestHook<D, G, H>>,
    pub(crate) after_test: Option<TestHook<D, G, H>>,
    pub(crate) handle_stats: Option<StatsHook<D, G, H>>,
}

impl<D, G, H> Default for Hooks<D, G, H> {
    fn default() -> Self {
        Self {
            setup_suite: None,
            teardown_suite: None,
            setup_test: None,
            teardown_test: None,
            setup_sub_test: None,
            teardown_sub_test: None,
            before_test: None,
            after_test: None,
            handle_stats: None,
        }
    }
}

impl<D, G, H> Clone for Hooks<D, G, H> {
    fn clone(&self) -> Self {
        Self {
            setup_suite: self.setup_suite.clone(),
            teardown_suite: self.teardown_suite.clone(),
            setup_test: self.setup_test.clone(),
            teardown_test: self.teardown_test.clone(),
            setup_sub_test: self.setup_sub_test.clone(),
            teardown_sub_test: self.teardown_sub_test.clone(),
            before_test: self.before_test.clone(),
            after_test: self.after_test.clone(),
            handle_stats: self.handle_stats.clone(),
        }
    }
}

impl<D, G, H> Hooks<D, G, H> {
    /// Which capabilities are present.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            setup_suite: self.setup_suite.is_some(),
            teardown_suite: self.teardown_suite.is_some(),
            setup_test: self.setup_test.is_some(),
            teardown_test: self.teardown_test.is_some(),
            setup_sub_test: self.setup_sub_test.is_some(),
            teardown_sub_test: self.teardown_sub_test.is_some(),
            before_test: self.before_test.is_some(),
            after_test: self.after_test.is_some(),
            handle_stats: self.handle_stats.is_some(),
        }
    }
}

/// The capability set of a suite, one flag per optional hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub setup_suite: bool,
    pub teardown_suite: bool,
    pub setup_test: bool,
    pub teardown_test: bool,
    pub setup_sub_test: bool,
    pub teardown_sub_test: bool,
    pub before_test: bool,
    pub after_test: bool,
    pub handle_stats: bool,
}
