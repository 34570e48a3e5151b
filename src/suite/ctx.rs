use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Instant,
};

use parking_lot::Mutex;

use crate::{
    engine::T,
    handle::TestHandle,
    suite::{SuiteShared, defer_guarded, recover},
};

/// The context of one node of a suite run.
///
/// Every test and sub-test gets a fresh context with its own private data
/// `D`, while the global data `G` is shared by all nodes of the run. The
/// context dereferences to the private data.
///
/// Private data, global data and the handle are fixed when the context is
/// created and cannot be replaced afterwards.
pub struct Ctx<D, G, H = T> {
    t: H,
    data: D,
    global: Arc<G>,
    parent: Option<Arc<Ancestor<D>>>,
    suite: Arc<SuiteShared<D, G, H>>,
}

/// The private data of an ancestor node, as it was when the child started.
#[derive(Debug)]
pub struct Ancestor<D> {
    name: String,
    data: D,
    parent: Option<Arc<Ancestor<D>>>,
}

impl<D> Ancestor<D> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn parent(&self) -> Option<&Ancestor<D>> {
        self.parent.as_deref()
    }
}

impl<D> Deref for Ancestor<D> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<D, G, H> Ctx<D, G, H> {
    pub(crate) fn new(
        t: H,
        data: D,
        global: Arc<G>,
        parent: Option<Arc<Ancestor<D>>>,
        suite: Arc<SuiteShared<D, G, H>>,
    ) -> Self {
        Self {
            t,
            data,
            global,
            parent,
            suite,
        }
    }

    /// The engine handle of this node.
    pub fn t(&self) -> &H {
        &self.t
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// The data shared by every node of this suite run.
    ///
    /// Mutating it from nodes that run in parallel needs synchronization
    /// inside `G`, nothing is locked for you.
    pub fn global(&self) -> &G {
        &self.global
    }

    /// Exclusive access to the global data, available while no other node
    /// holds it, which is the case during the suite setup.
    pub fn global_mut(&mut self) -> Option<&mut G> {
        Arc::get_mut(&mut self.global)
    }

    pub(crate) fn global_arc(&self) -> Arc<G> {
        Arc::clone(&self.global)
    }

    /// The enclosing node, `None` for the suite and its top-level tests.
    ///
    /// The ancestor data is a copy taken when [`Ctx::run`] started this node.
    /// Changes the parent makes afterwards are not visible here.
    pub fn parent(&self) -> Option<&Ancestor<D>> {
        self.parent.as_deref()
    }

    pub fn suite_name(&self) -> &str {
        &self.suite.name
    }
}

impl<D, G, H: TestHandle> Ctx<D, G, H> {
    pub fn name(&self) -> &str {
        self.t.name()
    }

    pub fn log(&self, msg: impl AsRef<str>) {
        self.t.log(msg.as_ref())
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.t.error(msg.as_ref())
    }

    pub fn fail(&self) {
        self.t.fail()
    }

    pub fn fail_now(&self) -> ! {
        self.t.fail_now()
    }

    pub fn failed(&self) -> bool {
        self.t.failed()
    }

    pub fn skip(&self, reason: impl AsRef<str>) -> ! {
        self.t.skip(reason.as_ref())
    }

    pub fn skipped(&self) -> bool {
        self.t.skipped()
    }

    pub fn parallel(&self) {
        self.t.parallel()
    }

    pub fn cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.t.cleanup(f)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.t.deadline()
    }
}

impl<D, G, H> Ctx<D, G, H>
where
    D: Clone + Default + Send + Sync + 'static,
    G: Send + Sync + 'static,
    H: TestHandle,
{
    /// Run `subtest` as a named sub-test of this node.
    ///
    /// The sub-test gets a fresh context sharing the global data. Its parent
    /// is a snapshot of this node's private data taken now, see
    /// [`Ctx::parent`]. The suite's sub-test setup runs before `subtest`, the
    /// sub-test teardown once the sub-test and all of its own sub-tests
    /// finished.
    pub fn run<F>(&self, name: &str, subtest: F) -> bool
    where
        F: FnOnce(&mut Ctx<D, G, H>) + Send + 'static,
    {
        let global = Arc::clone(&self.global);
        let suite = Arc::clone(&self.suite);
        let parent = Arc::new(Ancestor {
            name: self.t.name().to_string(),
            data: self.data.clone(),
            parent: self.parent.clone(),
        });

        self.t.run(name, move |t| {
            let ctx = Arc::new(Mutex::new(Ctx::new(
                t.clone(),
                D::default(),
                global,
                Some(parent),
                Arc::clone(&suite),
            )));

            recover::guard(&t, || {
                if let Some(hook) = suite.hooks.teardown_sub_test.clone() {
                    let ctx = Arc::clone(&ctx);
                    defer_guarded(&t, move || hook(&mut ctx.lock()));
                }
                if let Some(hook) = &suite.hooks.setup_sub_test {
                    hook(&mut ctx.lock());
                }
                subtest(&mut ctx.lock());
            })
        })
    }
}

impl<D, G, H> Deref for Ctx<D, G, H> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<D, G, H> DerefMut for Ctx<D, G, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}
