//! Suites of tests with shared lifecycle hooks, run on a threaded test engine.
//!
//! A [`Suite`] groups named test operations with optional setup and teardown
//! hooks for the suite, every test and every sub-test. Tests may opt into
//! parallel execution, teardowns still wait for everything they bracket.
//!
//! ```no_run
//! use kisuite::{Suite, SuiteConfig};
//!
//! #[derive(Default)]
//! struct Global {
//!     base: u32,
//! }
//!
//! let suite = Suite::<u32, Global>::new("Arithmetic")
//!     .setup_suite(|ctx| {
//!         if let Some(global) = ctx.global_mut() {
//!             global.base = 40;
//!         }
//!     })
//!     .test("TestAdd", |ctx| {
//!         ctx.parallel();
//!         if ctx.global().base + 2 != 42 {
//!             ctx.error("math is broken");
//!         }
//!     });
//!
//! let report = kisuite::run(&suite, &SuiteConfig::new());
//! assert!(report.passed());
//! ```

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod handle;
pub mod outcome;
pub mod suite;

mod report;
pub use report::*;

pub use config::SuiteConfig;
pub use engine::{Engine, T};
pub use error::ConfigError;
pub use handle::TestHandle;
pub use suite::{Ctx, Suite, SuiteStats};

/// Run `suite` as the root node of a default [`Engine`].
///
/// The root node is named after the suite and output goes to stdout. An
/// invalid `config` shows up as a failed root node in the returned report.
pub fn run<D, G>(suite: &Suite<D, G, T>, config: &SuiteConfig) -> RunReport<std::io::Error>
where
    D: Default + Send + Sync + 'static,
    G: Default + Send + Sync + 'static,
{
    Engine::default().run(suite.name(), |t| {
        // Already reported on the root node.
        let _ = suite.run(&t, config);
    })
}
