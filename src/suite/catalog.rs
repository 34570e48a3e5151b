//! Selection of the test operations that make up a run.

use regex::Regex;

use crate::suite::SuiteTest;

/// Operations whose name starts with this prefix are tests.
pub const TEST_PREFIX: &str = "Test";

/// Compiled include/exclude selection, see [`SuiteConfig`](crate::SuiteConfig).
///
/// Include is checked first, exclude is applied on top of it.
#[derive(Debug, Clone, Default)]
pub struct MethodFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl MethodFilter {
    pub fn new(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self { include, exclude }
    }

    /// Whether an operation called `name` belongs to the run set.
    pub fn is_match(&self, name: &str) -> bool {
        if !name.starts_with(TEST_PREFIX) {
            return false;
        }

        let included = self
            .include
            .as_ref()
            .is_none_or(|include| include.is_match(name));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(name));
        included && !excluded
    }
}

/// The operations selected for one invocation, in declaration order.
#[derive(Debug)]
pub struct RunSet<'s, D, G, H> {
    pub tests: Vec<&'s SuiteTest<D, G, H>>,
    pub filtered_out: usize,
}

impl<D, G, H> RunSet<'_, D, G, H> {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|test| test.name.as_ref())
    }
}

/// Narrow the registered operations of a suite down to its run set.
pub fn select<'s, D, G, H>(
    tests: &'s [SuiteTest<D, G, H>],
    filter: &MethodFilter,
) -> RunSet<'s, D, G, H> {
    let mut selected = Vec::with_capacity(tests.len());
    let mut filtered_out = 0;
    for test in tests {
        match filter.is_match(&test.name) {
            true => selected.push(test),
            false => filtered_out += 1,
        }
    }
    RunSet {
        tests: selected,
        filtered_out,
    }
}
