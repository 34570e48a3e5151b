use std::{collections::BTreeMap, time::SystemTime};

/// Timing and outcome of a whole suite run, handed to the stats hook once
/// every test finished.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct SuiteStats {
    pub start: Option<SystemTime>,
    pub end: Option<SystemTime>,
    pub test_stats: BTreeMap<String, TestStats>,
}

/// Timing and outcome of one test, including its sub-tests.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TestStats {
    pub name: String,
    pub start: SystemTime,
    pub end: Option<SystemTime>,
    pub passed: bool,
}

impl SuiteStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start_suite(&mut self) {
        self.start = Some(SystemTime::now());
    }

    pub(crate) fn end_suite(&mut self) {
        self.end = Some(SystemTime::now());
    }

    pub(crate) fn start_test(&mut self, name: &str) {
        self.test_stats.insert(
            name.to_string(),
            TestStats {
                name: name.to_string(),
                start: SystemTime::now(),
                end: None,
                passed: false,
            },
        );
    }

    pub(crate) fn end_test(&mut self, name: &str, passed: bool) {
        if let Some(stats) = self.test_stats.get_mut(name) {
            stats.end = Some(SystemTime::now());
            stats.passed = passed;
        }
    }

    /// Whether every test of the suite passed.
    pub fn passed(&self) -> bool {
        self.test_stats.values().all(|stats| stats.passed)
    }
}
