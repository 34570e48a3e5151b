use std::{
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use kisuite::{
    ConfigError, Ctx, Engine, Suite, SuiteConfig, SuiteStats,
    error::PatternKind,
    formatter::pretty::PrettyFormatter,
    suite::Capabilities,
};
use pretty_assertions::assert_eq;

use lib::{Buffer, Tracker, run_on, run_quiet};

fn wide() -> Engine<kisuite::formatter::no::NoFormatter> {
    Engine::quiet().with_parallelism(NonZeroUsize::new(4).unwrap())
}

fn recording<D, G>(tracker: &Tracker, kind: &'static str) -> impl Fn(&mut Ctx<D, G>) + Send + Sync + 'static
where
    D: 'static,
    G: 'static,
{
    let tracker = tracker.clone();
    move |ctx| tracker.record(format!("{kind} {}", ctx.name()))
}

#[test]
fn parallel_suite_brackets_nest() {
    let tracker = Tracker::default();
    let mut suite = Suite::<(), ()>::new("Parallel")
        .setup_suite(recording(&tracker, "SetupSuite"))
        .teardown_suite(recording(&tracker, "TearDownSuite"))
        .setup_test(recording(&tracker, "SetupTest"))
        .teardown_test(recording(&tracker, "TearDownTest"))
        .setup_sub_test(recording(&tracker, "SetupSubTest"))
        .teardown_sub_test(recording(&tracker, "TearDownSubTest"));

    for test in ["TestOne", "TestTwo"] {
        let tracker = tracker.clone();
        suite = suite.test(test, move |ctx| {
            ctx.parallel();
            tracker.record(format!("Test {}", ctx.name()));
            for sub in ["sub1", "sub2"] {
                let tracker = tracker.clone();
                ctx.run(sub, move |ctx| {
                    ctx.parallel();
                    thread::sleep(Duration::from_millis(10));
                    tracker.record(format!("Sub {}", ctx.name()));
                });
            }
        });
    }

    let report = run_on(wide(), &suite, &SuiteConfig::new());
    assert!(report.passed());

    let entries = tracker.entries();
    assert_eq!(entries.len(), 20);
    assert_eq!(entries.first().unwrap(), "SetupSuite Parallel");
    assert_eq!(entries.last().unwrap(), "TearDownSuite Parallel");

    let pos = |entry: String| tracker.position(&entry).unwrap();
    for test in ["TestOne", "TestTwo"] {
        let name = format!("Parallel/{test}");
        let teardown = pos(format!("TearDownTest {name}"));
        assert!(pos(format!("SetupTest {name}")) < pos(format!("Test {name}")));
        assert!(pos(format!("Test {name}")) < teardown);

        for sub in ["sub1", "sub2"] {
            let sub = format!("{name}/{sub}");
            assert!(pos(format!("SetupSubTest {sub}")) < pos(format!("Sub {sub}")));
            assert!(pos(format!("Sub {sub}")) < pos(format!("TearDownSubTest {sub}")));
            assert!(pos(format!("TearDownSubTest {sub}")) < teardown);
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    value: u32,
    hits: AtomicUsize,
}

fn check_global(ctx: &mut Ctx<(), Shared>) {
    if ctx.global().value != 42 {
        ctx.error(format!("{} saw {}", ctx.name(), ctx.global().value));
    }
    if ctx.global_mut().is_some() {
        ctx.error("global data is shared with the suite");
    }
    ctx.global().hits.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn suite_setup_is_visible_everywhere() {
    let tracker = Tracker::default();
    let hits = tracker.clone();
    let mut suite = Suite::<(), Shared>::new("Global")
        .setup_suite(|ctx| {
            let global = ctx.global_mut().expect("exclusive during suite setup");
            global.value = 42;
        })
        .teardown_suite(move |ctx| {
            hits.record(format!("hits {}", ctx.global().hits.load(Ordering::SeqCst)));
        });

    for test in ["TestOne", "TestTwo"] {
        suite = suite.test(test, |ctx| {
            ctx.parallel();
            check_global(ctx);
            ctx.run("sub", check_global);
        });
    }

    let report = run_on(wide(), &suite, &SuiteConfig::new());
    assert!(report.passed(), "{:#?}", report.outcomes);
    assert_eq!(tracker.entries(), ["hits 4"]);
}

#[test]
fn private_data_is_isolated() {
    let suite = Suite::<Vec<String>, ()>::new("Private")
        .setup_test(|ctx| {
            let name = ctx.name().to_string();
            ctx.push(name);
        })
        .setup_sub_test(|ctx| {
            let name = ctx.name().to_string();
            ctx.push(name);
        })
        .test("TestOne", |ctx| {
            ctx.parallel();
            if ctx.data().as_slice() != ["Private/TestOne"] {
                ctx.error(format!("unexpected data {:?}", ctx.data()));
            }
            ctx.push("mutated".to_string());

            ctx.run("sub", |ctx| {
                if ctx.data().as_slice() != ["Private/TestOne/sub"] {
                    ctx.error(format!("unexpected data {:?}", ctx.data()));
                }
                let parent = ctx.parent().expect("sub-tests have a parent");
                assert_eq!(parent.name(), "Private/TestOne");
                assert_eq!(parent.data().as_slice(), ["Private/TestOne", "mutated"]);
                assert!(parent.parent().is_none());
            });

            ctx.run("late", |ctx| {
                ctx.parallel();
                let parent = ctx.parent().expect("sub-tests have a parent");
                assert_eq!(parent.data().as_slice(), ["Private/TestOne", "mutated"]);
            });
            ctx.push("after late started".to_string());
        })
        .test("TestTwo", |ctx| {
            ctx.parallel();
            if ctx.data().as_slice() != ["Private/TestTwo"] {
                ctx.error(format!("unexpected data {:?}", ctx.data()));
            }
            assert!(ctx.parent().is_none());
        });

    let report = run_on(wide(), &suite, &SuiteConfig::new());
    assert!(report.passed(), "{:#?}", report.outcomes);
}

const HOOKS: [&str; 10] = [
    "SetupSuite",
    "SetupTest",
    "BeforeTest",
    "Test",
    "SetupSubTest",
    "Sub",
    "TearDownSubTest",
    "AfterTest",
    "TearDownTest",
    "TearDownSuite",
];

/// A suite with two tests of one sub-test each, where `panic_in` panics for
/// `TestA` (or for the suite, if it is a suite hook).
fn lifecycle(tracker: &Tracker, panic_in: &'static str) -> Suite<(), ()> {
    fn hook(
        tracker: &Tracker,
        kind: &'static str,
        panic_in: &'static str,
    ) -> impl Fn(&mut Ctx<(), ()>) + Send + Sync + 'static {
        let tracker = tracker.clone();
        move |ctx| {
            tracker.record(format!("{kind} {}", ctx.name()));
            if kind == panic_in && (kind.ends_with("Suite") || ctx.name().contains("TestA")) {
                panic!("{kind} panicked");
            }
        }
    }

    fn named(
        tracker: &Tracker,
        kind: &'static str,
        panic_in: &'static str,
    ) -> impl Fn(&mut Ctx<(), ()>, &str, &str) + Send + Sync + 'static {
        let hook = hook(tracker, kind, panic_in);
        move |ctx, _, _| hook(ctx)
    }

    let mut suite = Suite::<(), ()>::new("Lifecycle")
        .setup_suite(hook(tracker, "SetupSuite", panic_in))
        .teardown_suite(hook(tracker, "TearDownSuite", panic_in))
        .setup_test(hook(tracker, "SetupTest", panic_in))
        .teardown_test(hook(tracker, "TearDownTest", panic_in))
        .setup_sub_test(hook(tracker, "SetupSubTest", panic_in))
        .teardown_sub_test(hook(tracker, "TearDownSubTest", panic_in))
        .before_test(named(tracker, "BeforeTest", panic_in))
        .after_test(named(tracker, "AfterTest", panic_in));

    for test in ["TestA", "TestB"] {
        let body = hook(tracker, "Test", panic_in);
        let sub = Arc::new(hook(tracker, "Sub", panic_in));
        suite = suite.test(test, move |ctx| {
            body(ctx);
            let sub = Arc::clone(&sub);
            ctx.run("sub", move |ctx| sub(ctx));
        });
    }
    suite
}

#[test]
fn a_panic_in_any_hook_fails_only_its_node() {
    for panic_in in HOOKS {
        let tracker = Tracker::default();
        let report = run_quiet(&lifecycle(&tracker, panic_in), &SuiteConfig::new());
        let has = |entry: &str| tracker.position(entry).is_some();

        assert!(!report.passed(), "{panic_in}: run must fail");
        assert_eq!(tracker.count("TearDownSuite"), 1, "{panic_in}");
        assert!(
            tracker.entries().last().unwrap().starts_with("TearDownSuite"),
            "{panic_in}: {:#?}",
            tracker.entries()
        );

        match panic_in {
            "SetupSuite" => {
                assert_eq!(tracker.count("SetupTest"), 0);
                assert!(report.outcome("Lifecycle/TestA").is_none());
                continue;
            }
            "TearDownSuite" => {
                assert!(report.outcome("Lifecycle/TestA").unwrap().passed());
                continue;
            }
            _ => {}
        }

        assert!(report.outcome("Lifecycle/TestA").unwrap().failed(), "{panic_in}");
        assert!(report.outcome("Lifecycle/TestB").unwrap().passed(), "{panic_in}");
        assert!(report.outcome("Lifecycle/TestB/sub").unwrap().passed(), "{panic_in}");
        assert!(has("TearDownTest Lifecycle/TestA"), "{panic_in}");
        assert!(has("TearDownTest Lifecycle/TestB"), "{panic_in}");
        assert!(has("TearDownSubTest Lifecycle/TestB/sub"), "{panic_in}");

        match panic_in {
            "SetupTest" => {
                assert!(!has("BeforeTest Lifecycle/TestA"));
                assert!(!has("Test Lifecycle/TestA"));
                assert!(!has("AfterTest Lifecycle/TestA"));
            }
            "BeforeTest" | "Test" => {
                assert!(!has("SetupSubTest Lifecycle/TestA/sub"));
                assert!(has("AfterTest Lifecycle/TestA"));
            }
            "SetupSubTest" => {
                assert!(!has("Sub Lifecycle/TestA/sub"));
                assert!(has("TearDownSubTest Lifecycle/TestA/sub"));
                assert!(has("AfterTest Lifecycle/TestA"));
                assert!(report.outcome("Lifecycle/TestA/sub").unwrap().failed());
            }
            "Sub" | "TearDownSubTest" => {
                assert!(has("AfterTest Lifecycle/TestA"));
                assert!(report.outcome("Lifecycle/TestA/sub").unwrap().failed());
            }
            _ => {}
        }

        let logs = &report.outcome("Lifecycle/TestA").unwrap().logs;
        let expected = format!("test panicked: {panic_in} panicked");
        let in_sub = matches!(panic_in, "SetupSubTest" | "Sub" | "TearDownSubTest");
        if !in_sub {
            assert!(logs[0].starts_with(&expected), "{panic_in}: {logs:?}");
        }
    }
}

#[test]
fn a_failing_suite_teardown_fails_the_run() {
    let tracker = Tracker::default();
    let report = run_quiet(&lifecycle(&tracker, "TearDownSuite"), &SuiteConfig::new());

    assert!(report.outcome("Lifecycle/TestA").unwrap().passed());
    let root = report.outcome("Lifecycle").unwrap();
    assert!(root.failed());
    assert!(root.logs[0].starts_with("test panicked: TearDownSuite panicked"));
}

#[test]
fn include_then_exclude_selects_tests() {
    let tracker = Tracker::default();
    let mut suite = Suite::<(), ()>::new("Filtered");
    for test in ["TestA1", "TestA2Skip", "TestB1"] {
        suite = suite.test(test, recording(&tracker, "Test"));
    }

    let config = SuiteConfig::new().with_include("^TestA").with_exclude("Skip$");
    let report = run_quiet(&suite, &config);
    assert!(report.passed());
    assert_eq!(tracker.entries(), ["Test Filtered/TestA1"]);
}

#[test]
fn config_from_args_drives_selection() {
    let tracker = Tracker::default();
    let mut suite = Suite::<(), ()>::new("Args");
    for test in ["TestFast", "TestSlow"] {
        suite = suite.test(test, recording(&tracker, "Test"));
    }

    let config = SuiteConfig::from_args(["--nocapture", "--suite.x=Slow"]).unwrap();
    let report = run_quiet(&suite, &config);
    assert!(report.passed());
    assert_eq!(tracker.entries(), ["Test Args/TestFast"]);
}

#[test]
fn empty_run_set_runs_no_hooks() {
    let tracker = Tracker::default();
    let suite = Suite::<(), ()>::new("Empty")
        .setup_suite(recording(&tracker, "SetupSuite"))
        .teardown_suite(recording(&tracker, "TearDownSuite"))
        .test("helper", recording(&tracker, "Test"))
        .test("TestFiltered", recording(&tracker, "Test"));

    let report = run_quiet(&suite, &SuiteConfig::new().with_include("Nothing"));
    assert!(report.passed());
    assert!(tracker.entries().is_empty());
    assert_eq!(report.outcome("Empty").unwrap().logs, ["warning: no tests to run"]);

    let suite = Suite::<(), ()>::new("NoTests").setup_suite(recording(&tracker, "SetupSuite"));
    let report = run_quiet(&suite, &SuiteConfig::new());
    assert!(report.passed());
    assert!(tracker.entries().is_empty());
}

#[test]
fn invalid_pattern_fails_before_any_hook() {
    let tracker = Tracker::default();
    let suite = Suite::<(), ()>::new("Invalid")
        .setup_suite(recording(&tracker, "SetupSuite"))
        .test("TestOne", recording(&tracker, "Test"));

    let config = SuiteConfig::new().with_include("(");
    let mut result = Ok(());
    let report = Engine::quiet().run(suite.name(), |t| result = suite.run(&t, &config));

    assert!(matches!(
        result,
        Err(ConfigError::InvalidPattern {
            which: PatternKind::Include,
            ..
        })
    ));
    assert!(!report.passed());
    assert!(tracker.entries().is_empty());
    let logs = &report.outcome("Invalid").unwrap().logs;
    assert!(logs[0].starts_with("Invalid: invalid include pattern `(`"));
}

#[test]
fn stats_cover_passing_and_panicking_tests() {
    let tracker = Tracker::default();
    let collected: Arc<Mutex<Option<(String, SuiteStats)>>> = Arc::default();
    let slot = Arc::clone(&collected);
    let stats_tracker = tracker.clone();
    let suite = Suite::<(), ()>::new("Stats")
        .teardown_suite(recording(&tracker, "TearDownSuite"))
        .handle_stats(move |_, suite_name, stats| {
            stats_tracker.record("HandleStats");
            *slot.lock().unwrap() = Some((suite_name.to_string(), stats.clone()));
        })
        .test("TestPass", |_| {})
        .test("TestPanic", |_| panic!("broken"));

    let report = run_quiet(&suite, &SuiteConfig::new());
    assert!(!report.passed());
    assert_eq!(tracker.entries(), ["TearDownSuite Stats", "HandleStats"]);

    let (suite_name, stats) = collected.lock().unwrap().take().unwrap();
    assert_eq!(suite_name, "Stats");
    assert!(!stats.passed());
    assert!(stats.start.is_some());
    assert!(stats.end >= stats.start);

    let pass = &stats.test_stats["TestPass"];
    assert!(pass.passed);
    assert!(pass.end.is_some_and(|end| end >= pass.start));
    let panic = &stats.test_stats["TestPanic"];
    assert!(!panic.passed);
    assert!(panic.end.is_some());
}

#[test]
fn a_panicking_stats_hook_fails_only_the_suite() {
    let tracker = Tracker::default();
    let stats_tracker = tracker.clone();
    let suite = Suite::<(), ()>::new("Stats")
        .teardown_suite(recording(&tracker, "TearDownSuite"))
        .handle_stats(move |_, _, _| {
            stats_tracker.record("HandleStats");
            panic!("stats boom");
        })
        .test("TestOne", |_| {});

    let report = run_quiet(&suite, &SuiteConfig::new());
    assert!(!report.passed());
    assert!(report.outcome("Stats/TestOne").unwrap().passed());

    let root = report.outcome("Stats").unwrap();
    assert!(root.failed());
    assert!(root.logs[0].starts_with("test panicked: stats boom"));
    assert_eq!(tracker.entries(), ["TearDownSuite Stats", "HandleStats"]);
}

fn fail_fast_suite(tracker: &Tracker) -> Suite<(), ()> {
    let (a, b) = (tracker.clone(), tracker.clone());
    let plain = |kind: &'static str| {
        let tracker = tracker.clone();
        move |_: &mut Ctx<(), ()>| tracker.record(kind)
    };
    Suite::<(), ()>::new("FailFast")
        .setup_suite(plain("SetupSuite"))
        .teardown_suite(plain("TearDownSuite"))
        .setup_test(plain("SetupTest"))
        .teardown_test(plain("TearDownTest"))
        .test("TestA", move |ctx| {
            a.record("Test A Fails");
            ctx.error("A fails");
        })
        .test("TestB", move |_| b.record("Test B Passes"))
}

#[test]
fn fail_fast_stops_after_first_failure() {
    let tracker = Tracker::default();
    let report = run_on(
        Engine::quiet().with_fail_fast(true),
        &fail_fast_suite(&tracker),
        &SuiteConfig::new(),
    );
    assert!(!report.passed());
    assert_eq!(
        tracker.entries(),
        ["SetupSuite", "SetupTest", "Test A Fails", "TearDownTest", "TearDownSuite"]
    );

    let tracker = Tracker::default();
    run_quiet(&fail_fast_suite(&tracker), &SuiteConfig::new());
    assert_eq!(
        tracker.entries(),
        [
            "SetupSuite",
            "SetupTest",
            "Test A Fails",
            "TearDownTest",
            "SetupTest",
            "Test B Passes",
            "TearDownTest",
            "TearDownSuite",
        ]
    );
}

#[test]
fn before_and_after_receive_names() {
    let tracker = Tracker::default();
    let (before, after) = (tracker.clone(), tracker.clone());
    let suite = Suite::<(), ()>::new("Named")
        .before_test(move |_, suite, test| before.record(format!("before {suite}.{test}")))
        .after_test(move |_, suite, test| after.record(format!("after {suite}.{test}")))
        .test("TestOne", recording(&tracker, "Test"));

    assert!(run_quiet(&suite, &SuiteConfig::new()).passed());
    assert_eq!(
        tracker.entries(),
        ["before Named.TestOne", "Test Named/TestOne", "after Named.TestOne"]
    );
}

#[test]
fn skipped_tests_still_tear_down() {
    let tracker = Tracker::default();
    let suite = Suite::<(), ()>::new("Skipping")
        .teardown_test(recording(&tracker, "TearDownTest"))
        .test("TestLater", |ctx| ctx.skip("not yet"));

    let report = run_quiet(&suite, &SuiteConfig::new());
    assert!(report.passed());
    let outcome = report.outcome("Skipping/TestLater").unwrap();
    assert!(outcome.skipped());
    assert_eq!(outcome.logs, ["not yet"]);
    assert_eq!(tracker.entries(), ["TearDownTest Skipping/TestLater"]);
}

#[test]
fn capabilities_reflect_registered_hooks() {
    let suite = Suite::<(), ()>::new("Caps")
        .setup_suite(|_| {})
        .after_test(|_, _, _| {})
        .handle_stats(|_, _, _| {});

    assert_eq!(
        suite.capabilities(),
        Capabilities {
            setup_suite: true,
            after_test: true,
            handle_stats: true,
            ..Capabilities::default()
        }
    );
    assert_eq!(Suite::<(), ()>::new("None").capabilities(), Capabilities::default());
}

#[test]
fn pretty_output_shows_failure_logs() {
    let buffer = Buffer::default();
    let suite = Suite::<(), ()>::new("Pretty")
        .test("TestFails", |ctx| ctx.error("broken"))
        .test("TestPasses", |ctx| ctx.log("quiet"));

    let report = Engine::quiet()
        .with_formatter(PrettyFormatter::default().with_target(buffer.clone()))
        .run(suite.name(), |t| {
            let _ = suite.run(&t, &SuiteConfig::new());
        });
    assert!(!report.passed());
    assert!(report.fmt_errors.is_empty());

    let output = buffer.try_to_string().unwrap();
    assert!(output.contains("=== RUN   Pretty/TestFails\n"));
    assert!(output.contains("    --- FAIL: Pretty/TestFails ("));
    assert!(output.contains("        broken\n"));
    assert!(output.contains("    --- PASS: Pretty/TestPasses ("));
    assert!(!output.contains("quiet"));
    assert!(output.contains("FAILED. 1 passed; 2 failed; 0 skipped"));
}
