use std::{
    collections::BTreeMap,
    env,
    num::NonZeroUsize,
    process::ExitCode,
    thread,
    time::Duration,
};

use kisuite::{Engine, Suite, SuiteConfig, formatter::pretty::PrettyFormatter};
use parking_lot::Mutex;

/// Stand-in for a database shared by every test.
#[derive(Debug, Default)]
struct Store {
    rows: Mutex<BTreeMap<String, u32>>,
}

/// Rows a test created, removed again on teardown.
#[derive(Debug, Default, Clone)]
struct Owned {
    keys: Vec<String>,
}

fn suite() -> Suite<Owned, Store> {
    let mut suite = Suite::<Owned, Store>::new("Store")
        .setup_suite(|ctx| {
            if let Some(store) = ctx.global_mut() {
                store.rows.get_mut().insert("seed".to_string(), 0);
            }
            ctx.log("seeded store");
        })
        .teardown_test(|ctx| {
            let mut rows = ctx.global().rows.lock();
            for key in ctx.keys.iter() {
                rows.remove(key);
            }
        })
        .teardown_suite(|ctx| {
            let rows = ctx.global().rows.lock();
            if rows.len() != 1 {
                ctx.error(format!("left over rows: {:?}", rows.keys()));
            }
        })
        .handle_stats(|ctx, suite, stats| {
            for (name, test) in stats.test_stats.iter() {
                ctx.log(format!("{suite}.{name}: passed={}", test.passed));
            }
        });

    for idx in 0..4 {
        suite = suite.test(format!("TestInsert{idx}"), move |ctx| {
            ctx.parallel();
            let key = format!("row{idx}");
            ctx.global().rows.lock().insert(key.clone(), idx);
            ctx.keys.push(key.clone());

            ctx.run("read_back", move |ctx| {
                ctx.parallel();
                thread::sleep(Duration::from_millis(20));
                if ctx.global().rows.lock().get(&key) != Some(&idx) {
                    ctx.error(format!("{key} is missing"));
                }
            });
        });
    }

    suite.test("TestNotYet", |ctx| ctx.skip("needs a real database"))
}

fn main() -> ExitCode {
    let config = match SuiteConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let suite = suite();
    Engine::default()
        .with_parallelism(NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN))
        .with_formatter(PrettyFormatter::default().with_verbose(true))
        .run(suite.name(), |t| {
            let _ = suite.run(&t, &config);
        })
        .exit_code()
}
