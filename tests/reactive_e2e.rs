use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use statewire::{
    Console, ConsoleLevel, ExecutorConfig, Lookup, MemoryConsole, Store, StoreConfig, StoreError,
    Value,
    CONFIG, REGISTRY,
};

fn store_with_console() -> (Store, Arc<MemoryConsole>) {
    let console = Arc::new(MemoryConsole::new());
    let store = Store::with_console(StoreConfig::default(), console.clone());
    (store, console)
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

#[test]
fn option_selection_fires_only_the_matching_handler() {
    let (store, console) = store_with_console();

    store.event().name("app-init").register(
        |s| s.config("config").is_truthy(),
        |s| {
            let mode = s.get_value(CONFIG, "config").map(|v| v.render()).unwrap_or_default();
            s.console().info(&format!("configuration: {mode}"));
        },
    );

    for mode in ["primary", "secondary"] {
        for option in ["1", "2"] {
            let message = format!("{mode}: option {option} selected");
            store.event().name(format!("{mode}-option-{option}")).register(
                move |s| {
                    s.config("config").eq_str(mode)
                        & s.registry("options.current").renders_as(option)
                },
                move |s| {
                    if option == "1" {
                        s.console().success(&message);
                    } else {
                        s.console().warning(&message);
                    }
                },
            );
        }
    }

    store.set(CONFIG, "config", "secondary").unwrap();
    assert_eq!(console.at(ConsoleLevel::Info), vec!["configuration: secondary".to_string()]);
    assert!(console.at(ConsoleLevel::Success).is_empty());

    store.set(REGISTRY, "options.current", "1").unwrap();
    assert_eq!(
        console.at(ConsoleLevel::Success),
        vec!["secondary: option 1 selected".to_string()]
    );

    store.set(REGISTRY, "test", "1").unwrap();
    console.print("test");

    assert_eq!(console.at(ConsoleLevel::Info).len(), 1);
    assert_eq!(console.at(ConsoleLevel::Success).len(), 1);
    assert!(console.at(ConsoleLevel::Warning).is_empty());
    assert_eq!(console.at(ConsoleLevel::Plain), vec!["test".to_string()]);
}

#[test]
fn handler_fires_once_after_both_roots_match() {
    let store = Store::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);

    let id = store.register(
        |s| s.config("value").eq_str("secondary") & s.registry("opt").eq_str("1"),
        move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        },
    );
    let deps: Vec<String> = store.events().dependencies(id).unwrap().into_iter().collect();
    assert_eq!(deps, vec![CONFIG.to_string(), REGISTRY.to_string()]);

    store.set(CONFIG, "value", "secondary").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    store.set(REGISTRY, "opt", "1").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    store.set(REGISTRY, "other", "1").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn set_then_get_returns_the_exact_value() {
    let store = Store::new();
    let values = [
        Value::Int(-4),
        Value::Float(2.5),
        Value::Bool(false),
        Value::String("text".into()),
        Value::List(vec![Value::Int(1), Value::Null]),
        Value::Structured(serde_json::json!({"nested": [1, 2]})),
        Value::Null,
    ];
    for (i, value) in values.into_iter().enumerate() {
        let path = format!("deep.level{i}.leaf");
        store.set(REGISTRY, &path, value.clone()).unwrap();
        assert_eq!(store.get(REGISTRY, &path), Lookup::Value(value));
    }
}

#[test]
fn type_conflict_leaves_first_write_in_place() {
    let store = Store::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    store.event().level_triggered().register(
        |s| s.registry("a").is_truthy(),
        move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        },
    );

    store.set(REGISTRY, "a.b", 1).unwrap();
    let err = store.set(REGISTRY, "a.b.c", 2).unwrap_err();
    assert!(matches!(err, StoreError::TypeConflict { ref at, .. } if at == "a.b"));
    assert_eq!(store.get(REGISTRY, "a.b"), Lookup::Value(Value::Int(1)));
    assert!(store.get(REGISTRY, "a.b.c").is_absent());
    // the failed write dispatched nothing
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_writers_on_one_root_all_land() {
    let store = Store::new();
    let writers = 8;
    let per_writer = 50;

    let observed_partial = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&observed_partial);
    store.event().level_triggered().register(
        |s| s.registry("workers").is_truthy(),
        move |s| {
            // every key written so far must hold a complete leaf
            for worker in s.keys(REGISTRY, "workers") {
                for key in s.keys(REGISTRY, &format!("workers.{worker}")) {
                    let lookup = s.get(REGISTRY, &format!("workers.{worker}.{key}"));
                    if lookup.value().is_none() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        },
    );

    let threads: Vec<_> = (0..writers)
        .map(|w| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..per_writer {
                    store.set(REGISTRY, &format!("workers.w{w}.k{i}"), i64::try_from(i).unwrap()).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(store.keys(REGISTRY, "workers").len(), writers);
    for w in 0..writers {
        assert_eq!(store.keys(REGISTRY, &format!("workers.w{w}")).len(), per_writer);
    }
    assert_eq!(observed_partial.load(Ordering::SeqCst), 0);
    assert_eq!(store.stats().passes, (writers * per_writer) as u64);
}

#[test]
fn mutation_and_dispatch_are_atomic_per_root() {
    let store = Store::new();
    let violations = Arc::new(AtomicUsize::new(0));
    let v = Arc::clone(&violations);

    // The action reads the counter it was triggered by; no other writer may
    // slip in between the write and the end of the pass.
    store.event().level_triggered().register(
        |s| s.registry("counter").is_truthy(),
        move |s| {
            let before = s.get_value(REGISTRY, "counter");
            thread::sleep(Duration::from_millis(1));
            if s.get_value(REGISTRY, "counter") != before {
                v.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 1..=20 {
                    store.set(REGISTRY, "counter", t * 100 + i).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);
}

#[test]
fn deferred_action_runs_off_the_mutating_thread() {
    let store = Store::with_config(StoreConfig::default().with_executor(ExecutorConfig {
        workers: 2,
        ..ExecutorConfig::default()
    }));
    let caller = thread::current().id();
    let ran_elsewhere = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&ran_elsewhere);

    let id = store.register_deferred(
        |s| s.config("mode").eq_str("slow"),
        move |s| {
            thread::sleep(Duration::from_millis(150));
            if thread::current().id() != caller {
                r.fetch_add(1, Ordering::SeqCst);
            }
            s.set(REGISTRY, "slow.done", true)
        },
    );

    let started = Instant::now();
    store.set(CONFIG, "mode", "slow").unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    // the transition is recorded synchronously
    assert_eq!(store.events().is_armed(id), Some(true));

    assert!(wait_until(Duration::from_secs(3), || store
        .get(REGISTRY, "slow.done")
        .equals(true)));
    assert_eq!(ran_elsewhere.load(Ordering::SeqCst), 1);
}

#[test]
fn deferred_action_failures_reach_the_console() {
    let (store, console) = store_with_console();
    store
        .event()
        .name("fragile")
        .deferred()
        .register(|s| s.registry("go").is_truthy(), |_| -> Result<(), statewire::ActionError> {
            Err(statewire::ActionError::failed("disk on fire"))
        });

    store.set(REGISTRY, "go", true).unwrap();
    assert!(wait_until(Duration::from_secs(3), || !console
        .at(ConsoleLevel::Error)
        .is_empty()));
    let errors = console.at(ConsoleLevel::Error);
    assert!(errors[0].contains("fragile"));
    assert!(errors[0].contains("disk on fire"));
    assert!(wait_until(Duration::from_secs(1), || store.stats().action_errors == 1));
}

#[test]
fn condition_errors_are_reported_not_propagated() {
    let (store, console) = store_with_console();
    store.register(
        |s| -> Result<bool, statewire::ConditionError> { Ok(s.int(REGISTRY, "limit")? > 3) },
        |_| {},
    );

    assert!(store.set(REGISTRY, "limit", "high").is_ok());
    let warnings = console.at(ConsoleLevel::Warning);
    assert_eq!(warnings.len(), 2);
    assert!(warnings[1].contains("expected int"));
}

#[test]
fn remove_dispatches_and_rearms() {
    let store = Store::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let id = store.register(|s| !s.registry("lock").is_absent(), move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    store.set(REGISTRY, "lock", "held").unwrap();
    assert_eq!(store.events().is_armed(id), Some(true));
    assert!(store.remove(REGISTRY, "lock").unwrap());
    assert_eq!(store.events().is_armed(id), Some(false));
    store.set(REGISTRY, "lock", "held").unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn separate_stores_are_isolated() {
    let a = Store::new();
    let b = Store::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    a.register(|s| s.registry("x").is_truthy(), move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    b.set(REGISTRY, "x", 1).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(a.get(REGISTRY, "x").is_absent());
    a.set(REGISTRY, "x", 1).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn saturated_pool_rejects_deferred_actions_and_reports_them() {
    let console = Arc::new(MemoryConsole::new());
    let store = Store::with_console(
        StoreConfig::default().with_executor(ExecutorConfig {
            workers: 1,
            queue_capacity: 1,
            ..ExecutorConfig::default()
        }),
        console.clone(),
    );

    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(4);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    store
        .event()
        .name("slow-consumer")
        .deferred()
        .level_triggered()
        .register(|s| s.registry("go").is_truthy(), move |_| {
            let _ = started_tx.send(());
            let _ = gate_rx.recv();
        });

    // first firing occupies the only worker
    store.set(REGISTRY, "go", 1).unwrap();
    started_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    // second fills the queue, third is rejected
    store.set(REGISTRY, "go", 2).unwrap();
    store.set(REGISTRY, "go", 3).unwrap();

    let stats = store.stats();
    assert_eq!(stats.fired, 3);
    assert_eq!(stats.deferred_rejected, 1);
    let errors = console.at(ConsoleLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("slow-consumer"));
    assert!(errors[0].contains("deferred action rejected"));
    assert!(errors[0].contains("capacity 1"));

    gate_tx.send(()).unwrap();
    started_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    gate_tx.send(()).unwrap();
}

#[test]
fn concurrent_passes_on_two_roots_keep_transitions_consistent() {
    let store = Store::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let id = store.register(
        |s| s.config("on").equals(true) & s.registry("on").equals(true),
        move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        },
    );

    let rounds = 200;
    let togglers: Vec<_> = [CONFIG, REGISTRY]
        .into_iter()
        .map(|root| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..rounds {
                    store.set(root, "on", i % 2 == 0).unwrap();
                }
                // both threads finish on false
                store.set(root, "on", false).unwrap();
            })
        })
        .collect();
    for t in togglers {
        t.join().unwrap();
    }

    // The last evaluation saw both final writes.
    assert_eq!(store.events().is_armed(id), Some(false));
    let fired = hits.load(Ordering::SeqCst);
    assert_eq!(store.stats().fired, fired as u64);
    assert!(fired <= rounds);

    store.set(CONFIG, "on", true).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), fired);
    store.set(REGISTRY, "on", true).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), fired + 1);
    assert_eq!(store.events().is_armed(id), Some(true));
}
