//! End-to-end scenarios exercising the public `Stage`/`StageForeground`/
//! `chain` surface across real OS threads.

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use stagepipe::{chain, Stage, StageForeground, StageNode};

#[derive(Debug)]
struct Failed(usize);

impl fmt::Display for Failed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} intentionally failed", self.0)
    }
}

impl std::error::Error for Failed {}

fn ok(_: usize) -> Result<(), Infallible> {
    Ok(())
}

/// A three-stage chain with no failures transforms every index in order.
#[test]
fn simple_chain_transforms_every_index() {
    let n = 100;
    let data = Arc::new(Mutex::new(vec![0i64; n]));

    let a = {
        let data = Arc::clone(&data);
        Stage::new("A", 2, 8, move |i: usize| -> Result<(), Infallible> {
            data.lock().unwrap()[i] = i as i64 * 2;
            Ok(())
        })
        .unwrap()
    };
    let b = {
        let data = Arc::clone(&data);
        Stage::new("B", 2, 8, move |i: usize| -> Result<(), Infallible> {
            data.lock().unwrap()[i] += 1;
            Ok(())
        })
        .unwrap()
    };
    let c = Stage::new("C", 2, 8, ok).unwrap();

    chain(&a, Arc::clone(&b));
    chain(&b, Arc::clone(&c));

    a.set_task_count(n);
    b.set_task_count(n);
    c.set_task_count(n);

    for i in 0..n {
        a.push(i);
    }

    c.wait().expect("no task should fail in this scenario");

    let data = data.lock().unwrap();
    for i in 0..n {
        assert_eq!(data[i], 2 * i as i64 + 1);
    }
}

/// A single failure surfaces with the correct index, and every other
/// task still completes.
#[test]
fn single_failure_surfaces_and_others_complete() {
    let n = 10;
    let data = Arc::new(Mutex::new(vec![0i64; n]));

    let stage = {
        let data = Arc::clone(&data);
        Stage::new("TestStage", 2, 8, move |i: usize| -> Result<(), Failed> {
            if i == 5 {
                return Err(Failed(i));
            }
            data.lock().unwrap()[i] = i as i64 * 2;
            Ok(())
        })
        .unwrap()
    };
    stage.set_task_count(n);
    for i in 0..n {
        stage.push(i);
    }

    let err = stage.wait().expect_err("task 5 must fail");
    let entries = stage.pipeline().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].stage_name, "TestStage");
    assert_eq!(entries[0].index, 5);
    assert!(err.summary().contains("1 task(s) failed"));

    let data = data.lock().unwrap();
    for i in 0..n {
        if i == 5 {
            assert_eq!(data[i], 0);
        } else {
            assert_eq!(data[i], i as i64 * 2);
        }
    }
}

/// If every task fails, `wait()` still returns in bounded time.
#[test]
fn every_task_failing_does_not_deadlock() {
    let stage = Stage::new("AlwaysFail", 2, 8, |i: usize| -> Result<(), Failed> {
        Err(Failed(i))
    })
    .unwrap();
    stage.set_task_count(20);
    for i in 0..20 {
        stage.push(i);
    }

    let start = Instant::now();
    let err = stage.wait().expect_err("every task fails");
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(stage.pipeline().len(), 20);
    assert!(err.summary().contains("20 task(s) failed"));
}

/// Failures mid-chain don't break downstream counting; the shared
/// pipeline records both.
#[test]
fn failure_mid_chain_preserves_downstream_count() {
    let n = 10;
    let c_invocations = Arc::new(Mutex::new(Vec::new()));

    let a = Stage::new("A", 2, 8, ok).unwrap();
    let b = Stage::new("B", 2, 8, |i: usize| -> Result<(), Failed> {
        if i == 3 {
            return Err(Failed(i));
        }
        Ok(())
    })
    .unwrap();
    let c = {
        let c_invocations = Arc::clone(&c_invocations);
        Stage::new("C", 2, 8, move |i: usize| -> Result<(), Failed> {
            c_invocations.lock().unwrap().push(i);
            if i == 7 {
                return Err(Failed(i));
            }
            Ok(())
        })
        .unwrap()
    };

    chain(&a, Arc::clone(&b));
    chain(&b, Arc::clone(&c));

    a.set_task_count(n);
    b.set_task_count(n);
    c.set_task_count(n);

    let producer_a = Arc::clone(&a);
    let producer = thread::spawn(move || {
        for i in 0..n {
            producer_a.push(i);
        }
    });

    let err = c.wait().expect_err("stages B and C both fail once");
    producer.join().unwrap();

    assert_eq!(c.pipeline().len(), 2);
    assert!(err.summary().contains("2 task(s) failed"));
    let mut invoked = c_invocations.lock().unwrap().clone();
    invoked.sort_unstable();
    assert_eq!(invoked, (0..n).collect::<Vec<_>>());
}

/// Linking downstream-first still unifies the whole chain onto one
/// pipeline, by identity, once every link has been made.
#[test]
fn chain_order_independence() {
    let a = Stage::new("A", 2, 4, ok).unwrap();
    let b = Stage::new("B", 2, 4, ok).unwrap();
    let c = Stage::new("C", 2, 4, ok).unwrap();

    chain(&b, Arc::clone(&c));
    chain(&a, Arc::clone(&b));

    assert!(Arc::ptr_eq(&a.pipeline(), &b.pipeline()));
    assert!(Arc::ptr_eq(&b.pipeline(), &c.pipeline()));

    let n = 5;
    a.set_task_count(n);
    b.set_task_count(n);
    c.set_task_count(n);
    for i in 0..n {
        a.push(i);
    }
    c.wait().expect("clean run");
}

/// A background stage feeding a foreground stage runs the foreground
/// stage's worker on the calling thread.
#[test]
fn foreground_stage_runs_on_caller_thread() {
    let n = 8;
    let processed = Arc::new(Mutex::new(Vec::new()));

    let background = Stage::new("A", 2, 4, ok).unwrap();
    let foreground = {
        let processed = Arc::clone(&processed);
        StageForeground::new("G", 8, move |i: usize| -> Result<(), Infallible> {
            processed.lock().unwrap().push(i);
            Ok(())
        })
        .unwrap()
    };

    chain(&background, Arc::clone(&foreground));

    background.set_task_count(n);
    foreground.set_task_count(n);

    let producer = Arc::clone(&background);
    thread::spawn(move || {
        for i in 0..n {
            producer.push(i);
        }
    });

    foreground.run().expect("no failures in this scenario");

    let mut seen = processed.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..n).collect::<Vec<_>>());
}

/// Calling `wait()` twice on a drained stage is idempotent.
#[test]
fn wait_is_idempotent_after_drain() {
    let stage = Stage::new("Once", 1, 4, ok).unwrap();
    stage.set_task_count(3);
    for i in 0..3 {
        stage.push(i);
    }
    stage.wait().unwrap();
    stage.wait().unwrap();
}

/// Partial failure in one stage never drops indices reaching the next
/// stage.
#[test]
fn downstream_conservation_under_partial_failure() {
    let n = 10;
    let seen = Arc::new(Mutex::new(Vec::new()));

    let upstream = Stage::new("PartialFail", 2, 8, |i: usize| -> Result<(), Failed> {
        if i % 3 == 0 {
            return Err(Failed(i));
        }
        Ok(())
    })
    .unwrap();
    let downstream = {
        let seen = Arc::clone(&seen);
        Stage::new("Downstream", 2, 8, move |i: usize| -> Result<(), Infallible> {
            seen.lock().unwrap().push(i);
            Ok(())
        })
        .unwrap()
    };

    chain(&upstream, Arc::clone(&downstream));
    upstream.set_task_count(n);
    downstream.set_task_count(n);

    for i in 0..n {
        upstream.push(i);
    }

    let err = downstream.wait().expect_err("upstream failures propagate");
    assert_eq!(downstream.pipeline().len(), 4); // indices 0, 3, 6, 9
    assert!(err.summary().contains("4 task(s) failed"));

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..n).collect::<Vec<_>>());
}
