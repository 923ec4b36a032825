//! View recreation integration tests
//!
//! Drives a host through several view lifetimes using only the public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use loopview::runtime::{MockLoop, NoEffects, Next, ReducerLoopFactory, identity_init};
use loopview::{HostState, LoopHost, LoopViewError, QueuedRunner, SignalSender, ViewBinding, WorkRunner};

type Host = LoopHost<u32, &'static str, String>;
type Mock = MockLoop<u32, &'static str, ()>;

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: T| sink.lock().unwrap().push(value))
}

fn mock_host(mock: &Mock, runner: Arc<dyn WorkRunner>, max_queued: usize) -> (Host, SignalSender<String>) {
    let factory = mock.factory();
    let captured = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&captured);
    let host = LoopHost::with_runner(
        move |signals| {
            *slot.lock().unwrap() = Some(signals);
            factory
        },
        0,
        identity_init,
        runner,
        max_queued,
    )
    .unwrap();
    let sender = captured.lock().unwrap().take().unwrap();
    (host, sender)
}

/// A new view gets the latest model and the signals its predecessor missed.
#[test]
fn test_state_survives_view_recreation() {
    let mock: Mock = MockLoop::new();
    let runner = Arc::new(QueuedRunner::new());
    let (host, sender) = mock_host(&mock, runner.clone(), 10);

    let (first_models, on_model) = recorder::<u32>();
    let (first_signals, on_signal) = recorder::<String>();
    let mut first = ViewBinding::for_host(&host, on_model, on_signal);
    first.on_resume();

    mock.emit(1);
    sender.send("hello".to_string()).unwrap();
    runner.run_pending();
    assert_eq!(*first_models.lock().unwrap(), vec![1]);
    assert_eq!(*first_signals.lock().unwrap(), vec!["hello".to_string()]);

    first.on_pause();
    mock.emit(2);
    sender.send("missed".to_string()).unwrap();
    runner.run_pending();
    first.on_destroy();
    drop(first);

    let (second_models, on_model) = recorder::<u32>();
    let (second_signals, on_signal) = recorder::<String>();
    let mut second = ViewBinding::for_host(&host, on_model, on_signal);
    second.on_resume();
    runner.run_pending();

    assert_eq!(*second_models.lock().unwrap(), vec![2]);
    assert_eq!(*second_signals.lock().unwrap(), vec!["missed".to_string()]);
    assert_eq!(host.signals().queued(), 0);
}

/// Signals beyond capacity are reported to the sender and never delivered.
#[test]
fn test_overflow_while_hidden() {
    let mock: Mock = MockLoop::new();
    let runner = Arc::new(QueuedRunner::new());
    let (host, sender) = mock_host(&mock, runner.clone(), 2);

    sender.send("a".to_string()).unwrap();
    sender.send("b".to_string()).unwrap();
    let err = sender.send("c".to_string()).unwrap_err();
    assert!(matches!(err, LoopViewError::QueueOverflow { capacity: 2 }));

    let (batches, on_backlog) = recorder::<Vec<String>>();
    let (live, on_signal) = recorder::<String>();
    let mut view = ViewBinding::for_host(&host, |_model: u32| {}, on_signal).with_backlog(on_backlog);
    view.on_resume();
    // the undelivered backlog still fills the buffer
    assert!(sender.send("early".to_string()).unwrap_err().is_overflow());
    runner.run_pending();
    sender.send("d".to_string()).unwrap();
    runner.run_pending();

    assert_eq!(*batches.lock().unwrap(), vec![vec!["a".to_string(), "b".to_string()]]);
    assert_eq!(*live.lock().unwrap(), vec!["d".to_string()]);
}

/// Tearing the host down stops events, models and signals.
#[test]
fn test_dispose_quiets_everything() {
    let mock: Mock = MockLoop::new();
    let runner = Arc::new(QueuedRunner::new());
    let (host, sender) = mock_host(&mock, runner.clone(), 4);

    let (models, on_model) = recorder::<u32>();
    let (signals, on_signal) = recorder::<String>();
    let mut view = ViewBinding::for_host(&host, on_model, on_signal);
    view.on_resume();
    mock.emit(1);
    runner.run_pending();

    host.dispatch("before");
    host.dispose();
    host.dispatch("after");
    mock.emit(9);
    sender.send("late".to_string()).unwrap();
    runner.run_pending();

    assert_eq!(mock.events(), vec!["before"]);
    assert_eq!(*models.lock().unwrap(), vec![1]);
    assert!(signals.lock().unwrap().is_empty());
    assert_eq!(host.state(), HostState::Disposed);
    assert_eq!(host.model(), 1);
}

/// The reducer loop processes events in order and the host publishes the result.
#[tokio::test]
async fn test_reducer_loop_behind_host() {
    let host: LoopHost<u32, u32, ()> = LoopHost::new(
        |_signals| ReducerLoopFactory::new(|model: &u32, step: u32| Next::<u32, ()>::next(model + step), NoEffects),
        0,
        identity_init,
    )
    .unwrap();

    let (seen, on_model) = recorder::<u32>();
    host.models().observe(on_model);
    for step in 1..=4 {
        host.dispatch(step);
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(host.model(), 10);
    assert_eq!(seen.lock().unwrap().last(), Some(&10));

    host.dispose();
    host.dispatch(100);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(host.model(), 10);
}
