use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

#[derive(Default)]
struct RecordingSource {
    tokens: Mutex<Vec<VsyncToken>>,
}

impl VsyncSource for RecordingSource {
    fn request_vsync(&self, token: VsyncToken) {
        self.tokens.lock().unwrap().push(token);
    }
}

fn setup() -> (Arc<VsyncRegistry>, Arc<RecordingSource>, VsyncWaiter) {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());
    let waiter = VsyncWaiter::new(Arc::clone(&registry), source.clone());
    (registry, source, waiter)
}

#[test]
fn second_await_while_pending_is_contract_violation() {
    let (_registry, source, waiter) = setup();
    waiter.await_vsync(|_| {}).unwrap();
    let err = waiter.await_vsync(|_| {}).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(source.tokens.lock().unwrap().len(), 1);
    assert_eq!(waiter.phase(), WaiterPhase::Awaiting);
}

#[test]
fn fire_runs_completion_once_with_timing() {
    let (registry, source, waiter) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let token = waiter
        .await_vsync(move |t| sink.lock().unwrap().push(t))
        .unwrap();
    assert_eq!(source.tokens.lock().unwrap()[0], token);

    assert!(registry.on_vsync(token, 100, 116));
    assert!(!registry.on_vsync(token, 100, 116));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![FrameTiming::new(100, 116).unwrap()]
    );
    assert_eq!(waiter.phase(), WaiterPhase::Idle);

    let next = waiter.await_vsync(|_| {}).unwrap();
    assert!(next.seq() > token.seq());
    assert!(!registry.on_vsync(token, 200, 216));
    assert!(registry.on_vsync(next, 200, 216));
}

#[test]
fn cancel_makes_token_stale() {
    let (registry, _source, waiter) = setup();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    let token = waiter
        .await_vsync(move |_| flag.store(true, Ordering::SeqCst))
        .unwrap();

    assert!(waiter.cancel());
    assert!(!waiter.cancel());
    assert!(!registry.on_vsync(token, 0, 16));
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn await_from_inside_completion_is_contract_violation() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());
    let waiter = Arc::new(VsyncWaiter::new(Arc::clone(&registry), source.clone()));

    let inner = Arc::clone(&waiter);
    let result = Arc::new(Mutex::new(None));
    let out = Arc::clone(&result);
    let token = waiter
        .await_vsync(move |_| {
            *out.lock().unwrap() = Some(inner.await_vsync(|_| {}).map(|_| ()));
        })
        .unwrap();

    assert!(registry.on_vsync(token, 0, 16));
    let nested = result.lock().unwrap().take().unwrap();
    assert!(nested.unwrap_err().is_contract_violation());
    assert_eq!(waiter.phase(), WaiterPhase::Idle);
}

#[test]
fn await_from_other_thread_waits_for_running_fire() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());
    let waiter = Arc::new(VsyncWaiter::new(Arc::clone(&registry), source.clone()));

    let (entered_tx, entered_rx) = crossbeam_channel::bounded::<()>(0);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let finished = Arc::new(AtomicBool::new(false));
    let done = Arc::clone(&finished);
    let token = waiter
        .await_vsync(move |_| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            done.store(true, Ordering::SeqCst);
        })
        .unwrap();

    let host = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || registry.on_vsync(token, 0, 16))
    };
    entered_rx.recv().unwrap();
    assert_eq!(waiter.phase(), WaiterPhase::Firing);

    let rearmed = Arc::new(AtomicUsize::new(0));
    let render = {
        let waiter = Arc::clone(&waiter);
        let finished = Arc::clone(&finished);
        let rearmed = Arc::clone(&rearmed);
        std::thread::spawn(move || {
            waiter.await_vsync(|_| {}).unwrap();
            assert!(finished.load(Ordering::SeqCst));
            rearmed.fetch_add(1, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(rearmed.load(Ordering::SeqCst), 0);
    release_tx.send(()).unwrap();

    assert!(host.join().unwrap());
    render.join().unwrap();
    assert_eq!(rearmed.load(Ordering::SeqCst), 1);
    assert!(waiter.is_awaiting());
}
