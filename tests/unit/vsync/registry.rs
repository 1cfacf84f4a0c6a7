use std::sync::atomic::{AtomicUsize, Ordering};

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

fn last_token(source: &RecordingSource) -> VsyncToken {
    *source.tokens.lock().unwrap().last().unwrap()
}

#[test]
fn frame_timing_rejects_target_before_start() {
    assert!(FrameTiming::new(10, 5).is_err());
    let t = FrameTiming::new(1_000, 17_667).unwrap();
    assert_eq!(t.budget_nanos(), 16_667);
}

#[test]
fn dropped_waiter_releases_its_slot_and_ignores_late_fires() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());
    let fired = Arc::new(AtomicUsize::new(0));

    let waiter = VsyncWaiter::new(Arc::clone(&registry), source.clone());
    assert_eq!(registry.len(), 1);
    let hits = Arc::clone(&fired);
    waiter
        .await_vsync(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let token = last_token(&source);

    drop(waiter);
    assert!(registry.is_empty());
    assert!(!registry.on_vsync(token, 0, 16));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn reused_slot_does_not_match_old_tokens() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());

    let old = VsyncWaiter::new(Arc::clone(&registry), source.clone());
    old.await_vsync(|_| {}).unwrap();
    let old_token = last_token(&source);
    drop(old);

    let fresh = VsyncWaiter::new(Arc::clone(&registry), source.clone());
    fresh.await_vsync(|_| {}).unwrap();

    assert!(!registry.on_vsync(old_token, 0, 16));
    assert!(fresh.is_awaiting());
    assert!(registry.on_vsync(last_token(&source), 0, 16));
    assert!(!fresh.is_awaiting());
}

#[test]
fn invalid_timing_leaves_wait_pending() {
    let registry = VsyncRegistry::new();
    let source = Arc::new(RecordingSource::default());
    let waiter = VsyncWaiter::new(Arc::clone(&registry), source.clone());
    waiter.await_vsync(|_| {}).unwrap();
    let token = last_token(&source);

    assert!(!registry.on_vsync(token, 20, 10));
    assert!(waiter.is_awaiting());
    assert!(registry.on_vsync(token, 10, 20));
}
