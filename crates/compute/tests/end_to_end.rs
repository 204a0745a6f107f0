//! End-to-end tests: coordinator, worker threads and main loop together.
//!
//! Every test drives a real `MainLoop` with real worker threads, bounded by
//! a tick limit so a lost result fails the test instead of hanging it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use mergeline_compute::{
    InlineMatcher, MainLoop, MatchCoordinator, MatchError, Scheduler, SequenceMatcher,
};
use mergeline_core::{reconstruct, EditOp, EditScript, MatcherConfig};

const MAX_TICKS: u64 = 400;

type Delivered = Rc<RefCell<Vec<Vec<EditOp>>>>;

/// Matcher that refuses one marker input and otherwise defers to the inline matcher.
struct FlakyMatcher;

impl SequenceMatcher for FlakyMatcher {
    fn name(&self) -> &str {
        "flaky"
    }

    fn edits(&self, text_a: &str, text_b: &str) -> Result<EditScript, MatchError> {
        if text_a == "broken" {
            return Err(MatchError::Failed("refusing marker input".into()));
        }
        InlineMatcher::new().edits(text_a, text_b)
    }
}

fn test_config(workers: usize) -> MatcherConfig {
    MatcherConfig {
        worker_threads: workers,
        poll_timeout_ms: 50,
        shutdown_grace_ms: 200,
        ..MatcherConfig::default()
    }
}

fn setup_with(matcher: Arc<dyn SequenceMatcher>, workers: usize) -> (Rc<MainLoop>, MatchCoordinator) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let main_loop = MainLoop::new(Scheduler::fifo());
    let coordinator = MatchCoordinator::new(
        main_loop.scheduler().clone(),
        &*main_loop,
        matcher,
        test_config(workers),
    );
    (main_loop, coordinator)
}

fn setup() -> (Rc<MainLoop>, MatchCoordinator) {
    setup_with(Arc::new(InlineMatcher::new()), 1)
}

/// Callback that records every delivery into `sink`.
fn recorder(sink: &Delivered) -> impl FnOnce(Rc<[EditOp]>) + 'static {
    let sink = Rc::clone(sink);
    move |edits: Rc<[EditOp]>| sink.borrow_mut().push(edits.to_vec())
}

#[test]
fn single_match_round_trip() {
    let (main_loop, coordinator) = setup();
    let delivered: Delivered = Rc::default();

    coordinator.match_texts("abc", "abd", recorder(&delivered)).unwrap();
    assert_eq!(coordinator.pending_jobs(), vec![1]);
    assert!(delivered.borrow().is_empty());

    let ticks = main_loop.run_until_idle(Some(MAX_TICKS));
    assert!(ticks < MAX_TICKS, "match never completed");

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 1);
    let rebuilt = reconstruct("abc", "abd", &delivered[0]).expect("edits cover both inputs");
    assert_eq!(rebuilt, ("abc".to_string(), "abd".to_string()));
}

#[test]
fn second_match_is_served_from_cache() {
    let (main_loop, coordinator) = setup();
    let first: Delivered = Rc::default();
    let second: Delivered = Rc::default();

    coordinator.match_texts("abc", "abd", recorder(&first)).unwrap();
    main_loop.run_until_idle(Some(MAX_TICKS));

    coordinator.match_texts("abc", "abd", recorder(&second)).unwrap();
    assert!(!coordinator.has_pending(), "cache hit must not create a job");
    main_loop.run_until_idle(Some(MAX_TICKS));

    let metrics = coordinator.metrics();
    assert_eq!(metrics.jobs_submitted, 1);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.results_drained, 1);
    assert_eq!(*first.borrow(), *second.borrow());
}

#[test]
fn concurrent_requests_for_same_texts_share_a_job() {
    let (main_loop, coordinator) = setup();
    let delivered: Delivered = Rc::default();

    coordinator.match_texts("kitten", "sitting", recorder(&delivered)).unwrap();
    coordinator.match_texts("kitten", "sitting", recorder(&delivered)).unwrap();
    assert_eq!(coordinator.pending_jobs(), vec![1]);

    main_loop.run_until_idle(Some(MAX_TICKS));
    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], delivered[1]);
    assert_eq!(coordinator.metrics().jobs_submitted, 1);
}

#[test]
fn many_requests_across_workers_each_fire_once() {
    let (main_loop, coordinator) = setup_with(Arc::new(InlineMatcher::new()), 3);
    let fired = Rc::new(Cell::new(0u32));

    for i in 0..20 {
        let f = Rc::clone(&fired);
        let (a, b) = (format!("left line {i}"), format!("right line {i}"));
        coordinator
            .match_texts(&a, &b, move |_| f.set(f.get() + 1))
            .unwrap();
    }

    main_loop.run_until_idle(Some(MAX_TICKS));
    assert_eq!(fired.get(), 20);
    assert!(!coordinator.has_pending());
}

#[test]
fn stop_behaves_like_fresh_instance() {
    let (main_loop, coordinator) = setup();
    coordinator.match_texts("abc", "abd", |_| {}).unwrap();
    main_loop.run_until_idle(Some(MAX_TICKS));
    coordinator.match_texts("old", "pending", |_| {}).unwrap();
    assert_eq!(coordinator.pending_jobs(), vec![2]);

    coordinator.stop();
    let metrics = coordinator.metrics();
    assert_eq!(metrics.cache_entries, 0);
    assert_eq!(metrics.pending_jobs, 0);

    // Previously cached texts are matched again, with job ids starting over.
    let delivered: Delivered = Rc::default();
    coordinator.match_texts("abc", "abd", recorder(&delivered)).unwrap();
    assert_eq!(coordinator.pending_jobs(), vec![1]);

    main_loop.run_until_idle(Some(MAX_TICKS));
    assert_eq!(delivered.borrow().len(), 1);
}

#[test]
fn failed_job_is_never_answered() {
    let (main_loop, coordinator) = setup_with(Arc::new(FlakyMatcher), 1);
    let good: Delivered = Rc::default();
    let bad: Delivered = Rc::default();

    coordinator.match_texts("broken", "input", recorder(&bad)).unwrap();
    coordinator.match_texts("fine", "input", recorder(&good)).unwrap();

    // The failed request stays pending, so the loop only stops at the limit.
    let ticks = main_loop.run_until_idle(Some(40));
    assert_eq!(ticks, 40);
    assert_eq!(good.borrow().len(), 1);
    assert!(bad.borrow().is_empty());
    assert_eq!(coordinator.pending_jobs(), vec![1]);

    coordinator.stop();
    assert!(!main_loop.has_pending());
}

#[test]
fn cache_hit_is_not_held_up_by_pending_job() {
    let (main_loop, coordinator) = setup_with(Arc::new(FlakyMatcher), 1);
    coordinator.match_texts("fine", "input", |_| {}).unwrap();
    main_loop.run_until_idle(Some(MAX_TICKS));

    // This job fails in the worker, so the drain task keeps running.
    coordinator.match_texts("broken", "input", |_| {}).unwrap();
    let hit: Delivered = Rc::default();
    coordinator.match_texts("fine", "input", recorder(&hit)).unwrap();

    for _ in 0..3 {
        main_loop.iterate();
    }
    assert_eq!(hit.borrow().len(), 1);
    assert_eq!(coordinator.metrics().cache_hits, 1);
    assert!(coordinator.has_pending());

    coordinator.stop();
}
