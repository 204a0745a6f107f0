use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, error};

use super::runner::Scheduler;
use crate::unwind;

/// Callable deferred onto the interactive thread.
pub type IdleCallback = Box<dyn FnOnce()>;

/// The one primitive the matcher needs from its host: "run this soon, on the
/// interactive thread". A GUI toolkit would map it to its idle hook.
pub trait HostLoop {
    fn idle_add(&self, callback: IdleCallback);
}

/// Minimal host loop: a queue of deferred callables plus a root scheduler.
///
/// Each [`iterate`](MainLoop::iterate) is one tick: it runs the callables that
/// were queued before the tick started, then one scheduler step.
pub struct MainLoop {
    scheduler: Scheduler,
    idle: RefCell<VecDeque<IdleCallback>>,
    ticks: Cell<u64>,
}

impl MainLoop {
    pub fn new(scheduler: Scheduler) -> Rc<Self> {
        Rc::new(Self {
            scheduler,
            idle: RefCell::new(VecDeque::new()),
            ticks: Cell::new(0),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run one tick. Returns whether more work is pending.
    pub fn iterate(&self) -> bool {
        self.ticks.set(self.ticks.get() + 1);

        let batch: Vec<IdleCallback> = self.idle.borrow_mut().drain(..).collect();
        for callback in batch {
            if let Err(msg) = unwind::catch(callback) {
                error!("Idle callback panicked: {}", msg);
            }
        }

        self.scheduler.run_one_step();
        self.has_pending()
    }

    /// Tick until nothing is pending or `max_ticks` ticks have run.
    ///
    /// Returns the number of ticks run by this call.
    pub fn run_until_idle(&self, max_ticks: Option<u64>) -> u64 {
        let mut ran = 0;
        while self.has_pending() {
            if max_ticks.is_some_and(|max| ran >= max) {
                debug!(ticks = ran, "Main loop stopped at tick limit with work pending");
                break;
            }
            self.iterate();
            ran += 1;
        }
        ran
    }

    pub fn has_pending(&self) -> bool {
        !self.idle.borrow().is_empty() || self.scheduler.has_pending()
    }

    /// Total ticks run since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

impl HostLoop for MainLoop {
    fn idle_add(&self, callback: IdleCallback) {
        self.idle.borrow_mut().push_back(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::{fn_task, Step};

    #[test]
    fn idle_callbacks_run_on_next_tick() {
        let main_loop = MainLoop::new(Scheduler::fifo());
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        main_loop.idle_add(Box::new(move || h.set(h.get() + 1)));

        assert_eq!(hits.get(), 0);
        assert!(main_loop.has_pending());
        assert!(!main_loop.iterate());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn callbacks_queued_during_tick_wait_for_next_tick() {
        let main_loop = MainLoop::new(Scheduler::fifo());
        let order = Rc::new(RefCell::new(Vec::new()));
        let (ml, o) = (Rc::clone(&main_loop), Rc::clone(&order));
        main_loop.idle_add(Box::new(move || {
            o.borrow_mut().push("first");
            let o2 = Rc::clone(&o);
            ml.idle_add(Box::new(move || o2.borrow_mut().push("second")));
        }));

        main_loop.iterate();
        assert_eq!(*order.borrow(), vec!["first"]);
        main_loop.iterate();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn drives_scheduler_one_step_per_tick() {
        let main_loop = MainLoop::new(Scheduler::fifo());
        let steps = Rc::new(Cell::new(0));
        let s = Rc::clone(&steps);
        main_loop.scheduler().add_task(fn_task("three", move || {
            s.set(s.get() + 1);
            Ok(Step::from(s.get() < 3))
        }));

        assert_eq!(main_loop.run_until_idle(None), 3);
        assert_eq!(steps.get(), 3);
        assert_eq!(main_loop.ticks(), 3);
    }

    #[test]
    fn tick_limit_is_respected() {
        let main_loop = MainLoop::new(Scheduler::fifo());
        main_loop
            .scheduler()
            .add_task(fn_task("forever", || Ok(Step::Continue)));
        assert_eq!(main_loop.run_until_idle(Some(5)), 5);
        assert!(main_loop.has_pending());
    }

    #[test]
    fn panicking_callback_does_not_stop_the_loop() {
        let main_loop = MainLoop::new(Scheduler::fifo());
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        main_loop.idle_add(Box::new(|| panic!("bad callback")));
        main_loop.idle_add(Box::new(move || r.set(true)));
        main_loop.iterate();
        assert!(ran.get());
    }
}
