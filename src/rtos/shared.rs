//! Interrupt-safe access to a scheduler shared with the tick ISR
//!
//! Every operation runs inside `critical_section::with`, so foreground code
//! can never observe or leave a half-updated heap while the tick interrupt is
//! pending. The section is released on every exit path, including early
//! returns on a full queue or an unknown handle.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::Error;
use crate::time::{Instant, Ticks};

use super::scheduler::{Callback, Scheduler, TickSource, TimerId};

pub struct SharedScheduler<C, const N: usize> {
    inner: Mutex<RefCell<Scheduler<C, N>>>,
}

impl<C: Copy, const N: usize> SharedScheduler<C, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Scheduler::new())),
        }
    }

    /// Run `f` with exclusive access to the scheduler
    ///
    /// Fails with [`Error::Busy`] when the scheduler is already borrowed,
    /// e.g. from a callback that reached for the shared handle instead of the
    /// `&mut Scheduler` it was given.
    pub fn with<R>(&self, f: impl FnOnce(&mut Scheduler<C, N>) -> R) -> Result<R, Error> {
        critical_section::with(|cs| {
            let mut scheduler = self.inner.borrow(cs).try_borrow_mut().map_err(|_| Error::Busy)?;
            Ok(f(&mut scheduler))
        })
    }

    /// Start the tick source once
    ///
    /// The hardware is touched outside the critical section so the source
    /// may enable interrupts.
    pub fn init<T: TickSource>(&self, source: &mut T) -> Result<bool, Error> {
        let mut deferred = Deferred(false);
        let first = self.with(|s| s.init(&mut deferred))?;
        if deferred.0 {
            source.start();
        }
        Ok(first)
    }

    pub fn invoke_in(
        &self,
        delay: Ticks,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<TimerId, Error> {
        self.with(|s| s.invoke_in(delay, callback, context))?
    }

    pub fn invoke_every(
        &self,
        period: Ticks,
        phase: Ticks,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<TimerId, Error> {
        self.with(|s| s.invoke_every(period, phase, callback, context))?
    }

    /// Cancel by handle; `Ok(false)` for stale handles
    ///
    /// Fails with [`Error::Busy`] from inside a callback, where the item is
    /// left scheduled; cancel through the `&mut Scheduler` argument there.
    pub fn cancel(&self, id: TimerId) -> Result<bool, Error> {
        self.with(|s| s.cancel(id))
    }

    pub fn now(&self) -> Result<Instant, Error> {
        self.with(|s| s.now())
    }

    /// Tick entry point for the timer interrupt
    ///
    /// A nested activation is refused with [`Error::Busy`] rather than
    /// re-entering the drain loop.
    pub fn on_tick(&self) -> Result<usize, Error> {
        self.with(|s| s.on_tick())
    }
}

impl<C: Copy, const N: usize> Default for SharedScheduler<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Records that the scheduler asked for a start without touching hardware
struct Deferred(bool);

impl TickSource for Deferred {
    fn start(&mut self) {
        self.0 = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::sync::atomic::{AtomicU32, Ordering};
    use critical_section::Mutex;

    static FIRED: AtomicU32 = AtomicU32::new(0);

    fn bump(_: &mut Scheduler<&'static AtomicU32, 4>, counter: &'static AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    struct Source(u32);

    impl TickSource for Source {
        fn start(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn shared_round_trip() {
        static SCHED: SharedScheduler<&'static AtomicU32, 4> = SharedScheduler::new();

        let mut source = Source(0);
        assert_eq!(SCHED.init(&mut source), Ok(true));
        assert_eq!(SCHED.init(&mut source), Ok(false));
        assert_eq!(source.0, 1);

        let id = SCHED.invoke_every(2, 2, bump, &FIRED).unwrap();
        for _ in 0..6 {
            SCHED.on_tick().unwrap();
        }
        assert_eq!(FIRED.load(Ordering::Relaxed), 3);
        assert_eq!(SCHED.now().map(|t| t.ticks()), Ok(6));
        assert_eq!(SCHED.cancel(id), Ok(true));
        assert_eq!(SCHED.cancel(id), Ok(false));
    }

    static NESTED: SharedScheduler<(), 2> = SharedScheduler::new();
    static NESTED_RESULT: AtomicU32 = AtomicU32::new(0);

    fn reenter(_: &mut Scheduler<(), 2>, _: ()) {
        let busy = NESTED.on_tick() == Err(Error::Busy)
            && NESTED.invoke_in(1, reenter, ()) == Err(Error::Busy);
        NESTED_RESULT.store(busy as u32 + 1, Ordering::Relaxed);
    }

    #[test]
    fn nested_access_is_refused() {
        NESTED.invoke_in(1, reenter, ()).unwrap();
        assert_eq!(NESTED.on_tick(), Ok(1));
        assert_eq!(NESTED_RESULT.load(Ordering::Relaxed), 2);
        assert_eq!(NESTED.with(|s| s.len()), Ok(0));
    }

    static CANCELLER: SharedScheduler<u32, 2> = SharedScheduler::new();
    static CANCEL_RESULT: Mutex<Cell<Option<Result<bool, Error>>>> =
        Mutex::new(Cell::new(None));
    static PERIODIC_HITS: AtomicU32 = AtomicU32::new(0);

    fn count_hits(_: &mut Scheduler<u32, 2>, _: u32) {
        PERIODIC_HITS.fetch_add(1, Ordering::Relaxed);
    }

    fn cancel_through_shared(_: &mut Scheduler<u32, 2>, target: u32) {
        let result = CANCELLER.cancel(TimerId::from_raw(target));
        critical_section::with(|cs| CANCEL_RESULT.borrow(cs).set(Some(result)));
    }

    #[test]
    fn cancel_from_callback_reports_busy() {
        let periodic = CANCELLER.invoke_every(1, 1, count_hits, 0).unwrap();
        CANCELLER
            .invoke_in(2, cancel_through_shared, periodic.raw())
            .unwrap();
        for _ in 0..4 {
            CANCELLER.on_tick().unwrap();
        }

        let result = critical_section::with(|cs| CANCEL_RESULT.borrow(cs).get());
        assert_eq!(result, Some(Err(Error::Busy)));
        assert_eq!(CANCELLER.with(|s| s.is_scheduled(periodic)), Ok(true));
        assert_eq!(PERIODIC_HITS.load(Ordering::Relaxed), 4);
        assert_eq!(CANCELLER.cancel(periodic), Ok(true));
    }

    fn noop(_: &mut Scheduler<(), 2>, _: ()) {}

    #[test]
    fn failed_calls_release_the_section() {
        static FULL: SharedScheduler<(), 2> = SharedScheduler::new();

        FULL.invoke_in(1, noop, ()).unwrap();
        FULL.invoke_in(1, noop, ()).unwrap();
        assert_eq!(FULL.invoke_in(1, noop, ()), Err(Error::CapacityExceeded));
        assert_eq!(FULL.invoke_every(1, 0, noop, ()), Err(Error::CapacityExceeded));
        assert_eq!(FULL.invoke_in(u32::MAX, noop, ()), Err(Error::DelayOutOfRange));
        assert_eq!(FULL.cancel(TimerId::from_raw(42)), Ok(false));

        // Every early return above left the scheduler free for the next caller
        assert_eq!(FULL.with(|s| s.len()), Ok(2));
        assert_eq!(FULL.on_tick(), Ok(2));
        assert_eq!(FULL.now().map(|t| t.ticks()), Ok(1));
        assert!(FULL.invoke_in(1, noop, ()).is_ok());
    }
}
