//! Tick-driven callback scheduler
//!
//! Multiplexes many independent timed callbacks onto one hardware tick. Items
//! live in an [`IndexedHeap`] keyed by their absolute wake tick; `on_tick`
//! advances the clock and runs everything that has come due.

use crate::error::Error;
use crate::time::{Instant, Ticks, MAX_DELAY};

use super::heap::{Handle, IndexedHeap};

/// Handle returned by [`Scheduler::invoke_in`] and [`Scheduler::invoke_every`]
pub type TimerId = Handle;

/// Callback run from tick context
///
/// Receives the scheduler itself, so it may schedule or cancel items while it
/// runs, and the context value it was registered with.
pub type Callback<C, const N: usize> = fn(&mut Scheduler<C, N>, C);

/// Something that can deliver one `on_tick` per hardware tick
pub trait TickSource {
    /// Configure the peripheral and enable its tick notification
    fn start(&mut self);
}

struct Item<C, const N: usize> {
    period: Ticks,
    callback: Callback<C, N>,
    context: C,
}

/// Software timer scheduler holding at most `N` pending items
///
/// The context type `C` is handed verbatim to the callback; the scheduler
/// never inspects it. Use `&'static` references or small `Copy` tags.
pub struct Scheduler<C, const N: usize> {
    queue: IndexedHeap<Instant, Item<C, N>, N>,
    now: Instant,
    started: bool,
}

impl<C: Copy, const N: usize> Scheduler<C, N> {
    pub const fn new() -> Self {
        Self {
            queue: IndexedHeap::new(),
            now: Instant::ZERO,
            started: false,
        }
    }

    /// Start the tick source
    ///
    /// Only the first call touches the hardware; later calls return `false`
    /// and leave both the peripheral and `now` alone.
    pub fn init<T: TickSource>(&mut self, source: &mut T) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        source.start();
        debug!("scheduler started at tick {}", self.now.ticks());
        true
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Run `callback(context)` once, `delay` ticks from now
    ///
    /// A delay of 0 means the next tick; callbacks never run inside this call.
    pub fn invoke_in(
        &mut self,
        delay: Ticks,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<TimerId, Error> {
        self.schedule(delay, 0, callback, context)
    }

    /// Run `callback(context)` every `period` ticks, first after `phase` ticks
    ///
    /// A `period` of 0 behaves like [`Scheduler::invoke_in`] with `phase`.
    pub fn invoke_every(
        &mut self,
        period: Ticks,
        phase: Ticks,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<TimerId, Error> {
        self.schedule(phase, period, callback, context)
    }

    fn schedule(
        &mut self,
        delay: Ticks,
        period: Ticks,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<TimerId, Error> {
        if delay > MAX_DELAY || period > MAX_DELAY {
            return Err(Error::DelayOutOfRange);
        }

        let wake = self.now + delay.max(1);
        let item = Item {
            period,
            callback,
            context,
        };
        self.queue.push(wake, item).map_err(|e| {
            warn!("timer queue full ({} items)", N);
            e
        })
    }

    /// Cancel a scheduled item
    ///
    /// Returns `false` for handles that already fired (one-shot), were
    /// cancelled before, or were never issued.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let found = self.queue.erase(id);
        if !found {
            trace!("cancel: timer {} not scheduled", id.raw());
        }
        found
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.queue.contains(id)
    }

    /// Ticks until `id` is due, 0 if it is due on the next `on_tick`
    pub fn remaining(&self, id: TimerId) -> Result<Ticks, Error> {
        let entry = self.queue.get(id).ok_or(Error::NotFound)?;
        Ok(entry.key().saturating_since(self.now).saturating_sub(1))
    }

    /// Ticks processed so far
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Advance the clock by one tick and run every item that is due
    ///
    /// Periodic items are re-armed before their callback runs, so the
    /// callback can cancel its own handle. Items scheduled from inside a
    /// callback are due at the earliest on the next tick, which bounds the
    /// drain loop. Returns the number of callbacks run.
    pub fn on_tick(&mut self) -> usize {
        self.now = self.now + 1;
        let now = self.now;
        let mut fired = 0;

        loop {
            let (wake, period, callback, context) = match self.queue.peek_min() {
                Some(entry) if *entry.key() <= now => {
                    let item = entry.value();
                    (*entry.key(), item.period, item.callback, item.context)
                }
                _ => break,
            };

            if period == 0 {
                self.queue.pop_min();
            } else {
                let mut next = wake + period;
                if next <= now {
                    // Overdue by more than a period; resume from now
                    next = now + period;
                }
                if self.queue.replace_min(next).is_err() {
                    unreachable!("root observed above");
                }
            }

            callback(self, context);
            fired += 1;
        }

        fired
    }
}

impl<C: Copy, const N: usize> Default for Scheduler<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use std::vec::Vec;

    /// Records (tick, tag) for every invocation
    #[derive(Default)]
    struct Log {
        calls: RefCell<Vec<(u32, u8)>>,
    }

    impl Log {
        fn count(&self, tag: u8) -> usize {
            self.calls.borrow().iter().filter(|(_, t)| *t == tag).count()
        }

        fn ticks(&self, tag: u8) -> Vec<u32> {
            self.calls
                .borrow()
                .iter()
                .filter(|(_, t)| *t == tag)
                .map(|(tick, _)| *tick)
                .collect()
        }
    }

    #[derive(Clone, Copy)]
    struct Ctx {
        log: &'static Log,
        tag: u8,
    }

    type Sched = Scheduler<Ctx, 8>;

    fn leak_log() -> &'static Log {
        std::boxed::Box::leak(std::boxed::Box::default())
    }

    fn record(s: &mut Sched, ctx: Ctx) {
        ctx.log.calls.borrow_mut().push((s.now().ticks(), ctx.tag));
    }

    fn tick_n(s: &mut Sched, n: usize) {
        for _ in 0..n {
            s.on_tick();
        }
    }

    #[derive(Default)]
    struct CountingSource {
        starts: Cell<u32>,
    }

    impl TickSource for CountingSource {
        fn start(&mut self) {
            self.starts.set(self.starts.get() + 1);
        }
    }

    #[test]
    fn init_is_idempotent() {
        let mut s = Sched::new();
        let mut source = CountingSource::default();
        assert!(s.init(&mut source));
        tick_n(&mut s, 3);
        assert!(!s.init(&mut source));
        assert_eq!(source.starts.get(), 1);
        assert_eq!(s.now().ticks(), 3);
        assert!(s.is_started());
    }

    #[test]
    fn one_shot_then_periodic() {
        let log = leak_log();
        let mut s = Sched::new();
        s.init(&mut CountingSource::default());

        let once = s.invoke_in(5, record, Ctx { log, tag: 0 }).unwrap();
        assert_eq!(once.raw(), 0);
        for call in 1..=5 {
            s.on_tick();
            let expected = if call == 5 { 1 } else { 0 };
            assert_eq!(log.count(0), expected, "after call {}", call);
        }
        assert!(!s.cancel(once));

        let every = s.invoke_every(3, 0, record, Ctx { log, tag: 1 }).unwrap();
        assert_eq!(every.raw(), 1);
        tick_n(&mut s, 10);
        assert_eq!(log.count(1), 4);
        assert_eq!(log.ticks(1), [6, 9, 12, 15]);

        assert!(s.cancel(every));
        tick_n(&mut s, 10);
        assert_eq!(log.count(1), 4);
        assert!(s.is_empty());
    }

    #[test]
    fn zero_delay_runs_on_next_tick() {
        let log = leak_log();
        let mut s = Sched::new();
        s.invoke_in(0, record, Ctx { log, tag: 0 }).unwrap();
        assert_eq!(log.count(0), 0);
        s.on_tick();
        assert_eq!(log.ticks(0), [1]);
    }

    #[test]
    fn drains_everything_due_in_one_tick() {
        let log = leak_log();
        let mut s = Sched::new();
        for tag in 0..3 {
            s.invoke_in(4, record, Ctx { log, tag }).unwrap();
        }
        tick_n(&mut s, 3);
        assert!(log.calls.borrow().is_empty());
        assert_eq!(s.on_tick(), 3);
        assert_eq!(*log.calls.borrow(), [(4, 0), (4, 1), (4, 2)]);
        assert_eq!(s.now().ticks(), 4);
    }

    #[test]
    fn periodic_keeps_its_id() {
        let log = leak_log();
        let mut s = Sched::new();
        let id = s.invoke_every(4, 2, record, Ctx { log, tag: 7 }).unwrap();
        tick_n(&mut s, 14);
        assert_eq!(log.ticks(7), [2, 6, 10, 14]);
        assert!(s.is_scheduled(id));
        assert_eq!(s.remaining(id), Ok(3));
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert_eq!(s.remaining(id), Err(Error::NotFound));
    }

    #[test]
    fn zero_period_is_one_shot() {
        let log = leak_log();
        let mut s = Sched::new();
        let id = s.invoke_every(0, 2, record, Ctx { log, tag: 0 }).unwrap();
        tick_n(&mut s, 10);
        assert_eq!(log.ticks(0), [2]);
        assert!(!s.is_scheduled(id));
    }

    #[test]
    fn capacity_is_reported() {
        let log = leak_log();
        let mut s = Sched::new();
        for _ in 0..8 {
            s.invoke_in(10, record, Ctx { log, tag: 0 }).unwrap();
        }
        assert_eq!(
            s.invoke_in(10, record, Ctx { log, tag: 1 }),
            Err(Error::CapacityExceeded)
        );
        assert_eq!(s.len(), 8);
        tick_n(&mut s, 10);
        assert_eq!(log.count(0), 8);
        assert_eq!(log.count(1), 0);
    }

    #[test]
    fn rejects_delays_outside_window() {
        let log = leak_log();
        let mut s = Sched::new();
        let ctx = Ctx { log, tag: 0 };
        assert_eq!(s.invoke_in(MAX_DELAY + 1, record, ctx), Err(Error::DelayOutOfRange));
        assert_eq!(
            s.invoke_every(u32::MAX, 0, record, ctx),
            Err(Error::DelayOutOfRange)
        );
        assert!(s.invoke_in(MAX_DELAY, record, ctx).is_ok());
    }

    #[test]
    fn cancel_unknown_id() {
        let mut s = Sched::new();
        assert!(!s.cancel(TimerId::from_raw(3)));
    }

    fn chain(s: &mut Sched, ctx: Ctx) {
        record(s, ctx);
        if ctx.tag < 3 {
            let next = Ctx {
                tag: ctx.tag + 1,
                ..ctx
            };
            s.invoke_in(0, chain, next).unwrap();
        }
    }

    #[test]
    fn callbacks_schedule_reentrantly() {
        let log = leak_log();
        let mut s = Sched::new();
        s.invoke_in(1, chain, Ctx { log, tag: 0 }).unwrap();
        // each link lands on the following tick, never the current one
        assert_eq!(s.on_tick(), 1);
        tick_n(&mut s, 5);
        assert_eq!(*log.calls.borrow(), [(1, 0), (2, 1), (3, 2), (4, 3)]);
    }

    fn stop_self(s: &mut Sched, ctx: Ctx) {
        record(s, ctx);
        let id = TimerId::from_raw(ctx.tag as u32);
        assert!(s.cancel(id));
    }

    #[test]
    fn periodic_callback_cancels_itself() {
        let log = leak_log();
        let mut s = Sched::new();
        let id = s.invoke_every(1, 1, stop_self, Ctx { log, tag: 0 }).unwrap();
        assert_eq!(id.raw(), 0);
        tick_n(&mut s, 5);
        assert_eq!(log.ticks(0), [1]);
        assert!(s.is_empty());
    }

    #[test]
    fn survives_counter_wrap() {
        let log = leak_log();
        let mut s = Sched::new();
        s.now = Instant::from_ticks(u32::MAX - 2);
        s.invoke_every(2, 2, record, Ctx { log, tag: 0 }).unwrap();
        s.invoke_in(4, record, Ctx { log, tag: 1 }).unwrap();
        tick_n(&mut s, 6);
        assert_eq!(log.ticks(0), [u32::MAX, 1, 3]);
        assert_eq!(log.ticks(1), [1]);
    }

    #[test]
    fn overdue_periodic_fires_once_per_tick() {
        let log = leak_log();
        let mut s = Sched::new();
        s.invoke_every(2, 1, record, Ctx { log, tag: 0 }).unwrap();
        // Skip the clock past several periods without dispatching
        s.now = Instant::from_ticks(9);
        s.on_tick();
        s.on_tick();
        assert_eq!(log.ticks(0), [10]);
        s.on_tick();
        assert_eq!(log.ticks(0), [10, 12]);
    }
}
