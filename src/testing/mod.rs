//! On-device self tests
//!
//! A tiny test runner for the target, where `cargo test` cannot run. Results
//! are printed to any `ufmt` sink, normally the serial console.

use core::cell::Cell;

use ufmt::{uDebug, uWrite, uwrite, Formatter};

use crate::error::Error;
use crate::rtos::{IndexedHeap, Scheduler, SharedScheduler};
use crate::time::{ms, us, Instant};

pub struct TestRunner<W> {
    out: W,
    total_tests: u32,
    passed_tests: u32,
    current_suite: &'static str,
}

pub trait TestCase {
    fn run(&self) -> TestResult;
    fn name(&self) -> &'static str;
}

#[derive(Debug, PartialEq)]
pub enum TestResult {
    Pass,
    Fail(TestError),
}

#[derive(Debug, PartialEq)]
pub enum TestError {
    AssertionFailed(&'static str),
    Scheduler(Error),
    Timeout,
}

// ufmt has no `uDebug` for `str`, so the assertion text is written verbatim
impl uDebug for TestError {
    fn fmt<W: uWrite + ?Sized>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error> {
        match self {
            TestError::AssertionFailed(expr) => {
                f.write_str("AssertionFailed(")?;
                f.write_str(expr)?;
                f.write_str(")")
            }
            TestError::Scheduler(err) => f.debug_tuple("Scheduler")?.field(err)?.finish(),
            TestError::Timeout => f.write_str("Timeout"),
        }
    }
}

impl From<Error> for TestError {
    fn from(err: Error) -> Self {
        TestError::Scheduler(err)
    }
}

impl<W: uWrite> TestRunner<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            total_tests: 0,
            passed_tests: 0,
            current_suite: "",
        }
    }

    pub fn run_suite(&mut self, name: &'static str, tests: &[&dyn TestCase]) {
        self.current_suite = name;
        let _ = uwrite!(&mut self.out, "\r\n=== Test Suite: {} ===\r\n", name);

        for test in tests {
            self.total_tests += 1;
            let _ = uwrite!(&mut self.out, "Running {}: ", test.name());

            match test.run() {
                TestResult::Pass => {
                    self.passed_tests += 1;
                    let _ = uwrite!(&mut self.out, "PASS\r\n");
                }
                TestResult::Fail(err) => {
                    let _ = uwrite!(&mut self.out, "FAIL - {:?}\r\n", err);
                }
            }
        }

        self.print_summary();
    }

    pub fn passed(&self) -> u32 {
        self.passed_tests
    }

    pub fn total(&self) -> u32 {
        self.total_tests
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_summary(&mut self) {
        let percent = if self.total_tests == 0 {
            100
        } else {
            (self.passed_tests * 100) / self.total_tests
        };
        let _ = uwrite!(
            &mut self.out,
            "\r\nTest Summary for {}:\r\nPassed: {}/{} ({}%)\r\n",
            self.current_suite,
            self.passed_tests,
            self.total_tests,
            percent
        );
    }
}

#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return $crate::testing::TestResult::Fail($crate::testing::TestError::AssertionFailed(
                concat!("`", stringify!($left), " == ", stringify!($right), "`"),
            ));
        }
    };
}

#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !$cond {
            return $crate::testing::TestResult::Fail($crate::testing::TestError::AssertionFailed(
                concat!("`", stringify!($cond), "`"),
            ));
        }
    };
}

macro_rules! try_check {
    ($res:expr) => {
        match $res {
            Ok(v) => v,
            Err(e) => return TestResult::Fail(TestError::from(e)),
        }
    };
}

type Counter<'a> = Scheduler<&'a Cell<u8>, 4>;

fn count(_: &mut Counter<'_>, hits: &Cell<u8>) {
    hits.set(hits.get() + 1);
}

pub struct HeapOrderTest;
impl TestCase for HeapOrderTest {
    fn name(&self) -> &'static str {
        "Heap Ordering"
    }

    fn run(&self) -> TestResult {
        let mut heap: IndexedHeap<u8, (), 6> = IndexedHeap::new();
        for key in [9, 3, 7, 1, 8, 2] {
            try_check!(heap.push(key, ()));
        }
        check_eq!(heap.push(0, ()), Err(Error::CapacityExceeded));

        let mut last = 0;
        while let Some(entry) = heap.pop_min() {
            check!(*entry.key() >= last);
            last = *entry.key();
        }
        check_eq!(last, 9);
        TestResult::Pass
    }
}

pub struct DispatchTest;
impl TestCase for DispatchTest {
    fn name(&self) -> &'static str {
        "Tick Dispatch"
    }

    fn run(&self) -> TestResult {
        let hits = Cell::new(0);
        let mut scheduler: Counter<'_> = Scheduler::new();
        for _ in 0..3 {
            try_check!(scheduler.invoke_in(5, count, &hits));
        }
        for _ in 0..4 {
            scheduler.on_tick();
        }
        check_eq!(hits.get(), 0);
        check_eq!(scheduler.on_tick(), 3);
        check_eq!(hits.get(), 3);
        check!(scheduler.is_empty());
        TestResult::Pass
    }
}

pub struct PeriodicCancelTest;
impl TestCase for PeriodicCancelTest {
    fn name(&self) -> &'static str {
        "Periodic Cancel"
    }

    fn run(&self) -> TestResult {
        let hits = Cell::new(0);
        let mut scheduler: Counter<'_> = Scheduler::new();
        let id = try_check!(scheduler.invoke_every(3, 0, count, &hits));
        for _ in 0..10 {
            scheduler.on_tick();
        }
        check_eq!(hits.get(), 4);
        check!(scheduler.cancel(id));
        check!(!scheduler.cancel(id));
        for _ in 0..10 {
            scheduler.on_tick();
        }
        check_eq!(hits.get(), 4);
        TestResult::Pass
    }
}

pub struct TimeBaseTest;
impl TestCase for TimeBaseTest {
    fn name(&self) -> &'static str {
        "Time Base"
    }

    fn run(&self) -> TestResult {
        check_eq!(ms(1), 10);
        check_eq!(us(1911), 19);
        let late = Instant::from_ticks(2);
        check!(Instant::from_ticks(u32::MAX) < late);
        TestResult::Pass
    }
}

/// Checks that the hardware tick is running by watching `now` advance
pub struct TickAdvanceTest<'a, C, const N: usize> {
    scheduler: &'a SharedScheduler<C, N>,
    spin_limit: u32,
}

impl<'a, C: Copy, const N: usize> TickAdvanceTest<'a, C, N> {
    pub fn new(scheduler: &'a SharedScheduler<C, N>, spin_limit: u32) -> Self {
        Self {
            scheduler,
            spin_limit,
        }
    }
}

impl<'a, C: Copy, const N: usize> TestCase for TickAdvanceTest<'a, C, N> {
    fn name(&self) -> &'static str {
        "Tick Advance"
    }

    fn run(&self) -> TestResult {
        let start = try_check!(self.scheduler.now());
        for _ in 0..self.spin_limit {
            let now = try_check!(self.scheduler.now());
            if now - start >= 10 {
                return TestResult::Pass;
            }
        }
        TestResult::Fail(TestError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[test]
    fn software_suite_passes() {
        let mut runner = TestRunner::new(String::new());
        runner.run_suite(
            "Scheduler",
            &[&HeapOrderTest, &DispatchTest, &PeriodicCancelTest, &TimeBaseTest],
        );
        assert_eq!(runner.passed(), 4);
        assert_eq!(runner.total(), 4);
        let out = runner.into_inner();
        assert!(out.contains("Running Tick Dispatch: PASS"));
        assert!(out.contains("Passed: 4/4 (100%)"));
    }

    #[test]
    fn stalled_tick_times_out() {
        static STOPPED: SharedScheduler<(), 1> = SharedScheduler::new();
        let test = TickAdvanceTest::new(&STOPPED, 100);
        assert_eq!(test.run(), TestResult::Fail(TestError::Timeout));

        let mut runner = TestRunner::new(String::new());
        runner.run_suite("Hardware", &[&test]);
        assert_eq!(runner.passed(), 0);
        assert!(runner.into_inner().contains("FAIL - Timeout"));
    }

    struct Failing;
    impl TestCase for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn run(&self) -> TestResult {
            check_eq!(1 + 1, 3);
            TestResult::Pass
        }
    }

    struct Full;
    impl TestCase for Full {
        fn name(&self) -> &'static str {
            "Full"
        }

        fn run(&self) -> TestResult {
            let mut heap: IndexedHeap<u8, (), 1> = IndexedHeap::new();
            try_check!(heap.push(1, ()));
            try_check!(heap.push(2, ()));
            TestResult::Pass
        }
    }

    #[test]
    fn failures_are_reported_verbatim() {
        let mut runner = TestRunner::new(String::new());
        runner.run_suite("Failures", &[&Failing, &Full]);
        assert_eq!(runner.passed(), 0);
        let out = runner.into_inner();
        assert!(out.contains("Running Failing: FAIL - AssertionFailed(`1 + 1 == 3`)"));
        assert!(out.contains("Running Full: FAIL - Scheduler(CapacityExceeded)"));
        assert!(out.contains("Passed: 0/2 (0%)"));
    }
}
