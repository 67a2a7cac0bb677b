//! On-target self tests for the timer drivers, reported over a `uWrite`
//! console.

use ufmt::{uDisplay, uWrite, uwrite, uwriteln, Formatter};

use crate::config::CPU_FREQ_HZ;
use crate::hal::pwm::PwmChannel;
use crate::hal::registers::RegisterBus;
use crate::hal::timer::{
    overflow_count, ClockSource, CompareAction, CompareUnit, CountMode, TimerSetup, Timers,
};

pub trait TestCase<B> {
    fn name(&self) -> &'static str;
    fn run(&self, timers: &mut Timers<'_, B>) -> TestResult;
}

#[derive(Debug, PartialEq)]
pub enum TestResult {
    Pass,
    Fail(TestError),
}

#[derive(Debug, PartialEq)]
pub enum TestError {
    AssertionFailed(&'static str),
    Timeout,
    HardwareFault,
}

impl uDisplay for TestError {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            TestError::AssertionFailed(msg) => f.write_str(msg),
            TestError::Timeout => f.write_str("timeout"),
            TestError::HardwareFault => f.write_str("hardware fault"),
        }
    }
}

pub struct TestRunner<W> {
    console: W,
    total_tests: u32,
    passed_tests: u32,
    current_suite: &'static str,
}

impl<W: uWrite> TestRunner<W> {
    pub fn new(console: W) -> Self {
        Self {
            console,
            total_tests: 0,
            passed_tests: 0,
            current_suite: "",
        }
    }

    /// Run `tests` in order and print a summary. True when all passed.
    pub fn run_suite<B>(
        &mut self,
        name: &'static str,
        timers: &mut Timers<'_, B>,
        tests: &[&dyn TestCase<B>],
    ) -> bool {
        self.current_suite = name;
        self.total_tests = 0;
        self.passed_tests = 0;
        uwrite!(self.console, "\n=== Test Suite: {} ===\n", name).ok();

        for test in tests {
            self.total_tests += 1;
            uwrite!(self.console, "Running {}: ", test.name()).ok();

            match test.run(timers) {
                TestResult::Pass => {
                    self.passed_tests += 1;
                    uwriteln!(self.console, "PASS").ok();
                }
                TestResult::Fail(err) => {
                    uwriteln!(self.console, "FAIL - {}", err).ok();
                }
            }
        }

        self.print_summary();
        self.passed_tests == self.total_tests
    }

    pub fn into_console(self) -> W {
        self.console
    }

    fn print_summary(&mut self) {
        uwrite!(self.console, "\nTest Summary for {}:\n", self.current_suite).ok();

        let percent = if self.total_tests == 0 {
            100
        } else {
            self.passed_tests * 100 / self.total_tests
        };
        uwriteln!(
            self.console,
            "Passed: {}/{} ({}%)",
            self.passed_tests,
            self.total_tests,
            percent
        )
        .ok();
    }
}

macro_rules! check_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return TestResult::Fail(TestError::AssertionFailed(concat!(
                "assertion failed: `",
                stringify!($left),
                " == ",
                stringify!($right),
                "`"
            )));
        }
    };
}

macro_rules! check_within {
    ($value:expr, $target:expr, $tolerance:expr) => {
        if ($value).abs_diff($target) > $tolerance {
            return TestResult::Fail(TestError::AssertionFailed(concat!(
                "assertion failed: `",
                stringify!($value),
                "` within ",
                stringify!($tolerance),
                " of `",
                stringify!($target),
                "`"
            )));
        }
    };
}

macro_rules! check_timeout {
    ($cond:expr, $polls:expr) => {
        let mut polls: u32 = $polls;
        while !$cond {
            if polls == 0 {
                return TestResult::Fail(TestError::Timeout);
            }
            polls -= 1;
        }
    };
}

/// Timer0 busy-wait counts the expected overflows and stops the timer.
pub struct DelayTest;

impl<B: RegisterBus> TestCase<B> for DelayTest {
    fn name(&self) -> &'static str {
        "Timer0 delay"
    }

    fn run(&self, timers: &mut Timers<'_, B>) -> TestResult {
        let overflows = timers.timer0.delay_ms(10);
        check_eq!(overflows, overflow_count(10, CPU_FREQ_HZ, 0xFF));
        check_eq!(timers.timer0.is_running(), false);
        TestResult::Pass
    }
}

/// Timer1 16-bit registers survive the TEMP latch in both directions.
pub struct CounterLatchTest;

impl<B: RegisterBus> TestCase<B> for CounterLatchTest {
    fn name(&self) -> &'static str {
        "Timer1 16-bit access"
    }

    fn run(&self, timers: &mut Timers<'_, B>) -> TestResult {
        let timer1 = &mut timers.timer1;
        timer1.init(
            0xA55A,
            TimerSetup::new(ClockSource::Stopped, CountMode::Normal, CompareAction::Disconnected),
        );
        check_eq!(timer1.timer_value(), 0xA55A);

        timer1.set_compare_value(CompareUnit::B, 0x0123);
        check_eq!(timer1.compare_value(CompareUnit::B), 0x0123);
        timer1.set_input_capture(0xFEDC);
        check_eq!(timer1.input_capture(), 0xFEDC);
        TestResult::Pass
    }
}

/// Timer2 in CTC raises its compare flag.
pub struct CompareMatchTest;

impl<B: RegisterBus> TestCase<B> for CompareMatchTest {
    fn name(&self) -> &'static str {
        "Timer2 compare match"
    }

    fn run(&self, timers: &mut Timers<'_, B>) -> TestResult {
        let timer2 = &mut timers.timer2;
        timer2.set_compare_value(99);
        if timer2
            .configure(
                0,
                TimerSetup::new(ClockSource::Div8, CountMode::Ctc, CompareAction::Disconnected),
            )
            .is_err()
        {
            return TestResult::Fail(TestError::HardwareFault);
        }
        timer2.take_compare_match();
        check_eq!(timer2.top(), 99);

        check_timeout!(timer2.take_compare_match(), 10_000);
        timer2.disable();
        TestResult::Pass
    }
}

/// Every PWM channel reads back the duty it was given.
pub struct PwmDutyTest;

impl<B: RegisterBus> TestCase<B> for PwmDutyTest {
    fn name(&self) -> &'static str {
        "PWM duty"
    }

    fn run(&self, timers: &mut Timers<'_, B>) -> TestResult {
        let channels = [
            PwmChannel::Pwm0,
            PwmChannel::Pwm1,
            PwmChannel::Pwm2,
            PwmChannel::Pwm3,
        ];
        for channel in channels {
            if timers.pwm_init(channel, 1000).is_err() {
                return TestResult::Fail(TestError::HardwareFault);
            }
            for duty in [0u8, 25, 50, 75, 100] {
                timers.pwm_write(channel, duty);
                check_within!(timers.pwm_duty(channel), duty, 1);
            }
        }

        timers.timer0.disable();
        timers.timer1.disable(CompareUnit::A);
        timers.timer1.disable(CompareUnit::B);
        timers.timer2.disable();
        TestResult::Pass
    }
}

/// The full self-test suite.
pub fn timer_suite<'a, B: RegisterBus + 'a>() -> [&'a dyn TestCase<B>; 4] {
    [&DelayTest, &CounterLatchTest, &CompareMatchTest, &PwmDutyTest]
}
