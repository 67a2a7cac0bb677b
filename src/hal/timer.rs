//! Timer/Counter 0, 1 and 2.
//!
//! Configuration is split in two: [`resolve`] maps a requested
//! [`TimerSetup`] onto control register images without touching hardware,
//! and the [`Timer8`] / [`Timer16`] handles write those images out. A field
//! the selected timer cannot honour keeps its previous bits.

use core::marker::PhantomData;

use embedded_hal::blocking::delay::DelayMs;

use crate::config::CPU_FREQ_HZ;
use crate::error::{HalError, HalResult};
use crate::hal::interrupt::{Callback, InterruptTable, Vector};
use crate::hal::registers::{bit, tccr1a, tccr1b, tccr8, tifr, Register, RegisterBus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerId {
    Timer0,
    Timer1,
    Timer2,
}

/// Counter clock selection.
///
/// Timer0 and Timer1 share one prescaler with the external T0/T1 inputs;
/// Timer2 has its own prescaler with the /32 and /128 taps and no external
/// clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockSource {
    Stopped,
    Direct,
    Div8,
    Div32,
    Div64,
    Div128,
    Div256,
    Div1024,
    ExternalFalling,
    ExternalRising,
}

impl ClockSource {
    /// CSn2:0 encoding on `timer`, if the timer offers this source.
    pub const fn select_bits(self, timer: TimerId) -> Option<u8> {
        use ClockSource::*;
        match timer {
            TimerId::Timer2 => match self {
                Stopped => Some(0),
                Direct => Some(1),
                Div8 => Some(2),
                Div32 => Some(3),
                Div64 => Some(4),
                Div128 => Some(5),
                Div256 => Some(6),
                Div1024 => Some(7),
                ExternalFalling | ExternalRising => None,
            },
            TimerId::Timer0 | TimerId::Timer1 => match self {
                Stopped => Some(0),
                Direct => Some(1),
                Div8 => Some(2),
                Div64 => Some(3),
                Div256 => Some(4),
                Div1024 => Some(5),
                ExternalFalling => Some(6),
                ExternalRising => Some(7),
                Div32 | Div128 => None,
            },
        }
    }

    /// Prescaler division for internal sources.
    pub const fn divisor(self) -> Option<u32> {
        match self {
            ClockSource::Direct => Some(1),
            ClockSource::Div8 => Some(8),
            ClockSource::Div32 => Some(32),
            ClockSource::Div64 => Some(64),
            ClockSource::Div128 => Some(128),
            ClockSource::Div256 => Some(256),
            ClockSource::Div1024 => Some(1024),
            _ => None,
        }
    }
}

/// Waveform generation modes.
///
/// The first four exist on every timer. Timer1 reads `Ctc` as clear on
/// OCR1A, `FastPwm` as 8-bit fast PWM and `PhaseCorrectPwm` as 8-bit phase
/// correct PWM; the remaining variants are Timer1 only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountMode {
    Normal,
    Ctc,
    FastPwm,
    PhaseCorrectPwm,
    PhaseCorrectPwm8,
    PhaseCorrectPwm9,
    PhaseCorrectPwm10,
    FastPwm8,
    FastPwm9,
    FastPwm10,
    PhaseFreqCorrectIcr,
    PhaseFreqCorrectOcr,
    PhaseCorrectIcr,
    PhaseCorrectOcr,
    CtcIcr,
    FastPwmIcr,
    FastPwmOcr,
}

const WGM8_MASK: u8 = bit(tccr8::WGM0) | bit(tccr8::WGM1) | bit(tccr8::FOC);
const WGM1A_MASK: u8 = bit(tccr1a::WGM10) | bit(tccr1a::WGM11);
const WGM1B_MASK: u8 = bit(tccr1b::WGM12) | bit(tccr1b::WGM13);
const CS_MASK: u8 = 0b0000_0111;

impl CountMode {
    /// WGMn0/WGMn1 image for TCCR0/TCCR2.
    const fn wgm8(self) -> Option<u8> {
        match self {
            CountMode::Normal => Some(0),
            CountMode::Ctc => Some(bit(tccr8::WGM1)),
            CountMode::FastPwm => Some(bit(tccr8::WGM0) | bit(tccr8::WGM1)),
            CountMode::PhaseCorrectPwm => Some(bit(tccr8::WGM0)),
            _ => None,
        }
    }

    /// Timer1 WGM13:0 mode number.
    const fn wgm16(self) -> u8 {
        match self {
            CountMode::Normal => 0,
            CountMode::PhaseCorrectPwm | CountMode::PhaseCorrectPwm8 => 1,
            CountMode::PhaseCorrectPwm9 => 2,
            CountMode::PhaseCorrectPwm10 => 3,
            CountMode::Ctc => 4,
            CountMode::FastPwm | CountMode::FastPwm8 => 5,
            CountMode::FastPwm9 => 6,
            CountMode::FastPwm10 => 7,
            CountMode::PhaseFreqCorrectIcr => 8,
            CountMode::PhaseFreqCorrectOcr => 9,
            CountMode::PhaseCorrectIcr => 10,
            CountMode::PhaseCorrectOcr => 11,
            CountMode::CtcIcr => 12,
            CountMode::FastPwmIcr => 14,
            CountMode::FastPwmOcr => 15,
        }
    }

    /// Normal or clear-on-compare: the modes where toggling OCn is allowed.
    pub const fn is_non_pwm(self) -> bool {
        matches!(self, CountMode::Normal | CountMode::Ctc | CountMode::CtcIcr)
    }

    /// Mode currently selected by the control register images.
    pub fn decode(timer: TimerId, regs: ControlRegs) -> Option<CountMode> {
        match timer {
            TimerId::Timer0 | TimerId::Timer2 => {
                let wgm0 = regs.a & bit(tccr8::WGM0) != 0;
                let wgm1 = regs.a & bit(tccr8::WGM1) != 0;
                Some(match (wgm0, wgm1) {
                    (false, false) => CountMode::Normal,
                    (false, true) => CountMode::Ctc,
                    (true, true) => CountMode::FastPwm,
                    (true, false) => CountMode::PhaseCorrectPwm,
                })
            }
            TimerId::Timer1 => {
                let mode = ((regs.b & WGM1B_MASK) >> tccr1b::WGM12) << 2 | (regs.a & WGM1A_MASK);
                Some(match mode {
                    0 => CountMode::Normal,
                    1 => CountMode::PhaseCorrectPwm8,
                    2 => CountMode::PhaseCorrectPwm9,
                    3 => CountMode::PhaseCorrectPwm10,
                    4 => CountMode::Ctc,
                    5 => CountMode::FastPwm8,
                    6 => CountMode::FastPwm9,
                    7 => CountMode::FastPwm10,
                    8 => CountMode::PhaseFreqCorrectIcr,
                    9 => CountMode::PhaseFreqCorrectOcr,
                    10 => CountMode::PhaseCorrectIcr,
                    11 => CountMode::PhaseCorrectOcr,
                    12 => CountMode::CtcIcr,
                    14 => CountMode::FastPwmIcr,
                    15 => CountMode::FastPwmOcr,
                    _ => return None,
                })
            }
        }
    }
}

/// Output compare pin behaviour on a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareAction {
    Disconnected,
    Toggle,
    Clear,
    Set,
}

impl CompareAction {
    const fn com_bits(self) -> u8 {
        match self {
            CompareAction::Disconnected => 0b00,
            CompareAction::Toggle => 0b01,
            CompareAction::Clear => 0b10,
            CompareAction::Set => 0b11,
        }
    }
}

/// Timer1 compare unit. The 8-bit timers have a single unit and ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareUnit {
    A,
    B,
}

impl CompareUnit {
    const fn com_shift(self) -> u8 {
        match self {
            CompareUnit::A => tccr1a::COM1A0,
            CompareUnit::B => tccr1a::COM1B0,
        }
    }

    const fn vector(self) -> Vector {
        match self {
            CompareUnit::A => Vector::Timer1CompareA,
            CompareUnit::B => Vector::Timer1CompareB,
        }
    }

    const fn registers(self) -> (Register, Register) {
        match self {
            CompareUnit::A => (Register::Ocr1ah, Register::Ocr1al),
            CompareUnit::B => (Register::Ocr1bh, Register::Ocr1bl),
        }
    }
}

/// A full configuration request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerSetup {
    pub clock: ClockSource,
    pub mode: CountMode,
    pub action: CompareAction,
    pub unit: CompareUnit,
}

impl TimerSetup {
    pub const fn new(clock: ClockSource, mode: CountMode, action: CompareAction) -> Self {
        Self {
            clock,
            mode,
            action,
            unit: CompareUnit::A,
        }
    }

    pub const fn on_unit(mut self, unit: CompareUnit) -> Self {
        self.unit = unit;
        self
    }
}

/// Control register images. The 8-bit timers only use `a` (TCCRn);
/// Timer1 uses `a` for TCCR1A and `b` for TCCR1B.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlRegs {
    pub a: u8,
    pub b: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub regs: ControlRegs,
    /// First field that could not be applied.
    pub rejected: Option<HalError>,
}

/// Apply `setup` to the `current` control images of `timer`.
///
/// Fields are applied in order clock, mode, compare action. The toggle
/// check runs against the mode the registers hold once the mode field has
/// been applied, so a rejected mode request falls back to the previous one.
pub fn resolve(timer: TimerId, setup: &TimerSetup, current: ControlRegs) -> Resolved {
    let mut regs = current;
    let mut rejected = None;
    let mut reject = |e: HalError| {
        rejected.get_or_insert(e);
    };

    let com_shift = match timer {
        TimerId::Timer0 | TimerId::Timer2 => {
            match setup.clock.select_bits(timer) {
                Some(cs) => regs.a = (regs.a & !CS_MASK) | cs,
                None => reject(HalError::UnsupportedClock),
            }
            match setup.mode.wgm8() {
                Some(wgm) => regs.a = (regs.a & !WGM8_MASK) | wgm,
                None => reject(HalError::UnsupportedMode),
            }
            tccr8::COM0
        }
        TimerId::Timer1 => {
            match setup.clock.select_bits(timer) {
                Some(cs) => regs.b = (regs.b & !CS_MASK) | cs,
                None => reject(HalError::UnsupportedClock),
            }
            let mode = setup.mode.wgm16();
            regs.a = (regs.a & !WGM1A_MASK) | (mode & 0b11);
            regs.b = (regs.b & !WGM1B_MASK) | ((mode >> 2) << tccr1b::WGM12);
            setup.unit.com_shift()
        }
    };

    let effective = CountMode::decode(timer, regs);
    let toggle_blocked = setup.action == CompareAction::Toggle
        && !matches!(effective, Some(mode) if mode.is_non_pwm());
    if toggle_blocked {
        reject(HalError::ToggleRequiresNonPwmMode);
    } else {
        regs.a = (regs.a & !(0b11 << com_shift)) | (setup.action.com_bits() << com_shift);
    }

    Resolved { regs, rejected }
}

/// Overflows of a counter wrapping at `top` that fit in `period_ms`,
/// rounded down.
pub const fn overflow_count(period_ms: u32, clock_hz: u32, top: u16) -> u64 {
    period_ms as u64 * clock_hz as u64 / ((top as u64 + 1) * 1000)
}

/// Register layout of one 8-bit timer.
pub trait Timer8Channel {
    const ID: TimerId;
    const TCCR: Register;
    const TCNT: Register;
    const OCR: Register;
    const OVERFLOW: Vector;
    const COMPARE: Vector;
}

pub struct Tc0;
pub struct Tc2;

impl Timer8Channel for Tc0 {
    const ID: TimerId = TimerId::Timer0;
    const TCCR: Register = Register::Tccr0;
    const TCNT: Register = Register::Tcnt0;
    const OCR: Register = Register::Ocr0;
    const OVERFLOW: Vector = Vector::Timer0Overflow;
    const COMPARE: Vector = Vector::Timer0Compare;
}

impl Timer8Channel for Tc2 {
    const ID: TimerId = TimerId::Timer2;
    const TCCR: Register = Register::Tccr2;
    const TCNT: Register = Register::Tcnt2;
    const OCR: Register = Register::Ocr2;
    const OVERFLOW: Vector = Vector::Timer2Overflow;
    const COMPARE: Vector = Vector::Timer2Compare;
}

pub struct Timer8<'v, B, T> {
    bus: B,
    vectors: &'v InterruptTable,
    _timer: PhantomData<T>,
}

impl<'v, B: RegisterBus, T: Timer8Channel> Timer8<'v, B, T> {
    pub fn new(bus: B, vectors: &'v InterruptTable) -> Self {
        Self {
            bus,
            vectors,
            _timer: PhantomData,
        }
    }

    /// Load the counter, then apply `setup`. Unsupported fields are skipped.
    pub fn init(&mut self, initial: u8, setup: TimerSetup) {
        let _ = self.configure(initial, setup);
    }

    /// Like [`init`](Self::init), but reports the first skipped field.
    pub fn configure(&mut self, initial: u8, setup: TimerSetup) -> HalResult<()> {
        let resolved = resolve(T::ID, &setup, self.control());
        self.bus.write(T::TCNT, initial);
        self.bus.write(T::TCCR, resolved.regs.a);
        resolved.rejected.map_or(Ok(()), Err)
    }

    /// Stop the clock and disconnect OCn. Counter and compare register keep
    /// their values.
    pub fn disable(&mut self) {
        self.bus
            .write_field(T::TCCR, CS_MASK | (0b11 << tccr8::COM0), 0);
    }

    pub fn set_compare_value(&mut self, value: u8) {
        self.bus.write(T::OCR, value);
    }

    pub fn compare_value(&self) -> u8 {
        self.bus.read(T::OCR)
    }

    pub fn set_timer(&mut self, value: u8) {
        self.bus.write(T::TCNT, value);
    }

    pub fn timer_value(&self) -> u8 {
        self.bus.read(T::TCNT)
    }

    pub fn count_mode(&self) -> Option<CountMode> {
        CountMode::decode(T::ID, self.control())
    }

    /// Highest counter value before the counter wraps.
    pub fn top(&self) -> u8 {
        match self.count_mode() {
            Some(CountMode::Ctc) => self.compare_value(),
            _ => 0xFF,
        }
    }

    pub fn is_running(&self) -> bool {
        self.bus.read(T::TCCR) & CS_MASK != 0
    }

    /// Consume a pending overflow flag. Only meaningful while the overflow
    /// interrupt is masked.
    pub fn take_overflow(&mut self) -> bool {
        self.take_flag(T::OVERFLOW)
    }

    /// Consume a pending compare match flag, see [`take_overflow`](Self::take_overflow).
    pub fn take_compare_match(&mut self) -> bool {
        self.take_flag(T::COMPARE)
    }

    fn take_flag(&mut self, vector: Vector) -> bool {
        let (reg, n) = vector.flag();
        if !self.bus.is_set(reg, bit(n)) {
            return false;
        }
        self.bus.write(reg, bit(n));
        true
    }

    pub fn enable_overflow_interrupt(&mut self, callback: Option<Callback>) -> HalResult<()> {
        self.vectors.enable(&self.bus, T::OVERFLOW, callback)
    }

    pub fn disable_overflow_interrupt(&mut self) {
        self.vectors.disable(&self.bus, T::OVERFLOW);
    }

    pub fn enable_compare_match_interrupt(
        &mut self,
        callback: Option<Callback>,
    ) -> HalResult<()> {
        self.vectors.enable(&self.bus, T::COMPARE, callback)
    }

    pub fn disable_compare_match_interrupt(&mut self) {
        self.vectors.disable(&self.bus, T::COMPARE);
    }

    fn control(&self) -> ControlRegs {
        ControlRegs {
            a: self.bus.read(T::TCCR),
            b: 0,
        }
    }
}

impl<'v, B: RegisterBus> Timer8<'v, B, Tc0> {
    /// Busy-wait for `period_ms` using Timer0 overflows.
    ///
    /// Runs Timer0 in normal mode straight off the CPU clock and counts
    /// overflow flags; the remainder below one overflow is dropped, so the
    /// wait never exceeds the request. Timer0 is stopped afterwards.
    /// Returns the number of overflows waited for.
    pub fn delay_ms(&mut self, period_ms: u32) -> u64 {
        self.bus.write(Register::Tifr, bit(tifr::TOV0));
        self.init(
            0,
            TimerSetup::new(ClockSource::Direct, CountMode::Normal, CompareAction::Disconnected),
        );
        let target = overflow_count(period_ms, CPU_FREQ_HZ, self.top() as u16);

        let mut overflows = 0;
        while overflows < target {
            while !self.take_overflow() {}
            overflows += 1;
        }

        self.disable();
        overflows
    }
}

impl<'v, B: RegisterBus> DelayMs<u16> for Timer8<'v, B, Tc0> {
    fn delay_ms(&mut self, ms: u16) {
        Timer8::delay_ms(self, ms as u32);
    }
}

impl<'v, B: RegisterBus> DelayMs<u32> for Timer8<'v, B, Tc0> {
    fn delay_ms(&mut self, ms: u32) {
        Timer8::delay_ms(self, ms);
    }
}

/// Timer/Counter1.
///
/// 16-bit registers go through the shared TEMP latch: writes put the high
/// byte first, reads take the low byte first, and both halves are accessed
/// with interrupts masked so an ISR cannot clobber TEMP in between.
pub struct Timer16<'v, B> {
    bus: B,
    vectors: &'v InterruptTable,
}

impl<'v, B: RegisterBus> Timer16<'v, B> {
    pub fn new(bus: B, vectors: &'v InterruptTable) -> Self {
        Self { bus, vectors }
    }

    /// Load the counter, then apply `setup`. Unsupported fields are skipped.
    pub fn init(&mut self, initial: u16, setup: TimerSetup) {
        let _ = self.configure(initial, setup);
    }

    /// Like [`init`](Self::init), but reports the first skipped field.
    pub fn configure(&mut self, initial: u16, setup: TimerSetup) -> HalResult<()> {
        let resolved = resolve(TimerId::Timer1, &setup, self.control());
        self.write_pair(Register::Tcnt1h, Register::Tcnt1l, initial);
        self.bus.write(Register::Tccr1a, resolved.regs.a);
        self.bus.write(Register::Tccr1b, resolved.regs.b);
        resolved.rejected.map_or(Ok(()), Err)
    }

    /// Stop the clock and disconnect OC1 on `unit`.
    pub fn disable(&mut self, unit: CompareUnit) {
        self.bus.write_field(Register::Tccr1b, CS_MASK, 0);
        self.bus
            .write_field(Register::Tccr1a, 0b11 << unit.com_shift(), 0);
    }

    pub fn set_compare_value(&mut self, unit: CompareUnit, value: u16) {
        let (high, low) = unit.registers();
        self.write_pair(high, low, value);
    }

    pub fn compare_value(&self, unit: CompareUnit) -> u16 {
        let (high, low) = unit.registers();
        self.read_pair(high, low)
    }

    pub fn set_timer(&mut self, value: u16) {
        self.write_pair(Register::Tcnt1h, Register::Tcnt1l, value);
    }

    pub fn timer_value(&self) -> u16 {
        self.read_pair(Register::Tcnt1h, Register::Tcnt1l)
    }

    pub fn set_input_capture(&mut self, value: u16) {
        self.write_pair(Register::Icr1h, Register::Icr1l, value);
    }

    pub fn input_capture(&self) -> u16 {
        self.read_pair(Register::Icr1h, Register::Icr1l)
    }

    pub fn count_mode(&self) -> Option<CountMode> {
        CountMode::decode(TimerId::Timer1, self.control())
    }

    /// Highest counter value before the counter wraps or turns around.
    pub fn top(&self) -> u16 {
        match self.count_mode() {
            Some(CountMode::PhaseCorrectPwm8 | CountMode::FastPwm8) => 0x00FF,
            Some(CountMode::PhaseCorrectPwm9 | CountMode::FastPwm9) => 0x01FF,
            Some(CountMode::PhaseCorrectPwm10 | CountMode::FastPwm10) => 0x03FF,
            Some(
                CountMode::Ctc
                | CountMode::PhaseFreqCorrectOcr
                | CountMode::PhaseCorrectOcr
                | CountMode::FastPwmOcr,
            ) => self.compare_value(CompareUnit::A),
            Some(
                CountMode::PhaseFreqCorrectIcr
                | CountMode::PhaseCorrectIcr
                | CountMode::CtcIcr
                | CountMode::FastPwmIcr,
            ) => self.input_capture(),
            _ => 0xFFFF,
        }
    }

    pub fn is_running(&self) -> bool {
        self.bus.read(Register::Tccr1b) & CS_MASK != 0
    }

    pub fn enable_overflow_interrupt(&mut self, callback: Option<Callback>) -> HalResult<()> {
        self.vectors.enable(&self.bus, Vector::Timer1Overflow, callback)
    }

    pub fn disable_overflow_interrupt(&mut self) {
        self.vectors.disable(&self.bus, Vector::Timer1Overflow);
    }

    pub fn enable_compare_match_interrupt(
        &mut self,
        unit: CompareUnit,
        callback: Option<Callback>,
    ) -> HalResult<()> {
        self.vectors.enable(&self.bus, unit.vector(), callback)
    }

    pub fn disable_compare_match_interrupt(&mut self, unit: CompareUnit) {
        self.vectors.disable(&self.bus, unit.vector());
    }

    pub fn enable_capture_interrupt(&mut self, callback: Option<Callback>) -> HalResult<()> {
        self.vectors.enable(&self.bus, Vector::Timer1Capture, callback)
    }

    pub fn disable_capture_interrupt(&mut self) {
        self.vectors.disable(&self.bus, Vector::Timer1Capture);
    }

    fn control(&self) -> ControlRegs {
        ControlRegs {
            a: self.bus.read(Register::Tccr1a),
            b: self.bus.read(Register::Tccr1b),
        }
    }

    fn write_pair(&self, high: Register, low: Register, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        critical_section::with(|_| {
            self.bus.write(high, hi);
            self.bus.write(low, lo);
        });
    }

    fn read_pair(&self, high: Register, low: Register) -> u16 {
        critical_section::with(|_| {
            let lo = self.bus.read(low);
            let hi = self.bus.read(high);
            u16::from_be_bytes([hi, lo])
        })
    }
}

/// The three timers, sharing one bus handle and one callback table.
pub struct Timers<'v, B> {
    pub timer0: Timer8<'v, B, Tc0>,
    pub timer1: Timer16<'v, B>,
    pub timer2: Timer8<'v, B, Tc2>,
}

impl<'v, B: RegisterBus + Copy> Timers<'v, B> {
    pub fn new(bus: B, vectors: &'v InterruptTable) -> Self {
        Self {
            timer0: Timer8::new(bus, vectors),
            timer1: Timer16::new(bus, vectors),
            timer2: Timer8::new(bus, vectors),
        }
    }
}
