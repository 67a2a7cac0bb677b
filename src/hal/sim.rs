//! Host-side model of the ATmega32 peripherals the drivers touch.
//!
//! The model keeps a virtual CPU clock instead of spinning: every read of
//! TIFR fast-forwards the clock to the next timer event, so a busy-wait on
//! an overflow flag completes after one iteration per overflow. Counters
//! step through their prescaler and waveform period, TIFR and GIFR are
//! write-one-to-clear, and Timer1's 16-bit registers go through the shared
//! TEMP latch exactly like the silicon.

use core::cell::{Cell, RefCell};

use crate::config::CPU_FREQ_HZ;
use crate::hal::interrupt::{InterruptTable, Vector};
use crate::hal::registers::{bit, tifr, usart, Register, RegisterBus};

#[derive(Default)]
struct Counter {
    position: Cell<u32>,
    phase: Cell<u32>,
}

/// Period and event layout of a running counter.
struct Geometry {
    prescale: u32,
    top: u32,
    period: u32,
    phase_correct: bool,
    clear_on_match: bool,
    overflow_flag: u8,
    compares: [Option<(u32, u8)>; 3],
}

pub struct SimMcu {
    regs: [Cell<u8>; Register::COUNT],
    clock_hz: u32,
    cycles: Cell<u64>,
    counters: [Counter; 3],
    ocr1a: Cell<u16>,
    ocr1b: Cell<u16>,
    icr1: Cell<u16>,
    temp: Cell<u8>,
    scheduled: RefCell<Vec<(u64, Vector)>>,
    vectors: Cell<Option<&'static InterruptTable>>,
    writes: RefCell<Vec<(Register, u8)>>,
    tx: RefCell<Vec<u8>>,
}

impl SimMcu {
    pub fn new() -> Self {
        Self::with_clock(CPU_FREQ_HZ)
    }

    pub fn with_clock(clock_hz: u32) -> Self {
        Self {
            regs: core::array::from_fn(|_| Cell::new(0)),
            clock_hz,
            cycles: Cell::new(0),
            counters: Default::default(),
            ocr1a: Cell::new(0),
            ocr1b: Cell::new(0),
            icr1: Cell::new(0),
            temp: Cell::new(0),
            scheduled: RefCell::new(Vec::new()),
            vectors: Cell::new(None),
            writes: RefCell::new(Vec::new()),
            tx: RefCell::new(Vec::new()),
        }
    }

    /// Let the model vector pending, unmasked interrupts into `table`
    /// whenever virtual time moves.
    pub fn attach_vectors(&self, table: &'static InterruptTable) {
        self.vectors.set(Some(table));
    }

    pub fn elapsed_cycles(&self) -> u64 {
        self.cycles.get()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.cycles.get() * 1000 / self.clock_hz as u64
    }

    /// Raise the request flag of `vector` at virtual time `at_ms`.
    pub fn schedule(&self, at_ms: u64, vector: Vector) {
        let at = at_ms * self.clock_hz as u64 / 1000;
        self.scheduled.borrow_mut().push((at, vector));
    }

    /// Set the request flag of `vector`, as the peripheral would.
    pub fn raise(&self, vector: Vector) {
        let (reg, n) = vector.flag();
        self.set_raw(reg, self.raw(reg) | bit(n));
    }

    /// Vectors whose flag and mask bits are both set.
    pub fn pending(&self) -> Vec<Vector> {
        Vector::ALL
            .iter()
            .copied()
            .filter(|v| {
                let (flag_reg, f) = v.flag();
                let (mask_reg, m) = v.mask();
                self.raw(flag_reg) & bit(f) != 0 && self.raw(mask_reg) & bit(m) != 0
            })
            .collect()
    }

    /// Dispatch every pending interrupt through `table`.
    pub fn service(&self, table: &InterruptTable) {
        for vector in self.pending() {
            table.dispatch(self, vector);
        }
    }

    /// Side-effect free register read.
    pub fn peek(&self, reg: Register) -> u8 {
        match reg {
            Register::Tcnt0 => self.count(0) as u8,
            Register::Tcnt2 => self.count(2) as u8,
            Register::Tcnt1l => self.count(1) as u8,
            Register::Tcnt1h => (self.count(1) >> 8) as u8,
            Register::Ocr1al => self.ocr1a.get() as u8,
            Register::Ocr1ah => (self.ocr1a.get() >> 8) as u8,
            Register::Ocr1bl => self.ocr1b.get() as u8,
            Register::Ocr1bh => (self.ocr1b.get() >> 8) as u8,
            Register::Icr1l => self.icr1.get() as u8,
            Register::Icr1h => (self.icr1.get() >> 8) as u8,
            _ => self.raw(reg),
        }
    }

    /// Drive a register from the outside, e.g. an input port level.
    pub fn poke(&self, reg: Register, value: u8) {
        self.set_raw(reg, value);
    }

    pub fn timer1_count(&self) -> u16 {
        self.count(1) as u16
    }

    pub fn ocr1a(&self) -> u16 {
        self.ocr1a.get()
    }

    pub fn ocr1b(&self) -> u16 {
        self.ocr1b.get()
    }

    pub fn writes(&self) -> Vec<(Register, u8)> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.tx.borrow().clone()
    }

    /// Move virtual time forward by `cycles` CPU clocks.
    pub fn advance(&self, cycles: u64) {
        for t in 0..3 {
            if let Some(g) = self.geometry(t) {
                let counter = &self.counters[t];
                let total = counter.phase.get() as u64 + cycles;
                let ticks = total / g.prescale as u64;
                counter.phase.set((total % g.prescale as u64) as u32);
                if ticks > 0 {
                    self.step(t, &g, ticks);
                }
            }
        }
        self.cycles.set(self.cycles.get() + cycles);

        let now = self.cycles.get();
        let due: Vec<Vector> = {
            let mut scheduled = self.scheduled.borrow_mut();
            let due = scheduled
                .iter()
                .filter(|(at, _)| *at <= now)
                .map(|(_, v)| *v)
                .collect::<Vec<_>>();
            scheduled.retain(|(at, _)| *at > now);
            due
        };
        for vector in due {
            self.raise(vector);
        }

        if let Some(table) = self.vectors.get() {
            self.service(table);
        }
    }

    fn raw(&self, reg: Register) -> u8 {
        self.regs[reg.index()].get()
    }

    fn set_raw(&self, reg: Register, value: u8) {
        self.regs[reg.index()].set(value);
    }

    fn geometry(&self, t: usize) -> Option<Geometry> {
        let standard = |cs: u8| match cs {
            1 => Some(1),
            2 => Some(8),
            3 => Some(64),
            4 => Some(256),
            5 => Some(1024),
            // stopped, or clocked from the T0/T1 pin
            _ => None,
        };

        match t {
            0 | 2 => {
                let (tccr, ocr, ovf, ocf) = if t == 0 {
                    (Register::Tccr0, Register::Ocr0, tifr::TOV0, tifr::OCF0)
                } else {
                    (Register::Tccr2, Register::Ocr2, tifr::TOV2, tifr::OCF2)
                };
                let control = self.raw(tccr);
                let cs = control & 0x07;
                let prescale = if t == 2 {
                    [0, 1, 8, 32, 64, 128, 256, 1024][cs as usize]
                } else {
                    standard(cs)?
                };
                if prescale == 0 {
                    return None;
                }
                let ocr = self.raw(ocr) as u32;
                let wgm = ((control >> 6) & 1, (control >> 3) & 1);
                let (top, phase_correct, clear_on_match) = match wgm {
                    (0, 1) => (ocr, false, true),
                    (1, 0) => (0xFF, true, false),
                    _ => (0xFF, false, false),
                };
                Some(Geometry::new(prescale, top, phase_correct, clear_on_match, ovf, [
                    Some((ocr, ocf)),
                    None,
                    None,
                ]))
            }
            _ => {
                let a = self.raw(Register::Tccr1a);
                let b = self.raw(Register::Tccr1b);
                let prescale = standard(b & 0x07)?;
                let mode = ((b >> 3) & 0x03) << 2 | (a & 0x03);
                let ocr1a = self.ocr1a.get() as u32;
                let icr1 = self.icr1.get() as u32;
                let top = match mode {
                    0 | 13 => 0xFFFF,
                    1 | 5 => 0x00FF,
                    2 | 6 => 0x01FF,
                    3 | 7 => 0x03FF,
                    4 | 9 | 11 | 15 => ocr1a,
                    _ => icr1,
                };
                let phase_correct = matches!(mode, 1 | 2 | 3 | 8 | 9 | 10 | 11);
                let clear_on_match = matches!(mode, 4 | 12);
                let capture = if mode == 12 {
                    Some((icr1, tifr::ICF1))
                } else {
                    None
                };
                Some(Geometry::new(prescale, top, phase_correct, clear_on_match, tifr::TOV1, [
                    Some((ocr1a, tifr::OCF1A)),
                    Some((self.ocr1b.get() as u32, tifr::OCF1B)),
                    capture,
                ]))
            }
        }
    }

    fn count(&self, t: usize) -> u32 {
        let position = self.counters[t].position.get();
        match self.geometry(t) {
            Some(g) if g.phase_correct && position > g.top => 2 * g.top - position,
            _ => position,
        }
    }

    fn step(&self, t: usize, g: &Geometry, ticks: u64) {
        let period = g.period as u64;
        let position = self.counters[t].position.get() as u64 % period;
        let mut flags = 0u8;

        if !g.clear_on_match && position + ticks >= period {
            flags |= bit(g.overflow_flag);
        }
        for (value, flag) in g.compares.iter().flatten() {
            if let Some(distance) = distance_to(position, *value as u64, period) {
                if ticks >= distance {
                    flags |= bit(*flag);
                }
            }
        }

        self.counters[t]
            .position
            .set(((position + ticks) % period) as u32);
        self.set_raw(Register::Tifr, self.raw(Register::Tifr) | flags);
    }

    fn next_event(&self, t: usize) -> Option<u64> {
        let g = self.geometry(t)?;
        let period = g.period as u64;
        let position = self.counters[t].position.get() as u64 % period;
        let mut ticks = if g.clear_on_match {
            u64::MAX
        } else {
            period - position
        };
        for (value, _) in g.compares.iter().flatten() {
            if let Some(distance) = distance_to(position, *value as u64, period) {
                ticks = ticks.min(distance);
            }
        }
        if ticks == u64::MAX {
            return None;
        }
        Some(ticks * g.prescale as u64 - self.counters[t].phase.get() as u64)
    }

    /// Fast-forward to the earliest upcoming counter event.
    fn skip_to_next_event(&self) {
        let next = (0..3).filter_map(|t| self.next_event(t)).min();
        if let Some(cycles) = next {
            self.advance(cycles);
        }
    }

    fn set_position(&self, t: usize, value: u32) {
        self.counters[t].position.set(value);
    }
}

impl Geometry {
    fn new(
        prescale: u32,
        top: u32,
        phase_correct: bool,
        clear_on_match: bool,
        overflow_flag: u8,
        compares: [Option<(u32, u8)>; 3],
    ) -> Self {
        let period = if phase_correct { 2 * top } else { top + 1 }.max(1);
        Self {
            prescale,
            top,
            period,
            phase_correct,
            clear_on_match,
            overflow_flag,
            compares,
        }
    }
}

/// Ticks until the counter next reaches `value`, a full period if it is
/// there already.
fn distance_to(position: u64, value: u64, period: u64) -> Option<u64> {
    if value >= period {
        return None;
    }
    let distance = (value + period - position) % period;
    Some(if distance == 0 { period } else { distance })
}

impl Default for SimMcu {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for SimMcu {
    fn read(&self, reg: Register) -> u8 {
        match reg {
            Register::Tifr => {
                self.skip_to_next_event();
                self.raw(Register::Tifr)
            }
            Register::Tcnt1l => {
                let count = self.count(1);
                self.temp.set((count >> 8) as u8);
                count as u8
            }
            Register::Icr1l => {
                let icr = self.icr1.get();
                self.temp.set((icr >> 8) as u8);
                icr as u8
            }
            Register::Tcnt1h | Register::Icr1h => self.temp.get(),
            Register::Ucsra => self.raw(reg) | bit(usart::UDRE),
            _ => self.peek(reg),
        }
    }

    fn write(&self, reg: Register, value: u8) {
        self.writes.borrow_mut().push((reg, value));
        let pair = |low: u8| (self.temp.get() as u16) << 8 | low as u16;
        match reg {
            Register::Tifr | Register::Gifr => self.set_raw(reg, self.raw(reg) & !value),
            Register::Tcnt0 => self.set_position(0, value as u32),
            Register::Tcnt2 => self.set_position(2, value as u32),
            Register::Tcnt1h | Register::Ocr1ah | Register::Ocr1bh | Register::Icr1h => {
                self.temp.set(value)
            }
            Register::Tcnt1l => self.set_position(1, pair(value) as u32),
            Register::Ocr1al => self.ocr1a.set(pair(value)),
            Register::Ocr1bl => self.ocr1b.set(pair(value)),
            Register::Icr1l => self.icr1.set(pair(value)),
            Register::Udr => self.tx.borrow_mut().push(value),
            _ => self.set_raw(reg, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_bit_pairs_go_through_temp_latch() {
        let mcu = SimMcu::new();
        mcu.write(Register::Tcnt1h, 0xBE);
        mcu.write(Register::Tcnt1l, 0xEF);
        assert_eq!(mcu.timer1_count(), 0xBEEF);

        // Low byte first latches the high byte.
        let low = mcu.read(Register::Tcnt1l);
        mcu.write(Register::Tcnt1l, 0x00);
        let high = mcu.read(Register::Tcnt1h);
        assert_eq!((low, high), (0xEF, 0xBE));
    }

    #[test]
    fn low_byte_first_write_loses_high_byte() {
        let mcu = SimMcu::new();
        mcu.write(Register::Ocr1al, 0x34);
        mcu.write(Register::Ocr1ah, 0x12);
        assert_eq!(mcu.ocr1a(), 0x0034);
    }

    #[test]
    fn flag_registers_are_write_one_to_clear() {
        let mcu = SimMcu::new();
        mcu.raise(Vector::Timer0Overflow);
        mcu.raise(Vector::Timer1CompareA);
        mcu.write(Register::Tifr, bit(tifr::TOV0));
        assert_eq!(mcu.peek(Register::Tifr), bit(tifr::OCF1A));
    }

    #[test]
    fn counter_overflows_after_full_period() {
        let mcu = SimMcu::new();
        mcu.write(Register::Tccr0, 0x01); // normal mode, clk/1
        mcu.advance(255);
        assert_eq!(mcu.peek(Register::Tcnt0), 255);
        assert_eq!(mcu.peek(Register::Tifr) & bit(tifr::TOV0), 0);
        mcu.advance(1);
        assert_eq!(mcu.peek(Register::Tcnt0), 0);
        assert_ne!(mcu.peek(Register::Tifr) & bit(tifr::TOV0), 0);
    }

    #[test]
    fn polling_tifr_skips_to_next_event() {
        let mcu = SimMcu::new();
        mcu.write(Register::Ocr0, 0xFF);
        mcu.write(Register::Tccr0, 0x03); // clk/64
        mcu.read(Register::Tifr);
        assert_eq!(mcu.elapsed_cycles(), 255 * 64);
        assert_ne!(mcu.peek(Register::Tifr) & bit(tifr::OCF0), 0);
    }

    #[test]
    fn scheduled_request_raises_flag() {
        let mcu = SimMcu::new();
        mcu.schedule(2, Vector::Int0);
        mcu.advance(CPU_FREQ_HZ as u64 / 1000);
        assert!(mcu.peek(Register::Gifr) == 0);
        mcu.advance(CPU_FREQ_HZ as u64 / 1000);
        assert_ne!(mcu.peek(Register::Gifr), 0);
    }
}
