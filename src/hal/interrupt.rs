//! Interrupt callback table and dispatch.
//!
//! Each hardware interrupt source owns one callback slot. Registration and
//! dispatch both run inside a critical section, so an interrupt can never
//! observe a half-written slot. The table is a plain value: the firmware
//! keeps one in a `static` and its ISRs forward to [`InterruptTable::dispatch`].

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::{HalError, HalResult};
use crate::hal::registers::{bit, exti, gifr, tifr, timsk, Register, RegisterBus};

/// Interrupt callback. Runs with interrupts masked, so keep it short.
pub type Callback = fn();

/// Interrupt sources with a callback slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vector {
    Timer0Overflow,
    Timer0Compare,
    Timer1Overflow,
    Timer1CompareA,
    Timer1CompareB,
    Timer1Capture,
    Timer2Overflow,
    Timer2Compare,
    Int0,
    Int1,
    Int2,
}

const SLOT_COUNT: usize = 11;

impl Vector {
    pub const ALL: [Vector; SLOT_COUNT] = [
        Vector::Timer0Overflow,
        Vector::Timer0Compare,
        Vector::Timer1Overflow,
        Vector::Timer1CompareA,
        Vector::Timer1CompareB,
        Vector::Timer1Capture,
        Vector::Timer2Overflow,
        Vector::Timer2Compare,
        Vector::Int0,
        Vector::Int1,
        Vector::Int2,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    /// Mask register and bit enabling this source.
    pub const fn mask(self) -> (Register, u8) {
        match self {
            Vector::Timer0Overflow => (Register::Timsk, timsk::TOIE0),
            Vector::Timer0Compare => (Register::Timsk, timsk::OCIE0),
            Vector::Timer1Overflow => (Register::Timsk, timsk::TOIE1),
            Vector::Timer1CompareA => (Register::Timsk, timsk::OCIE1A),
            Vector::Timer1CompareB => (Register::Timsk, timsk::OCIE1B),
            Vector::Timer1Capture => (Register::Timsk, timsk::TICIE1),
            Vector::Timer2Overflow => (Register::Timsk, timsk::TOIE2),
            Vector::Timer2Compare => (Register::Timsk, timsk::OCIE2),
            Vector::Int0 => (Register::Gicr, exti::INT0),
            Vector::Int1 => (Register::Gicr, exti::INT1),
            Vector::Int2 => (Register::Gicr, exti::INT2),
        }
    }

    /// Flag register and bit signalling a pending request.
    pub const fn flag(self) -> (Register, u8) {
        match self {
            Vector::Timer0Overflow => (Register::Tifr, tifr::TOV0),
            Vector::Timer0Compare => (Register::Tifr, tifr::OCF0),
            Vector::Timer1Overflow => (Register::Tifr, tifr::TOV1),
            Vector::Timer1CompareA => (Register::Tifr, tifr::OCF1A),
            Vector::Timer1CompareB => (Register::Tifr, tifr::OCF1B),
            Vector::Timer1Capture => (Register::Tifr, tifr::ICF1),
            Vector::Timer2Overflow => (Register::Tifr, tifr::TOV2),
            Vector::Timer2Compare => (Register::Tifr, tifr::OCF2),
            Vector::Int0 => (Register::Gifr, gifr::INTF0),
            Vector::Int1 => (Register::Gifr, gifr::INTF1),
            Vector::Int2 => (Register::Gifr, gifr::INTF2),
        }
    }
}

/// One callback slot per [`Vector`].
pub struct InterruptTable {
    slots: Mutex<[Cell<Option<Callback>>; SLOT_COUNT]>,
}

impl InterruptTable {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const EMPTY: Cell<Option<Callback>> = Cell::new(None);
        Self {
            slots: Mutex::new([EMPTY; SLOT_COUNT]),
        }
    }

    /// Store `callback` without touching the mask bit.
    pub fn attach(&self, vector: Vector, callback: Option<Callback>) -> HalResult<()> {
        let callback = callback.ok_or(HalError::MissingCallback)?;
        critical_section::with(|cs| {
            self.slots.borrow(cs)[vector.index()].set(Some(callback));
        });
        Ok(())
    }

    /// Store `callback` and unmask the source, as one critical section.
    ///
    /// A missing callback is rejected: the previous slot content and the mask
    /// bit are both left as they were.
    pub fn enable<B: RegisterBus>(
        &self,
        bus: &B,
        vector: Vector,
        callback: Option<Callback>,
    ) -> HalResult<()> {
        let callback = callback.ok_or(HalError::MissingCallback)?;
        let (mask_reg, n) = vector.mask();
        critical_section::with(|cs| {
            self.slots.borrow(cs)[vector.index()].set(Some(callback));
            bus.set_bits(mask_reg, bit(n));
        });
        Ok(())
    }

    /// Unmask a source whose callback was stored earlier.
    pub fn unmask<B: RegisterBus>(&self, bus: &B, vector: Vector) {
        let (mask_reg, n) = vector.mask();
        critical_section::with(|_| bus.set_bits(mask_reg, bit(n)));
    }

    /// Mask the source. The stored callback stays registered.
    pub fn disable<B: RegisterBus>(&self, bus: &B, vector: Vector) {
        let (mask_reg, n) = vector.mask();
        critical_section::with(|_| bus.clear_bits(mask_reg, bit(n)));
    }

    /// Run the callback for `vector` and clear its pending flag.
    ///
    /// An empty slot only clears the flag.
    pub fn dispatch<B: RegisterBus>(&self, bus: &B, vector: Vector) {
        let (flag_reg, n) = vector.flag();
        critical_section::with(|cs| {
            if let Some(callback) = self.slots.borrow(cs)[vector.index()].get() {
                callback();
            }
            // Flags are write-one-to-clear; a read-modify-write would also
            // clear every other pending flag in the register.
            bus.write(flag_reg, bit(n));
        });
    }

    pub fn is_registered(&self, vector: Vector) -> bool {
        critical_section::with(|cs| self.slots.borrow(cs)[vector.index()].get().is_some())
    }

    pub fn is_enabled<B: RegisterBus>(&self, bus: &B, vector: Vector) -> bool {
        let (mask_reg, n) = vector.mask();
        bus.is_set(mask_reg, bit(n))
    }
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self::new()
    }
}
