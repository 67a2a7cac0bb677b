//! External interrupt lines INT0, INT1 and INT2.

use crate::error::{HalError, HalResult};
use crate::hal::interrupt::{Callback, InterruptTable, Vector};
use crate::hal::registers::{bit, exti, gifr, Register, RegisterBus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtLine {
    /// PD2
    Int0,
    /// PD3
    Int1,
    /// PB2, edge triggered only
    Int2,
}

/// What on the pin raises the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    LowLevel,
    AnyChange,
    FallingEdge,
    RisingEdge,
}

impl Sense {
    const fn isc_bits(self) -> u8 {
        match self {
            Sense::LowLevel => 0b00,
            Sense::AnyChange => 0b01,
            Sense::FallingEdge => 0b10,
            Sense::RisingEdge => 0b11,
        }
    }
}

impl ExtLine {
    pub const fn vector(self) -> Vector {
        match self {
            ExtLine::Int0 => Vector::Int0,
            ExtLine::Int1 => Vector::Int1,
            ExtLine::Int2 => Vector::Int2,
        }
    }
}

pub struct ExternalInterrupts<'v, B> {
    bus: B,
    vectors: &'v InterruptTable,
}

impl<'v, B: RegisterBus> ExternalInterrupts<'v, B> {
    pub fn new(bus: B, vectors: &'v InterruptTable) -> Self {
        Self { bus, vectors }
    }

    /// Store `callback` for `line` and program its sense control. The line
    /// stays masked until [`enable`](Self::enable).
    ///
    /// Nothing is changed when the sense is unsupported or the callback is
    /// missing.
    pub fn init(&mut self, line: ExtLine, sense: Sense, callback: Option<Callback>) -> HalResult<()> {
        let rising = match (line, sense) {
            (ExtLine::Int2, Sense::FallingEdge) => Some(false),
            (ExtLine::Int2, Sense::RisingEdge) => Some(true),
            (ExtLine::Int2, _) => return Err(HalError::UnsupportedSense),
            _ => None,
        };
        self.vectors.attach(line.vector(), callback)?;

        match (line, rising) {
            (ExtLine::Int0, _) => self.bus.write_field(
                Register::Mcucr,
                bit(exti::ISC00) | bit(exti::ISC01),
                sense.isc_bits() << exti::ISC00,
            ),
            (ExtLine::Int1, _) => self.bus.write_field(
                Register::Mcucr,
                bit(exti::ISC10) | bit(exti::ISC11),
                sense.isc_bits() << exti::ISC10,
            ),
            (ExtLine::Int2, rising) => {
                // Changing ISC2 can raise INTF2 by itself.
                let mask = bit(exti::ISC2);
                let bits = if rising == Some(true) { mask } else { 0 };
                self.bus.write_field(Register::Mcucsr, mask, bits);
                self.bus.write(Register::Gifr, bit(gifr::INTF2));
            }
        }
        Ok(())
    }

    pub fn enable(&mut self, line: ExtLine) {
        self.vectors.unmask(&self.bus, line.vector());
    }

    pub fn disable(&mut self, line: ExtLine) {
        self.vectors.disable(&self.bus, line.vector());
    }
}
