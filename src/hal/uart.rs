//! Polled USART transmitter.

use core::convert::Infallible;

use embedded_hal::serial;

use crate::config::CPU_FREQ_HZ;
use crate::hal::registers::{bit, usart, Register, RegisterBus};

const UBRR_MAX: u32 = 0x0FFF;

/// UBRR value for `baud` in normal-speed asynchronous mode, clamped to the
/// 12-bit register. Rates above `clock_hz / 16` give the fastest setting.
pub const fn ubrr_for(clock_hz: u32, baud: u32) -> u16 {
    if baud == 0 {
        return UBRR_MAX as u16;
    }
    let ubrr = (clock_hz / 16 / baud).saturating_sub(1);
    if ubrr > UBRR_MAX {
        UBRR_MAX as u16
    } else {
        ubrr as u16
    }
}

pub struct Uart<B> {
    bus: B,
}

impl<B: RegisterBus> Uart<B> {
    /// Transmitter only, 8N1.
    pub fn new(bus: B, baud: u32) -> Self {
        let [high, low] = ubrr_for(CPU_FREQ_HZ, baud).to_be_bytes();
        // UBRRH and UCSRC share an address; URSEL picks UCSRC.
        bus.write(Register::Ubrrh, high & 0x0F);
        bus.write(Register::Ubrrl, low);
        bus.write(
            Register::Ubrrh,
            bit(usart::URSEL) | bit(usart::UCSZ1) | bit(usart::UCSZ0),
        );
        bus.write(Register::Ucsrb, bit(usart::TXEN));
        Self { bus }
    }

    pub fn write_byte(&mut self, byte: u8) {
        let _ = nb::block!(serial::Write::write(self, byte));
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }

    fn ready(&self) -> bool {
        self.bus.is_set(Register::Ucsra, bit(usart::UDRE))
    }
}

impl<B: RegisterBus> serial::Write<u8> for Uart<B> {
    type Error = Infallible;

    fn write(&mut self, word: u8) -> nb::Result<(), Infallible> {
        if !self.ready() {
            return Err(nb::Error::WouldBlock);
        }
        self.bus.write(Register::Udr, word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Infallible> {
        if self.ready() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
