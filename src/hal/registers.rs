//! Register access layer.
//!
//! Every peripheral driver in this crate talks to the MCU through the
//! [`RegisterBus`] trait. On the device the bus is [`Mmio`], which resolves
//! each [`Register`] through the `avr-device` ATmega32A definitions. The
//! host test suite swaps in the simulated MCU from `hal::sim`.

/// The ATmega32 I/O registers the drivers use.
///
/// Timer1's 16-bit registers are split into their low and high bytes so the
/// drivers control the TEMP-latch access order. `Ubrrh` is the location
/// shared with UCSRC; URSEL selects which one a write lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    // USART
    Ubrrl,
    Ucsrb,
    Ucsra,
    Udr,
    Ubrrh,
    // Digital I/O
    Pind,
    Ddrd,
    Portd,
    Pinc,
    Ddrc,
    Portc,
    Pinb,
    Ddrb,
    Portb,
    Pina,
    Ddra,
    Porta,
    // Timer/Counter2
    Ocr2,
    Tcnt2,
    Tccr2,
    // Timer/Counter1
    Icr1l,
    Icr1h,
    Ocr1bl,
    Ocr1bh,
    Ocr1al,
    Ocr1ah,
    Tcnt1l,
    Tcnt1h,
    Tccr1b,
    Tccr1a,
    // Timer/Counter0
    Tcnt0,
    Tccr0,
    Ocr0,
    // External interrupts
    Mcucsr,
    Mcucr,
    Gifr,
    Gicr,
    // Timer interrupt flag and mask
    Tifr,
    Timsk,
}

impl Register {
    pub const COUNT: usize = Register::Timsk as usize + 1;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// TCCR0 / TCCR2 bit positions (identical layout on both 8-bit timers).
pub mod tccr8 {
    pub const CS0: u8 = 0;
    pub const CS1: u8 = 1;
    pub const CS2: u8 = 2;
    pub const WGM1: u8 = 3;
    pub const COM0: u8 = 4;
    pub const COM1: u8 = 5;
    pub const WGM0: u8 = 6;
    pub const FOC: u8 = 7;
}

/// TCCR1A bit positions.
pub mod tccr1a {
    pub const WGM10: u8 = 0;
    pub const WGM11: u8 = 1;
    pub const FOC1B: u8 = 2;
    pub const FOC1A: u8 = 3;
    pub const COM1B0: u8 = 4;
    pub const COM1B1: u8 = 5;
    pub const COM1A0: u8 = 6;
    pub const COM1A1: u8 = 7;
}

/// TCCR1B bit positions.
pub mod tccr1b {
    pub const CS10: u8 = 0;
    pub const CS11: u8 = 1;
    pub const CS12: u8 = 2;
    pub const WGM12: u8 = 3;
    pub const WGM13: u8 = 4;
    pub const ICES1: u8 = 6;
    pub const ICNC1: u8 = 7;
}

/// TIMSK bit positions.
pub mod timsk {
    pub const TOIE0: u8 = 0;
    pub const OCIE0: u8 = 1;
    pub const TOIE1: u8 = 2;
    pub const OCIE1B: u8 = 3;
    pub const OCIE1A: u8 = 4;
    pub const TICIE1: u8 = 5;
    pub const TOIE2: u8 = 6;
    pub const OCIE2: u8 = 7;
}

/// TIFR bit positions.
pub mod tifr {
    pub const TOV0: u8 = 0;
    pub const OCF0: u8 = 1;
    pub const TOV1: u8 = 2;
    pub const OCF1B: u8 = 3;
    pub const OCF1A: u8 = 4;
    pub const ICF1: u8 = 5;
    pub const TOV2: u8 = 6;
    pub const OCF2: u8 = 7;
}

/// GIFR bit positions.
pub mod gifr {
    pub const INTF2: u8 = 5;
    pub const INTF0: u8 = 6;
    pub const INTF1: u8 = 7;
}

/// MCUCR / MCUCSR / GICR bit positions used by the external interrupts.
pub mod exti {
    pub const ISC00: u8 = 0;
    pub const ISC01: u8 = 1;
    pub const ISC10: u8 = 2;
    pub const ISC11: u8 = 3;
    pub const ISC2: u8 = 6;
    pub const INT2: u8 = 5;
    pub const INT0: u8 = 6;
    pub const INT1: u8 = 7;
}

/// UCSRA / UCSRB / UCSRC bit positions.
pub mod usart {
    pub const UDRE: u8 = 5;
    pub const TXEN: u8 = 3;
    pub const RXEN: u8 = 4;
    pub const UCSZ0: u8 = 1;
    pub const UCSZ1: u8 = 2;
    pub const URSEL: u8 = 7;
}

#[inline(always)]
pub const fn bit(n: u8) -> u8 {
    1 << n
}

/// Byte-wide access to the MCU's I/O registers.
pub trait RegisterBus {
    fn read(&self, reg: Register) -> u8;

    fn write(&self, reg: Register, value: u8);

    #[inline]
    fn modify<F: FnOnce(u8) -> u8>(&self, reg: Register, f: F) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    #[inline]
    fn set_bits(&self, reg: Register, mask: u8) {
        self.modify(reg, |r| r | mask);
    }

    #[inline]
    fn clear_bits(&self, reg: Register, mask: u8) {
        self.modify(reg, |r| r & !mask);
    }

    /// Replace the bits selected by `mask` with `bits`, leaving the rest.
    #[inline]
    fn write_field(&self, reg: Register, mask: u8, bits: u8) {
        self.modify(reg, |r| (r & !mask) | (bits & mask));
    }

    #[inline]
    fn is_set(&self, reg: Register, mask: u8) -> bool {
        self.read(reg) & mask != 0
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    #[inline]
    fn read(&self, reg: Register) -> u8 {
        (**self).read(reg)
    }

    #[inline]
    fn write(&self, reg: Register, value: u8) {
        (**self).write(reg, value)
    }
}

/// The real peripheral registers, reached through the `avr-device`
/// register blocks.
#[cfg(target_arch = "avr")]
#[derive(Clone, Copy, Debug, Default)]
pub struct Mmio;

#[cfg(target_arch = "avr")]
mod device {
    use avr_device::atmega32a::{EXINT, PORTA, PORTB, PORTC, PORTD, TC0, TC1, TC2, USART};

    use super::{Mmio, Register, RegisterBus};

    macro_rules! byte_registers {
        ($($reg:ident => $periph:ident . $field:ident),* $(,)?) => {
            fn read_byte(reg: Register) -> Option<u8> {
                // SAFETY: single-byte reads of memory-mapped I/O.
                unsafe {
                    match reg {
                        $(Register::$reg => Some((*$periph::ptr()).$field.read().bits()),)*
                        _ => None,
                    }
                }
            }

            fn write_byte(reg: Register, value: u8) -> bool {
                // SAFETY: every bit pattern is accepted by these registers;
                // the drivers own the field layout.
                unsafe {
                    match reg {
                        $(Register::$reg => {
                            (*$periph::ptr()).$field.write(|w| w.bits(value));
                            true
                        })*
                        _ => false,
                    }
                }
            }
        };
    }

    byte_registers! {
        Ubrrl => USART.ubrrl,
        Ucsrb => USART.ucsrb,
        Ucsra => USART.ucsra,
        Udr => USART.udr,
        Pind => PORTD.pind,
        Ddrd => PORTD.ddrd,
        Portd => PORTD.portd,
        Pinc => PORTC.pinc,
        Ddrc => PORTC.ddrc,
        Portc => PORTC.portc,
        Pinb => PORTB.pinb,
        Ddrb => PORTB.ddrb,
        Portb => PORTB.portb,
        Pina => PORTA.pina,
        Ddra => PORTA.ddra,
        Porta => PORTA.porta,
        Ocr2 => TC2.ocr2,
        Tcnt2 => TC2.tcnt2,
        Tccr2 => TC2.tccr2,
        Tccr1b => TC1.tccr1b,
        Tccr1a => TC1.tccr1a,
        Tcnt0 => TC0.tcnt0,
        Tccr0 => TC0.tccr0,
        Ocr0 => TC0.ocr0,
        Mcucsr => EXINT.mcucsr,
        Mcucr => EXINT.mcucr,
        Gifr => EXINT.gifr,
        Gicr => EXINT.gicr,
        Tifr => TC0.tifr,
        Timsk => TC0.timsk,
    }

    /// Byte address of the halves of the 16-bit Timer1 registers and of the
    /// UBRRH/UCSRC location. Byte order matters for the TEMP latch, so
    /// these are accessed one byte at a time.
    fn byte_ptr(reg: Register) -> *mut u8 {
        // SAFETY: only addresses are formed here.
        unsafe {
            let tc1 = &*TC1::ptr();
            let (base, high) = match reg {
                Register::Icr1l => (tc1.icr1.as_ptr() as *mut u8, false),
                Register::Icr1h => (tc1.icr1.as_ptr() as *mut u8, true),
                Register::Ocr1bl => (tc1.ocr1b.as_ptr() as *mut u8, false),
                Register::Ocr1bh => (tc1.ocr1b.as_ptr() as *mut u8, true),
                Register::Ocr1al => (tc1.ocr1a.as_ptr() as *mut u8, false),
                Register::Ocr1ah => (tc1.ocr1a.as_ptr() as *mut u8, true),
                Register::Tcnt1l => (tc1.tcnt1.as_ptr() as *mut u8, false),
                Register::Tcnt1h => (tc1.tcnt1.as_ptr() as *mut u8, true),
                // Ubrrh, the only other register not in `byte_registers!`.
                _ => ((*USART::ptr()).ubrrh().as_ptr(), false),
            };
            if high {
                base.add(1)
            } else {
                base
            }
        }
    }

    impl RegisterBus for Mmio {
        #[inline]
        fn read(&self, reg: Register) -> u8 {
            match read_byte(reg) {
                Some(value) => value,
                // SAFETY: `byte_ptr` points into the Timer1 or USART block.
                None => unsafe { core::ptr::read_volatile(byte_ptr(reg)) },
            }
        }

        #[inline]
        fn write(&self, reg: Register, value: u8) {
            if !write_byte(reg, value) {
                // SAFETY: see `read`.
                unsafe { core::ptr::write_volatile(byte_ptr(reg), value) }
            }
        }
    }
}
