use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::digital::v2::{InputPin, OutputPin, StatefulOutputPin, ToggleableOutputPin};

use crate::hal::registers::{bit, Register, RegisterBus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
    D,
}

impl Port {
    /// (PINx, DDRx, PORTx)
    const fn registers(self) -> (Register, Register, Register) {
        match self {
            Port::A => (Register::Pina, Register::Ddra, Register::Porta),
            Port::B => (Register::Pinb, Register::Ddrb, Register::Portb),
            Port::C => (Register::Pinc, Register::Ddrc, Register::Portc),
            Port::D => (Register::Pind, Register::Ddrd, Register::Portd),
        }
    }
}

pub trait PinMode {}
pub struct Input;
pub struct Output;
impl PinMode for Input {}
impl PinMode for Output {}

/// One port bit. Pins come out of reset as floating inputs.
#[derive(Debug)]
pub struct Pin<B, MODE> {
    bus: B,
    port: Port,
    mask: u8,
    _mode: PhantomData<MODE>,
}

impl<B: RegisterBus> Pin<B, Input> {
    pub fn new(bus: B, port: Port, n: u8) -> Self {
        Self {
            bus,
            port,
            mask: bit(n & 0x07),
            _mode: PhantomData,
        }
    }
}

impl<B: RegisterBus, MODE: PinMode> Pin<B, MODE> {
    pub fn into_output(self) -> Pin<B, Output> {
        let (_, ddr, _) = self.port.registers();
        critical_section::with(|_| self.bus.set_bits(ddr, self.mask));
        self.retype()
    }

    pub fn into_floating_input(self) -> Pin<B, Input> {
        let (_, ddr, port) = self.port.registers();
        critical_section::with(|_| {
            self.bus.clear_bits(ddr, self.mask);
            self.bus.clear_bits(port, self.mask);
        });
        self.retype()
    }

    pub fn into_pull_up_input(self) -> Pin<B, Input> {
        let (_, ddr, port) = self.port.registers();
        critical_section::with(|_| {
            self.bus.clear_bits(ddr, self.mask);
            self.bus.set_bits(port, self.mask);
        });
        self.retype()
    }

    fn retype<M>(self) -> Pin<B, M> {
        Pin {
            bus: self.bus,
            port: self.port,
            mask: self.mask,
            _mode: PhantomData,
        }
    }
}

impl<B: RegisterBus> OutputPin for Pin<B, Output> {
    type Error = Infallible;

    #[inline]
    fn set_high(&mut self) -> Result<(), Infallible> {
        let (_, _, port) = self.port.registers();
        critical_section::with(|_| self.bus.set_bits(port, self.mask));
        Ok(())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Infallible> {
        let (_, _, port) = self.port.registers();
        critical_section::with(|_| self.bus.clear_bits(port, self.mask));
        Ok(())
    }
}

impl<B: RegisterBus> StatefulOutputPin for Pin<B, Output> {
    fn is_set_high(&self) -> Result<bool, Infallible> {
        let (_, _, port) = self.port.registers();
        Ok(self.bus.is_set(port, self.mask))
    }

    fn is_set_low(&self) -> Result<bool, Infallible> {
        self.is_set_high().map(|high| !high)
    }
}

// PINx is read-only on the ATmega32, so toggling goes through PORTx.
impl<B: RegisterBus> ToggleableOutputPin for Pin<B, Output> {
    type Error = Infallible;

    fn toggle(&mut self) -> Result<(), Infallible> {
        let (_, _, port) = self.port.registers();
        let mask = self.mask;
        critical_section::with(|_| self.bus.modify(port, |r| r ^ mask));
        Ok(())
    }
}

impl<B: RegisterBus> InputPin for Pin<B, Input> {
    type Error = Infallible;

    #[inline]
    fn is_high(&self) -> Result<bool, Infallible> {
        let (pin, _, _) = self.port.registers();
        Ok(self.bus.is_set(pin, self.mask))
    }

    #[inline]
    fn is_low(&self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimMcu;
    use core::sync::atomic::{AtomicU8, Ordering};
    use std::time::Duration;

    #[test]
    fn output_drives_port_bit() {
        let mcu = SimMcu::new();
        let mut led = Pin::new(&mcu, Port::B, 3).into_output();
        assert_eq!(mcu.peek(Register::Ddrb), 0b0000_1000);

        led.set_high().unwrap();
        assert_eq!(mcu.peek(Register::Portb), 0b0000_1000);
        assert!(led.is_set_high().unwrap());

        led.toggle().unwrap();
        assert_eq!(mcu.peek(Register::Portb), 0);
        assert!(led.is_set_low().unwrap());
    }

    #[test]
    fn pull_up_input_reads_pin_register() {
        let mcu = SimMcu::new();
        let button = Pin::new(&mcu, Port::D, 2).into_pull_up_input();
        assert_eq!(mcu.peek(Register::Portd), 0b0000_0100);
        assert_eq!(mcu.peek(Register::Ddrd), 0);

        mcu.poke(Register::Pind, 0b0000_0100);
        assert!(button.is_high().unwrap());
        mcu.poke(Register::Pind, 0);
        assert!(button.is_low().unwrap());
    }

    #[test]
    fn pins_share_a_port_without_interference() {
        let mcu = SimMcu::new();
        let mut red = Pin::new(&mcu, Port::B, 0).into_output();
        let mut green = Pin::new(&mcu, Port::B, 2).into_output();

        red.set_high().unwrap();
        green.set_high().unwrap();
        red.set_low().unwrap();
        assert_eq!(mcu.peek(Register::Portb), 0b0000_0100);
    }

    struct SharedPorts([AtomicU8; Register::COUNT]);

    impl RegisterBus for SharedPorts {
        fn read(&self, reg: Register) -> u8 {
            self.0[reg.index()].load(Ordering::SeqCst)
        }

        fn write(&self, reg: Register, value: u8) {
            self.0[reg.index()].store(value, Ordering::SeqCst)
        }
    }

    #[test]
    fn port_updates_wait_for_critical_section() {
        let ports = SharedPorts(core::array::from_fn(|_| AtomicU8::new(0)));
        let mut led = Pin::new(&ports, Port::B, 1).into_output();

        std::thread::scope(|s| {
            let writer = critical_section::with(|_| {
                let writer = s.spawn(move || {
                    led.set_high().unwrap();
                    led.set_low().unwrap();
                    led.set_high().unwrap();
                });
                std::thread::sleep(Duration::from_millis(50));
                assert_eq!(ports.read(Register::Portb), 0);
                writer
            });
            writer.join().unwrap();
        });
        assert_eq!(ports.read(Register::Portb), 0b0000_0010);
    }
}
