use core::convert::Infallible;

use crate::hal::registers::RegisterBus;
use crate::hal::Uart;

/// Line-oriented text output on the USART. Newlines go out as CR LF.
pub struct SerialConsole<B> {
    uart: Uart<B>,
}

impl<B: RegisterBus> SerialConsole<B> {
    pub fn new(bus: B, baud: u32) -> Self {
        Self {
            uart: Uart::new(bus, baud),
        }
    }

    pub fn write_line(&mut self, s: &str) {
        self.put(s);
        self.uart.write_str("\r\n");
    }

    fn put(&mut self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.uart.write_byte(b'\r');
            }
            self.uart.write_byte(byte);
        }
    }
}

impl<B: RegisterBus> ufmt::uWrite for SerialConsole<B> {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        self.put(s);
        Ok(())
    }
}
