//! Configuration constants for the traffic light firmware

use crate::hal::gpio::Port;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 8_000_000;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// Time each traffic light phase is held, in seconds
pub const STATE_HOLD_SECONDS: u8 = 5;

/// Granularity at which the pedestrian button is polled during a hold
pub const POLL_INTERVAL_MS: u16 = 1000;

/// LED pins as (port, bit), in `Light` order
pub const LED_PINS: [(Port, u8); 6] = [
    (Port::B, 0), // car red
    (Port::B, 1), // car yellow
    (Port::B, 2), // car green
    (Port::B, 3), // pedestrian red
    (Port::B, 4), // pedestrian yellow
    (Port::B, 5), // pedestrian green
];

/// Pedestrian button, wired to INT0 with the internal pull-up enabled
pub const BUTTON_PIN: (Port, u8) = (Port::D, 2);
