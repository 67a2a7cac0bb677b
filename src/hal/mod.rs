pub mod exti;
pub mod gpio;
pub mod interrupt;
pub mod pwm;
pub mod registers;
pub mod timer;
pub mod uart;

#[cfg(test)]
pub mod sim;

// Re-export commonly used types
pub use exti::{ExtLine, ExternalInterrupts, Sense};
pub use gpio::{Input, Output, Pin, Port};
pub use interrupt::{Callback, InterruptTable, Vector};
pub use pwm::PwmChannel;
#[cfg(target_arch = "avr")]
pub use registers::Mmio;
pub use registers::{Register, RegisterBus};
pub use timer::{
    ClockSource, CompareAction, CompareUnit, CountMode, Timer16, Timer8, TimerSetup, Timers,
};
pub use uart::Uart;
