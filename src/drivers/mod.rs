pub mod button;
pub mod led;
pub mod serial_console;

pub use button::{Button, ButtonLatch, ButtonState, Polarity};
pub use led::{LedBank, Light, Lights};
pub use serial_console::SerialConsole;
