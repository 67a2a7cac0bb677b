use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::digital::v2::InputPin;

/// "Pressed since last checked", shared between the INT0 handler and the
/// main loop.
///
/// [`take`](Self::take) reads and clears in one critical section, so a
/// press that arrives around the check is either returned by it or left
/// for the next one. Several presses before a check count as one.
pub struct ButtonLatch {
    pressed: Mutex<Cell<bool>>,
}

impl ButtonLatch {
    pub const fn new() -> Self {
        Self {
            pressed: Mutex::new(Cell::new(false)),
        }
    }

    /// Record a press. Interrupt side.
    pub fn notify(&self) {
        critical_section::with(|cs| self.pressed.borrow(cs).set(true));
    }

    /// Consume a pending press.
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.pressed.borrow(cs).replace(false))
    }

    pub fn is_set(&self) -> bool {
        critical_section::with(|cs| self.pressed.borrow(cs).get())
    }
}

impl Default for ButtonLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Polled push button.
pub struct Button<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    pub fn read(&self) -> Result<ButtonState, P::Error> {
        let high = self.pin.is_high()?;
        let pressed = match self.polarity {
            Polarity::ActiveLow => !high,
            Polarity::ActiveHigh => high,
        };
        Ok(if pressed {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        })
    }

    pub fn is_pressed(&self) -> Result<bool, P::Error> {
        self.read().map(|s| s == ButtonState::Pressed)
    }

    pub fn release(self) -> P {
        self.pin
    }
}
