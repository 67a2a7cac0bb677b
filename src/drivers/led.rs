use embedded_hal::digital::v2::OutputPin;

/// The six lamps of the crossing, in board wiring order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Light {
    CarRed,
    CarYellow,
    CarGreen,
    PedestrianRed,
    PedestrianYellow,
    PedestrianGreen,
}

impl Light {
    pub const ALL: [Light; 6] = [
        Light::CarRed,
        Light::CarYellow,
        Light::CarGreen,
        Light::PedestrianRed,
        Light::PedestrianYellow,
        Light::PedestrianGreen,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Logical lamp control.
pub trait Lights {
    fn set(&mut self, light: Light);

    fn clear(&mut self, light: Light);

    fn toggle(&mut self, light: Light);

    fn is_on(&self, light: Light) -> bool;

    /// Light exactly the lamps in `lit`.
    fn show(&mut self, lit: &[Light]) {
        for light in Light::ALL {
            if lit.contains(&light) {
                self.set(light);
            } else {
                self.clear(light);
            }
        }
    }
}

/// Six active-high LEDs. The bank remembers what it drove, so toggling
/// works on pins that cannot be read back.
pub struct LedBank<P> {
    leds: [P; 6],
    states: [bool; 6],
}

impl<P: OutputPin> LedBank<P> {
    /// Takes the pins in [`Light::ALL`] order and switches everything off.
    pub fn new(leds: [P; 6]) -> Self {
        let mut bank = Self {
            leds,
            states: [false; 6],
        };
        bank.set_all(false);
        bank
    }

    pub fn set_all(&mut self, state: bool) {
        for light in Light::ALL {
            self.drive(light, state);
        }
    }

    pub fn release(self) -> [P; 6] {
        self.leds
    }

    fn drive(&mut self, light: Light, on: bool) {
        let led = &mut self.leds[light.index()];
        // Board pins are infallible
        let _ = if on { led.set_high() } else { led.set_low() };
        self.states[light.index()] = on;
    }
}

impl<P: OutputPin> Lights for LedBank<P> {
    fn set(&mut self, light: Light) {
        self.drive(light, true);
    }

    fn clear(&mut self, light: Light) {
        self.drive(light, false);
    }

    fn toggle(&mut self, light: Light) {
        let on = self.states[light.index()];
        self.drive(light, !on);
    }

    fn is_on(&self, light: Light) -> bool {
        self.states[light.index()]
    }
}
