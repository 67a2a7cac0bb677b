//! Pedestrian crossing state machine.
//!
//! Each state holds its lamp pattern for a fixed time and then moves on.
//! What a button press does depends on the state: the car phases cut short
//! to the pedestrian sequence, the pedestrian phases swallow it. The
//! behaviour lives in one table, [`State::phase`].

use embedded_hal::blocking::delay::DelayMs;
use ufmt::{uDisplay, uWrite, Formatter};

use crate::config::{POLL_INTERVAL_MS, STATE_HOLD_SECONDS};
use crate::drivers::{ButtonLatch, Light, Lights};
use crate::logger::Logger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Init,
    CarsGreen,
    CarsYellow,
    CarsRed,
    PedestrianInit,
    PedestrianGreen,
    PedestrianFinal,
}

/// Reaction to a pending button press while a state is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnPress {
    /// The button is not looked at.
    NotPolled,
    /// Checked before every poll interval; a press ends the hold early.
    Jump(State),
    /// Presses are consumed and dropped.
    Absorb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hold {
    /// Leave immediately.
    Skip,
    /// Wait one poll interval at a time, blinking and watching the button.
    Polled,
    /// Wait the whole hold time in a single delay.
    Blocking,
}

pub struct Phase {
    pub next: State,
    pub on_press: OnPress,
    pub hold: Hold,
    /// Lamps switched on when the state is entered; the rest go dark.
    pub lit: &'static [Light],
    /// Lamps toggled after every poll interval.
    pub blink: &'static [Light],
}

static PHASES: [Phase; 7] = [
    // Init
    Phase {
        next: State::CarsGreen,
        on_press: OnPress::NotPolled,
        hold: Hold::Skip,
        lit: &[],
        blink: &[],
    },
    // CarsGreen
    Phase {
        next: State::CarsYellow,
        on_press: OnPress::Jump(State::PedestrianInit),
        hold: Hold::Polled,
        lit: &[Light::CarGreen, Light::PedestrianRed],
        blink: &[],
    },
    // CarsYellow
    Phase {
        next: State::CarsRed,
        on_press: OnPress::Jump(State::PedestrianInit),
        hold: Hold::Polled,
        lit: &[Light::CarGreen, Light::CarYellow, Light::PedestrianRed],
        blink: &[Light::CarYellow],
    },
    // CarsRed
    Phase {
        next: State::CarsGreen,
        on_press: OnPress::Jump(State::PedestrianGreen),
        hold: Hold::Polled,
        lit: &[Light::CarRed, Light::PedestrianRed],
        blink: &[],
    },
    // PedestrianInit
    Phase {
        next: State::PedestrianGreen,
        on_press: OnPress::Absorb,
        hold: Hold::Polled,
        lit: &[Light::CarGreen, Light::CarYellow, Light::PedestrianYellow],
        blink: &[Light::CarYellow, Light::PedestrianYellow],
    },
    // PedestrianGreen
    Phase {
        next: State::PedestrianFinal,
        on_press: OnPress::Absorb,
        hold: Hold::Blocking,
        lit: &[Light::CarRed, Light::PedestrianGreen],
        blink: &[],
    },
    // PedestrianFinal
    Phase {
        next: State::CarsGreen,
        on_press: OnPress::Absorb,
        hold: Hold::Polled,
        lit: &[
            Light::CarRed,
            Light::CarYellow,
            Light::PedestrianGreen,
            Light::PedestrianYellow,
        ],
        blink: &[Light::CarYellow, Light::PedestrianYellow],
    },
];

impl State {
    pub fn phase(self) -> &'static Phase {
        &PHASES[self as usize]
    }

    pub const fn name(self) -> &'static str {
        match self {
            State::Init => "INIT",
            State::CarsGreen => "CARS_GREEN",
            State::CarsYellow => "CARS_YELLOW",
            State::CarsRed => "CARS_RED",
            State::PedestrianInit => "PEDESTRIAN_INIT",
            State::PedestrianGreen => "PEDESTRIAN_GREEN",
            State::PedestrianFinal => "PEDESTRIAN_FINAL",
        }
    }
}

impl uDisplay for State {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(self.name())
    }
}

/// The crossing controller: owns the delay source, the lamps and the log,
/// and reads presses from a shared [`ButtonLatch`].
pub struct TrafficLight<'b, D, L, W> {
    state: State,
    delay: D,
    lights: L,
    button: &'b ButtonLatch,
    log: Logger<W>,
    hold_seconds: u8,
    poll_ms: u16,
}

impl<'b, D, L, W> TrafficLight<'b, D, L, W>
where
    D: DelayMs<u16>,
    L: Lights,
    W: uWrite,
{
    pub fn new(delay: D, lights: L, button: &'b ButtonLatch, log: Logger<W>) -> Self {
        Self {
            state: State::Init,
            delay,
            lights,
            button,
            log,
            hold_seconds: STATE_HOLD_SECONDS,
            poll_ms: POLL_INTERVAL_MS,
        }
    }

    pub fn with_timing(mut self, hold_seconds: u8, poll_ms: u16) -> Self {
        self.hold_seconds = hold_seconds;
        self.poll_ms = poll_ms;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn lights(&self) -> &L {
        &self.lights
    }

    pub fn into_parts(self) -> (D, L, Logger<W>) {
        (self.delay, self.lights, self.log)
    }

    /// Run the current state's hold to completion and switch to the state
    /// it leads to.
    pub fn step(&mut self) -> State {
        let from = self.state;
        let next = self.hold(from);
        crate::info!(self.log, "state {} -> {}", from, next);
        self.state = next;
        next
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    fn hold(&mut self, state: State) -> State {
        let phase = state.phase();
        match phase.hold {
            Hold::Skip => return phase.next,
            Hold::Polled | Hold::Blocking => self.lights.show(phase.lit),
        }

        if phase.hold == Hold::Blocking {
            let total = (self.hold_seconds as u16).saturating_mul(self.poll_ms);
            self.delay.delay_ms(total);
            self.absorb(state, phase.on_press);
            return phase.next;
        }

        for _ in 0..self.hold_seconds {
            if let OnPress::Jump(target) = phase.on_press {
                if self.button.take() {
                    crate::info!(self.log, "button in {}", state);
                    return target;
                }
            }
            self.delay.delay_ms(self.poll_ms);
            for &light in phase.blink {
                self.lights.toggle(light);
            }
            self.absorb(state, phase.on_press);
        }
        phase.next
    }

    fn absorb(&mut self, state: State, on_press: OnPress) {
        if on_press == OnPress::Absorb && self.button.take() {
            crate::debug!(self.log, "button ignored in {}", state);
        }
    }
}
