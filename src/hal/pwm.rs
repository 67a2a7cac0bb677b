//! Fast PWM on the four output compare pins.
//!
//! Every channel runs its timer in 8-bit fast PWM with OCn cleared on
//! compare match, so the duty cycle is `compare / top`. Pwm1 and Pwm2 share
//! Timer1 and therefore its clock.

use crate::config::CPU_FREQ_HZ;
use crate::error::{HalError, HalResult};
use crate::hal::registers::RegisterBus;
use crate::hal::timer::{
    ClockSource, CompareAction, CompareUnit, CountMode, TimerSetup, Timers,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmChannel {
    /// OC0 (PB3), Timer0
    Pwm0,
    /// OC1A (PD5), Timer1 unit A
    Pwm1,
    /// OC1B (PD4), Timer1 unit B
    Pwm2,
    /// OC2 (PD7), Timer2
    Pwm3,
}

/// Prescaler taps tried from slowest to fastest.
const DIVIDERS: [(u32, ClockSource); 4] = [
    (1024, ClockSource::Div1024),
    (256, ClockSource::Div256),
    (64, ClockSource::Div64),
    (8, ClockSource::Div8),
];

/// Pick the slowest prescaler that still leaves a non-zero count for
/// `frequency_hz` over a 256-step period, falling back to the undivided
/// clock.
pub fn select_clock(clock_hz: u32, frequency_hz: u32) -> HalResult<ClockSource> {
    if frequency_hz == 0 {
        return Err(HalError::ZeroFrequency);
    }
    let steps = clock_hz / frequency_hz.saturating_mul(256);
    Ok(DIVIDERS
        .iter()
        .find(|(div, _)| steps / div != 0)
        .map_or(ClockSource::Direct, |&(_, clock)| clock))
}

/// Compare value for `duty` percent of `top`. Duty above 100 is clamped.
pub const fn duty_to_compare(top: u16, duty: u8) -> u16 {
    let duty = if duty > 100 { 100 } else { duty };
    (top as u32 * duty as u32 / 100) as u16
}

impl<'v, B: RegisterBus> Timers<'v, B> {
    /// Start `channel` in fast PWM near `frequency_hz` with 0 % duty.
    /// Returns the clock source that was selected.
    pub fn pwm_init(&mut self, channel: PwmChannel, frequency_hz: u32) -> HalResult<ClockSource> {
        let clock = select_clock(CPU_FREQ_HZ, frequency_hz)?;
        let setup = TimerSetup::new(clock, CountMode::FastPwm, CompareAction::Clear);
        match channel {
            PwmChannel::Pwm0 => self.timer0.configure(0, setup)?,
            PwmChannel::Pwm1 => self.timer1.configure(0, setup.on_unit(CompareUnit::A))?,
            PwmChannel::Pwm2 => self.timer1.configure(0, setup.on_unit(CompareUnit::B))?,
            PwmChannel::Pwm3 => self.timer2.configure(0, setup)?,
        }
        self.pwm_write(channel, 0);
        Ok(clock)
    }

    /// Set the duty cycle of `channel` in percent.
    pub fn pwm_write(&mut self, channel: PwmChannel, duty: u8) {
        let compare = duty_to_compare(self.pwm_top(channel), duty);
        match channel {
            PwmChannel::Pwm0 => self.timer0.set_compare_value(compare as u8),
            PwmChannel::Pwm1 => self.timer1.set_compare_value(CompareUnit::A, compare),
            PwmChannel::Pwm2 => self.timer1.set_compare_value(CompareUnit::B, compare),
            PwmChannel::Pwm3 => self.timer2.set_compare_value(compare as u8),
        }
    }

    /// Duty cycle currently programmed on `channel`, in percent, rounded
    /// down.
    pub fn pwm_duty(&self, channel: PwmChannel) -> u8 {
        let top = self.pwm_top(channel) as u32;
        if top == 0 {
            return 0;
        }
        (self.pwm_compare(channel) as u32 * 100 / top) as u8
    }

    pub fn pwm_compare(&self, channel: PwmChannel) -> u16 {
        match channel {
            PwmChannel::Pwm0 => self.timer0.compare_value() as u16,
            PwmChannel::Pwm1 => self.timer1.compare_value(CompareUnit::A),
            PwmChannel::Pwm2 => self.timer1.compare_value(CompareUnit::B),
            PwmChannel::Pwm3 => self.timer2.compare_value() as u16,
        }
    }

    pub fn pwm_top(&self, channel: PwmChannel) -> u16 {
        match channel {
            PwmChannel::Pwm0 => self.timer0.top() as u16,
            PwmChannel::Pwm1 | PwmChannel::Pwm2 => self.timer1.top(),
            PwmChannel::Pwm3 => self.timer2.top() as u16,
        }
    }
}
