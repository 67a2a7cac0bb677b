//! Pedestrian crossing traffic light for the ATmega32.
//!
//! `hal` drives the timers, PWM, external interrupts, GPIO and USART through
//! a [`hal::RegisterBus`]; `drivers` maps lamps and the push button onto
//! pins; `application` is the crossing state machine.

#![cfg_attr(not(test), no_std)]

pub mod logger;

pub mod application;
pub mod config;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod testing;

pub use error::{HalError, HalResult};
