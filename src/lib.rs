//! Fixed-point PID controller.
//!
//! All controller math is done on scaled `i64` integers (scale 2^16), so a
//! given sequence of measurements and durations always produces the same
//! outputs, on any target, with or without an FPU.
//!
//! Features:
//! - `std` (default): host clock and [`IntegerPidController::update`]
//! - `defmt`: log through `defmt` instead of the `log` facade
//! - `embassy`: [`clock::EmbassyClock`] backed by `embassy-time`

#![no_std]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "defmt")]
pub use defmt as log;

#[cfg(not(feature = "defmt"))]
pub use log;

pub mod clock;
pub mod config;
pub mod error;
pub mod pid;
pub mod scale;

pub use clock::{Clock, ManualClock};
pub use config::{ConfigError, PidConfig};
pub use error::MinMaxError;
pub use pid::{DerivativeStart, IntegerPidController, Overflow};
pub use scale::{Gain, SCALE};

#[cfg(feature = "std")]
pub use clock::StdClock;
