#![no_std]

#[cfg(test)]
extern crate std;

mod error;

pub mod calibration;
pub mod channel;
pub mod config;
pub mod device;
pub mod interface;
mod log;
pub mod params;
pub mod registers;
pub mod retry;

pub use crate::calibration::CalibrationData;
pub use crate::channel::BusChannel;
pub use crate::config::Config;
pub use crate::device::Bmp180;
pub use crate::error::{Error, Result};
pub use crate::interface::BusSource;
pub use crate::params::{Oversampling, OversamplingSetting};
pub use crate::retry::RetryPolicy;
