//! Hosts that pull audio out of an [`AudioEngine`](crate::graph::AudioEngine).
//!
//! - [`CpalOutput`] plays through the default output device.
//! - [`OfflineDriver`] renders on a background thread without a device, at
//!   real-time pace or faster. Used headless and in tests.
//! - [`open_output`] tries the former and falls back to the latter.

mod offline;
mod output;

pub use offline::{DriverMonitor, OfflineDriver};
pub use output::{open_output, CpalOutput, FALLBACK_SAMPLE_RATE};
