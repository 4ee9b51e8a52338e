//! Global discrete-event timing for the HLE kernel.
//!
//! All emulated time flows from a single monotonic virtual clock (nanoseconds since the session
//! started). Subsystems register named events once via [`EventScheduler::create_event`] and then
//! schedule/unschedule them at absolute virtual times. Whoever drives the clock (a unit test, the
//! machine loop, or a [`TimingThread`]) runs the callbacks of every event that becomes due.
//!
//! Unlike the device-side timer queue, callbacks are stored with the registration. A callback
//! captures whatever owner it fires for, so there is no `user_data -> instance` lookup.
#![forbid(unsafe_code)]

mod config;
mod core_timing;
mod driver;
mod error;
mod event;

pub use config::TimingConfig;
pub use core_timing::CoreTiming;
pub use driver::TimingThread;
pub use error::{Result, TimingError};
pub use event::{EventCallback, EventHandle, EventScheduler, EventType};
