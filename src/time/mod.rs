//! Frame timing.
//!
//! [`Clock`] turns display refreshes into `tick` events. The runtime calls
//! [`Clock::refresh`] once per redraw; sketches subscribe to [`TICK`].

mod clock;

pub use clock::{Clock, TICK};
