//! Named-event pub/sub.
//!
//! Components that need to notify loosely coupled listeners (the frame clock in
//! particular) embed an [`EventEmitter`].

mod emitter;

pub use emitter::{EventEmitter, Listener};
