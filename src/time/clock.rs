use std::time::{Duration, Instant};

use crate::events::{EventEmitter, Listener};

/// Name of the event emitted once per display refresh while the clock runs
pub const TICK: &str = "tick";

/// Per-frame driver
///
/// The clock starts running as soon as it is created. [`refresh`](Clock::refresh)
/// is called on every display refresh regardless of state; it only emits while
/// running, so `start` after `stop` resumes on the very next refresh.
#[derive(Debug)]
pub struct Clock {
    events: EventEmitter,
    running: bool,
    start_time: Instant,
    frames: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            events: EventEmitter::new(),
            running: true,
            start_time: Instant::now(),
            frames: 0,
        }
    }

    pub fn on(&mut self, event: &str, callback: impl Fn() + 'static) -> Listener {
        self.events.on(event, callback)
    }

    pub fn remove(&mut self, event: &str, listener: &Listener) -> bool {
        self.events.remove(event, listener)
    }

    pub fn emit(&self, event: &str) {
        self.events.emit(event);
    }

    /// Display-refresh callback
    pub fn refresh(&mut self) {
        if self.running {
            self.frames = self.frames.wrapping_add(1);
            self.events.emit(TICK);
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::debug!("clock started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            log::debug!("clock stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of ticks emitted so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Wall-clock time since construction, unaffected by `stop`/`start`
    pub fn elapsed_time(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_clock() -> (Clock, Rc<Cell<u32>>) {
        let ticks = Rc::new(Cell::new(0));
        let mut clock = Clock::new();
        let counter = ticks.clone();
        clock.on(TICK, move || counter.set(counter.get() + 1));
        (clock, ticks)
    }

    #[test]
    fn test_clock_starts_running() {
        let (mut clock, ticks) = counting_clock();
        assert!(clock.is_running());
        clock.refresh();
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_stopped_clock_does_not_tick() {
        let (mut clock, ticks) = counting_clock();
        clock.stop();
        for _ in 0..10 {
            clock.refresh();
        }
        assert_eq!(ticks.get(), 0);
        assert_eq!(clock.frames(), 0);
    }

    #[test]
    fn test_start_resumes_on_next_refresh() {
        let (mut clock, ticks) = counting_clock();
        clock.stop();
        clock.refresh();
        clock.start();
        clock.refresh();
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (mut clock, ticks) = counting_clock();
        clock.start();
        clock.start();
        clock.refresh();
        clock.stop();
        clock.stop();
        clock.refresh();
        clock.start();
        clock.refresh();
        assert_eq!(ticks.get(), 2);
        assert_eq!(clock.frames(), 2);
    }

    #[test]
    fn test_removed_listener_stops_ticking() {
        let ticks = Rc::new(Cell::new(0));
        let mut clock = Clock::new();
        let counter = ticks.clone();
        let listener = clock.on(TICK, move || counter.set(counter.get() + 1));
        clock.refresh();
        assert!(clock.remove(TICK, &listener));
        clock.refresh();
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn test_elapsed_time_ignores_stop() {
        let mut clock = Clock::new();
        let before = clock.elapsed_time();
        clock.stop();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.elapsed_time() > before);
        assert!(clock.elapsed_time() >= Duration::from_millis(5));
    }
}
