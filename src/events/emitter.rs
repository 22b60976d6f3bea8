use std::collections::HashMap;
use std::rc::Rc;

/// A registered callback. Keep the `Rc` returned by [`EventEmitter::on`] to
/// remove it later.
pub type Listener = Rc<dyn Fn()>;

/// Synchronous, payload-free event dispatcher
///
/// Listeners run in registration order on the emitting thread. Emitting an event
/// nobody listens to is a no-op.
#[derive(Default)]
pub struct EventEmitter {
    events: HashMap<String, Vec<Listener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `event` and returns its handle
    pub fn on(&mut self, event: &str, callback: impl Fn() + 'static) -> Listener {
        let listener: Listener = Rc::new(callback);
        self.add_listener(event, listener.clone());
        listener
    }

    /// Registers an existing listener; the same listener may be added twice
    pub fn add_listener(&mut self, event: &str, listener: Listener) {
        self.events
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Removes the first registration of `listener` for `event`
    ///
    /// Returns `false` when it was not registered.
    pub fn remove(&mut self, event: &str, listener: &Listener) -> bool {
        let Some(listeners) = self.events.get_mut(event) else {
            return false;
        };
        match listeners.iter().position(|l| Rc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Calls every listener of `event` in registration order
    pub fn emit(&self, event: &str) {
        let Some(listeners) = self.events.get(event) else {
            return;
        };
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (event, listeners) in &self.events {
            map.entry(event, &listeners.len());
        }
        map.finish()
    }
}
