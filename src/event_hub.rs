use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::entity::Entity;

/// Every event in the system carries the triggering entity as payload.
pub type Listener = Rc<dyn Fn(&Entity)>;

/// Handle returned by `bind`/`once`, used to unbind a specific listener.
/// Closures have no identity in Rust, so removal goes through the token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerToken(u64);

/// Mapping from event name to the ordered list of listeners for it.
///
/// Embedded by composition in both `Entity` and `EntitySet`; dispatch runs
/// over a snapshot of the listener list, so a listener may bind, unbind, or
/// trigger reentrantly. A listener unbound during a trigger still fires for
/// that trigger and never after.
#[derive(Default)]
pub struct EventHub {
    listeners: HashMap<String, Vec<(ListenerToken, Listener)>>,
    next_token: u64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; listeners fire in registration order.
    pub fn bind<F>(&mut self, event: &str, listener: F) -> ListenerToken
    where
        F: Fn(&Entity) + 'static,
    {
        self.push(event, Rc::new(listener))
    }

    /// Register a listener that fires at most once.
    pub fn once<F>(&mut self, event: &str, listener: F) -> ListenerToken
    where
        F: Fn(&Entity) + 'static,
    {
        let fired = Cell::new(false);
        self.push(
            event,
            Rc::new(move |payload: &Entity| {
                if fired.replace(true) {
                    return;
                }
                listener(payload);
            }),
        )
    }

    fn push(&mut self, event: &str, listener: Listener) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push((token, listener));
        token
    }

    /// Remove one listener. Returns whether anything was removed.
    pub fn unbind(&mut self, event: &str, token: ListenerToken) -> bool {
        match self.listeners.get_mut(event) {
            Some(list) => {
                let before = list.len();
                list.retain(|(t, _)| *t != token);
                before != list.len()
            }
            None => false,
        }
    }

    /// Remove every listener for an event.
    pub fn unbind_all(&mut self, event: &str) {
        self.listeners.remove(event);
    }

    /// Clone out the current listener list for dispatch.
    pub fn snapshot(&self, event: &str) -> Vec<Listener> {
        self.listeners
            .get(event)
            .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&Entity) + 'static {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(tag)
    }

    fn dispatch(hub: &EventHub, event: &str) {
        let payload = Entity::new();
        for listener in hub.snapshot(event) {
            listener(&payload);
        }
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        hub.bind("change", record(&log, "first"));
        hub.bind("change", record(&log, "second"));

        dispatch(&hub, "change");
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn unbind_removes_only_the_given_listener() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        let first = hub.bind("change", record(&log, "first"));
        hub.bind("change", record(&log, "second"));

        assert!(hub.unbind("change", first));
        assert!(!hub.unbind("change", first));
        assert_eq!(hub.listener_count("change"), 1);

        dispatch(&hub, "change");
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn unbind_all_clears_one_event_only() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        hub.bind("add", record(&log, "add"));
        hub.bind("remove", record(&log, "remove"));

        hub.unbind_all("add");
        assert_eq!(hub.listener_count("add"), 0);
        assert_eq!(hub.listener_count("remove"), 1);
    }

    #[test]
    fn once_fires_at_most_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hub = EventHub::new();
        hub.once("create", record(&log, "once"));

        dispatch(&hub, "create");
        dispatch(&hub, "create");
        assert_eq!(*log.borrow(), vec!["once"]);
    }

    #[test]
    fn snapshot_of_unknown_event_is_empty() {
        let hub = EventHub::new();
        assert!(hub.snapshot("nothing").is_empty());
        assert_eq!(hub.listener_count("nothing"), 0);
    }
}
