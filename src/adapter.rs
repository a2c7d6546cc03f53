use serde_json::{Map, Value};

use crate::entity::Entity;

/// Completion callback for a persistence operation. The adapter must invoke
/// it exactly once, in the same turn or later. The leading boolean reports
/// success; any extra values are forwarded verbatim to the caller's callback.
pub type PersistDone = Box<dyn FnOnce(bool, Vec<Value>)>;

/// Completion callback for `read`: the raw attribute records found in storage.
pub type ReadDone = Box<dyn FnOnce(Vec<Map<String, Value>>)>;

/// Contract an external storage backend implements. The core never inspects
/// an adapter beyond calling these methods; membership changes and events are
/// driven by the core's own commit routine, never by adapter code, so every
/// adapter stays symmetric.
///
/// The core does not retry, time out, or assume synchronous completion.
/// Timeouts, if desired, belong to the adapter.
pub trait PersistAdapter {
    fn create(&self, entity: &Entity, done: PersistDone);
    fn update(&self, entity: &Entity, done: PersistDone);
    fn destroy(&self, entity: &Entity, done: PersistDone);

    /// Adapters without read support keep this default; `EntitySet::load`
    /// then silently does nothing.
    fn read(&self, _done: ReadDone) {}
}
