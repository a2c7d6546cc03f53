use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error_bag::ErrorBag;
use crate::event_hub::{EventHub, ListenerToken};
use crate::set::{EntitySet, SetInner};

pub(crate) type Validator = Rc<dyn Fn(&Entity)>;

/// One tracked record: a confirmed attribute set, a pending change set, an
/// identity, an error bag, and event capability.
///
/// `Entity` is a cheap handle over shared state; cloning it clones the
/// handle, not the record. Reading an attribute returns the pending value if
/// one exists, else the confirmed value. Pending values become confirmed only
/// through `commit_and_clear`, which the persistence commit routine calls
/// after an adapter reports success.
pub struct Entity {
    inner: Rc<RefCell<EntityInner>>,
}

struct EntityInner {
    confirmed: Map<String, Value>,
    pending: Map<String, Value>,
    identity_key: String,
    uid: String,
    errors: ErrorBag,
    hub: EventHub,
    validator: Option<Validator>,
    owner: Option<Weak<RefCell<SetInner>>>,
}

impl Entity {
    pub fn new() -> Self {
        Self::from_parts("id".to_string(), Map::new(), Map::new(), None)
    }

    pub fn with_attrs(attrs: Map<String, Value>) -> Self {
        Self::from_parts("id".to_string(), Map::new(), attrs, None)
    }

    pub fn with_identity_key(self, key: impl Into<String>) -> Self {
        self.inner.borrow_mut().identity_key = key.into();
        self
    }

    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&Entity) + 'static,
    {
        self.inner.borrow_mut().validator = Some(Rc::new(validator));
        self
    }

    /// Construction always merges the default-attribute template under the
    /// supplied attributes. Used directly and by `EntitySet` promotion.
    pub(crate) fn from_parts(
        identity_key: String,
        defaults: Map<String, Value>,
        attrs: Map<String, Value>,
        validator: Option<Validator>,
    ) -> Self {
        let mut confirmed = defaults;
        for (name, value) in attrs {
            confirmed.insert(name, value);
        }

        Entity {
            inner: Rc::new(RefCell::new(EntityInner {
                confirmed,
                pending: Map::new(),
                identity_key,
                uid: Uuid::new_v4().to_string(),
                errors: ErrorBag::new(),
                hub: EventHub::new(),
                validator,
                owner: None,
            })),
        }
    }

    /// Two handles are the same entity when they share state.
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Display/debug token assigned at construction. Never the identity.
    pub fn uid(&self) -> String {
        self.inner.borrow().uid.clone()
    }

    pub fn identity_key(&self) -> String {
        self.inner.borrow().identity_key.clone()
    }

    // --- attribute protocol -------------------------------------------------

    /// Fresh merged snapshot: confirmed overlaid by pending.
    pub fn read_all(&self) -> Map<String, Value> {
        let inner = self.inner.borrow();
        let mut merged = inner.confirmed.clone();
        for (name, value) in &inner.pending {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Pending value if present, else confirmed value, else `None`.
    pub fn read(&self, name: &str) -> Option<Value> {
        let inner = self.inner.borrow();
        inner
            .pending
            .get(name)
            .or_else(|| inner.confirmed.get(name))
            .cloned()
    }

    /// Stage a value. Writing the confirmed value back removes any stale
    /// pending entry, so a no-op write never shows up as dirty. Emits
    /// `change:<name>` with this entity as payload.
    pub fn write(&self, name: &str, value: Value) -> &Self {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.confirmed.get(name) == Some(&value) {
                inner.pending.remove(name);
            } else {
                inner.pending.insert(name.to_string(), value);
            }
        }
        self.trigger(&format!("change:{}", name));
        self
    }

    /// `write` per key, then a single `change` event on top of the
    /// per-attribute events already emitted inside the loop.
    pub fn write_many(&self, attrs: Map<String, Value>) -> &Self {
        for (name, value) in attrs {
            self.write(&name, value);
        }
        self.trigger("change");
        self
    }

    /// Snapshot of the confirmed (stored) attributes.
    pub fn confirmed(&self) -> Map<String, Value> {
        self.inner.borrow().confirmed.clone()
    }

    /// Snapshot of the pending change set.
    pub fn pending(&self) -> Map<String, Value> {
        self.inner.borrow().pending.clone()
    }

    /// Value of the identity key in the merged view. `None` means the key is
    /// absent: the entity has not been persisted yet.
    pub fn identity(&self) -> Option<Value> {
        let key = self.identity_key();
        self.read(&key)
    }

    pub fn is_new(&self) -> bool {
        self.identity().is_none()
    }

    /// Merge pending into confirmed, clear pending, clear the error bag.
    /// Called by the commit routine after a successful persistence operation;
    /// exposed for manual use.
    pub fn commit_and_clear(&self) -> &Self {
        let mut inner = self.inner.borrow_mut();
        let pending = std::mem::take(&mut inner.pending);
        for (name, value) in pending {
            inner.confirmed.insert(name, value);
        }
        inner.errors.clear();
        self
    }

    // --- validation ---------------------------------------------------------

    pub fn add_error(&self, attribute: &str, message: &str) -> &Self {
        self.inner.borrow_mut().errors.add(attribute, message);
        self
    }

    pub fn clear_errors(&self) -> &Self {
        self.inner.borrow_mut().errors.clear();
        self
    }

    /// Snapshot of the error bag.
    pub fn errors(&self) -> ErrorBag {
        self.inner.borrow().errors.clone()
    }

    pub fn error_count(&self) -> usize {
        self.inner.borrow().errors.count()
    }

    /// Clear the error bag, run the validator hook, report whether the bag
    /// stayed empty. The hook is a no-op when unset.
    pub fn is_valid(&self) -> bool {
        self.inner.borrow_mut().errors.clear();
        let validator = self.inner.borrow().validator.clone();
        if let Some(validate) = validator {
            validate(self);
        }
        self.inner.borrow().errors.count() == 0
    }

    // --- events -------------------------------------------------------------

    pub fn bind<F>(&self, event: &str, listener: F) -> ListenerToken
    where
        F: Fn(&Entity) + 'static,
    {
        self.inner.borrow_mut().hub.bind(event, listener)
    }

    pub fn once<F>(&self, event: &str, listener: F) -> ListenerToken
    where
        F: Fn(&Entity) + 'static,
    {
        self.inner.borrow_mut().hub.once(event, listener)
    }

    pub fn unbind(&self, event: &str, token: ListenerToken) -> bool {
        self.inner.borrow_mut().hub.unbind(event, token)
    }

    pub fn unbind_all(&self, event: &str) {
        self.inner.borrow_mut().hub.unbind_all(event);
    }

    /// Fire an event with this entity as payload. Listeners run in
    /// registration order, synchronously, over a snapshot of the listener
    /// list; no borrow is held while they run, so reentrant calls are fine.
    pub fn trigger(&self, event: &str) {
        let listeners = self.inner.borrow().hub.snapshot(event);
        for listener in listeners {
            listener(self);
        }
    }

    // --- ownership ----------------------------------------------------------

    pub(crate) fn bind_owner(&self, set: &EntitySet) {
        self.inner.borrow_mut().owner = Some(set.downgrade());
    }

    /// The owning set, if it is still alive.
    pub(crate) fn owner(&self) -> Option<EntitySet> {
        self.inner
            .borrow()
            .owner
            .as_ref()
            .and_then(Weak::upgrade)
            .map(EntitySet::from_inner)
    }

    // --- serialization ------------------------------------------------------

    /// The merged attribute view. Note the asymmetry: `EntitySet::to_json`
    /// serializes each member's confirmed snapshot instead.
    pub fn to_json(&self) -> Value {
        Value::Object(self.read_all())
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::new()
    }
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        Entity {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Entity")
            .field("uid", &inner.uid)
            .field("identity_key", &inner.identity_key)
            .field("confirmed", &inner.confirmed)
            .field("pending", &inner.pending)
            .finish()
    }
}

impl Serialize for Entity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
