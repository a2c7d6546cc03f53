use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::adapter::PersistAdapter;
use crate::entity::{Entity, Validator};
use crate::event_hub::{EventHub, ListenerToken};

/// An ordered sequence of entities, deduplicated by identity, with an
/// optional persistence adapter, querying/derivation operations, and event
/// capability.
///
/// Like `Entity`, this is a cheap handle over shared state. Derivative sets
/// (`select`, `sorted_by`, `reversed`, ...) share configuration but own an
/// independent item sequence; mutating a derivative never mutates its source.
pub struct EntitySet {
    inner: Rc<RefCell<SetInner>>,
}

pub(crate) struct SetInner {
    items: Vec<Entity>,
    identity_key: String,
    defaults: Map<String, Value>,
    adapter: Option<Rc<dyn PersistAdapter>>,
    validator: Option<Validator>,
    parent: Option<Weak<RefCell<SetInner>>>,
    hub: EventHub,
}

impl EntitySet {
    pub fn new() -> Self {
        EntitySet {
            inner: Rc::new(RefCell::new(SetInner {
                items: Vec::new(),
                identity_key: "id".to_string(),
                defaults: Map::new(),
                adapter: None,
                validator: None,
                parent: None,
                hub: EventHub::new(),
            })),
        }
    }

    /// Attribute name used to compute identities for membership comparisons.
    pub fn with_identity_key(self, key: impl Into<String>) -> Self {
        self.inner.borrow_mut().identity_key = key.into();
        self
    }

    /// Default-attribute template merged under constructor input when a raw
    /// attribute map is promoted to an entity.
    pub fn with_defaults(self, defaults: Map<String, Value>) -> Self {
        self.inner.borrow_mut().defaults = defaults;
        self
    }

    /// Validator hook attached to every promoted entity.
    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&Entity) + 'static,
    {
        self.inner.borrow_mut().validator = Some(Rc::new(validator));
        self
    }

    pub(crate) fn from_inner(inner: Rc<RefCell<SetInner>>) -> Self {
        EntitySet { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<SetInner>> {
        Rc::downgrade(&self.inner)
    }

    pub fn ptr_eq(a: &EntitySet, b: &EntitySet) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn identity_key(&self) -> String {
        self.inner.borrow().identity_key.clone()
    }

    pub fn defaults(&self) -> Map<String, Value> {
        self.inner.borrow().defaults.clone()
    }

    // --- membership ---------------------------------------------------------

    /// Admit an entity. An already-present handle is a no-op; a defined
    /// identity matching an existing item merges the incoming attributes into
    /// that item instead of duplicating it; otherwise the entity is appended
    /// and `add` fires with it.
    pub fn admit(&self, entity: Entity) -> &Self {
        {
            let inner = self.inner.borrow();
            if inner.items.iter().any(|item| Entity::ptr_eq(item, &entity)) {
                return self;
            }
        }

        if let Some(identity) = entity.identity() {
            if let Some(existing) = self.lookup(&identity) {
                existing.write_many(entity.read_all());
                return self;
            }
        }

        entity.bind_owner(self);
        self.inner.borrow_mut().items.push(entity.clone());
        self.trigger("add", &entity);
        self
    }

    /// Promote a raw attribute map to an entity (set defaults merged under
    /// it, this set's identity key and validator attached), then admit it.
    pub fn admit_attrs(&self, attrs: Map<String, Value>) -> &Self {
        let entity = self.promote(attrs);
        self.admit(entity)
    }

    /// Admit each record in order.
    pub fn admit_many(&self, records: Vec<Map<String, Value>>) -> &Self {
        for record in records {
            self.admit_attrs(record);
        }
        self
    }

    pub(crate) fn promote(&self, attrs: Map<String, Value>) -> Entity {
        let inner = self.inner.borrow();
        Entity::from_parts(
            inner.identity_key.clone(),
            inner.defaults.clone(),
            attrs,
            inner.validator.clone(),
        )
    }

    /// Remove the exact entity (pointer scan). Fires `remove` on success.
    pub fn evict(&self, entity: &Entity) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            match inner
                .items
                .iter()
                .position(|item| Entity::ptr_eq(item, entity))
            {
                Some(index) => {
                    inner.items.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.trigger("remove", entity);
        }
        removed
    }

    /// Shallow copy of the item sequence.
    pub fn all(&self) -> Vec<Entity> {
        self.inner.borrow().items.clone()
    }

    // --- persistence plumbing -----------------------------------------------

    /// Install an adapter. The factory is called with this set; installing
    /// again overwrites. There is no concurrency guard: the model is
    /// single-threaded.
    pub fn install_adapter<F>(&self, factory: F) -> &Self
    where
        F: FnOnce(&EntitySet) -> Rc<dyn PersistAdapter>,
    {
        let adapter = factory(self);
        self.inner.borrow_mut().adapter = Some(adapter);
        self
    }

    pub fn adapter(&self) -> Option<Rc<dyn PersistAdapter>> {
        self.inner.borrow().adapter.clone()
    }

    pub fn load(&self) -> &Self {
        self.load_with(|_records| {})
    }

    /// Ask the adapter to read raw records, admit each one, then hand the
    /// raw array to the callback. Without an adapter, or with an adapter
    /// that has no read capability, nothing happens and the callback is
    /// never invoked.
    pub fn load_with<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(Vec<Map<String, Value>>) + 'static,
    {
        if let Some(adapter) = self.adapter() {
            let set = self.clone();
            adapter.read(Box::new(move |records| {
                for record in &records {
                    set.admit_attrs(record.clone());
                }
                callback(records);
            }));
        }
        self
    }

    // --- derivation support -------------------------------------------------

    /// New set sharing this set's configuration (identity key, defaults,
    /// adapter, validator) with its own item sequence and a parent
    /// back-reference here. Reference only; never ownership of this set's
    /// lifecycle.
    pub(crate) fn derive(&self, items: Vec<Entity>) -> EntitySet {
        let inner = self.inner.borrow();
        EntitySet {
            inner: Rc::new(RefCell::new(SetInner {
                items,
                identity_key: inner.identity_key.clone(),
                defaults: inner.defaults.clone(),
                adapter: inner.adapter.clone(),
                validator: inner.validator.clone(),
                parent: Some(Rc::downgrade(&self.inner)),
                hub: EventHub::new(),
            })),
        }
    }

    /// The set this one was derived from, if any and still alive.
    pub fn parent(&self) -> Option<EntitySet> {
        self.inner
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(EntitySet::from_inner)
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

    pub fn trigger(&self, event: &str, payload: &Entity) {
        let listeners = self.inner.borrow().hub.snapshot(event);
        for listener in listeners {
            listener(payload);
        }
    }

    // --- serialization ------------------------------------------------------

    /// Ordered array of each member's confirmed snapshot. Intentionally the
    /// stored attributes, not the merged pending view: the collection-level
    /// serialization is asymmetric with `Entity::to_json`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.all()
                .iter()
                .map(|entity| Value::Object(entity.confirmed()))
                .collect(),
        )
    }
}

impl Default for EntitySet {
    fn default() -> Self {
        EntitySet::new()
    }
}

impl Clone for EntitySet {
    fn clone(&self) -> Self {
        EntitySet {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EntitySet")
            .field("identity_key", &inner.identity_key)
            .field("items", &inner.items)
            .field("has_adapter", &inner.adapter.is_some())
            .finish()
    }
}

impl Serialize for EntitySet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
