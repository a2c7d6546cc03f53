use std::cell::RefCell;
use std::rc::Rc;

use recordset::{Entity, PersistAdapter, PersistDone, ReadDone};
use serde_json::{json, Map, Value};

pub fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().expect("fixture must be a JSON object").clone()
}

/// Stores merged snapshots keyed by id, assigning ids on create. Completes
/// every operation synchronously and supports `read`.
pub struct MemoryAdapter {
    next_id: RefCell<u64>,
    pub records: RefCell<Vec<Map<String, Value>>>,
}

impl MemoryAdapter {
    pub fn new() -> Rc<Self> {
        Rc::new(MemoryAdapter {
            next_id: RefCell::new(1),
            records: RefCell::new(Vec::new()),
        })
    }

    pub fn seeded(records: Vec<Map<String, Value>>) -> Rc<Self> {
        let adapter = MemoryAdapter::new();
        *adapter.records.borrow_mut() = records;
        adapter
    }
}

impl PersistAdapter for MemoryAdapter {
    fn create(&self, entity: &Entity, done: PersistDone) {
        let id = {
            let mut next = self.next_id.borrow_mut();
            let id = *next;
            *next += 1;
            id
        };
        entity.write("id", json!(id));
        self.records.borrow_mut().push(entity.read_all());
        done(true, vec![json!(id)]);
    }

    fn update(&self, entity: &Entity, done: PersistDone) {
        let id = entity.identity();
        let found = {
            let mut records = self.records.borrow_mut();
            match records.iter().position(|r| r.get("id") == id.as_ref()) {
                Some(index) => {
                    records[index] = entity.read_all();
                    true
                }
                None => false,
            }
        };
        if found {
            done(true, Vec::new());
        } else {
            done(false, vec![json!("no such record")]);
        }
    }

    fn destroy(&self, entity: &Entity, done: PersistDone) {
        let id = entity.identity();
        self.records
            .borrow_mut()
            .retain(|r| r.get("id") != id.as_ref());
        done(true, Vec::new());
    }

    fn read(&self, done: ReadDone) {
        done(self.records.borrow().clone());
    }
}

/// Fails every operation with a reason. Leaves `read` unimplemented, so
/// `load` against it is a no-op.
pub struct RejectingAdapter;

impl PersistAdapter for RejectingAdapter {
    fn create(&self, _entity: &Entity, done: PersistDone) {
        done(false, vec![json!("storage offline")]);
    }
    fn update(&self, _entity: &Entity, done: PersistDone) {
        done(false, vec![json!("storage offline")]);
    }
    fn destroy(&self, _entity: &Entity, done: PersistDone) {
        done(false, vec![json!("storage offline")]);
    }
}

/// Captures done callbacks so a test can complete operations later,
/// exercising the "may be invoked synchronously or later" contract.
pub struct DeferredAdapter {
    pub calls: RefCell<Vec<(&'static str, PersistDone)>>,
}

impl DeferredAdapter {
    pub fn new() -> Rc<Self> {
        Rc::new(DeferredAdapter {
            calls: RefCell::new(Vec::new()),
        })
    }

    pub fn pending_ops(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    /// Complete the oldest outstanding operation. Returns its name.
    pub fn resolve_next(&self, success: bool) -> Option<&'static str> {
        let (op, done) = {
            let mut calls = self.calls.borrow_mut();
            if calls.is_empty() {
                return None;
            }
            calls.remove(0)
        };
        done(success, Vec::new());
        Some(op)
    }
}

impl PersistAdapter for DeferredAdapter {
    fn create(&self, _entity: &Entity, done: PersistDone) {
        self.calls.borrow_mut().push(("create", done));
    }
    fn update(&self, _entity: &Entity, done: PersistDone) {
        self.calls.borrow_mut().push(("update", done));
    }
    fn destroy(&self, _entity: &Entity, done: PersistDone) {
        self.calls.borrow_mut().push(("destroy", done));
    }
}
