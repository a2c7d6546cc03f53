use serde_json::Value;

use crate::adapter::PersistDone;

use super::Entity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PersistOp {
    Create,
    Update,
    Destroy,
}

impl PersistOp {
    fn event_name(self) -> &'static str {
        match self {
            PersistOp::Create => "create",
            PersistOp::Update => "update",
            PersistOp::Destroy => "destroy",
        }
    }
}

/// Persistence commit protocol.
///
/// Every save/destroy goes through one commit routine: the adapter's done
/// callback is wrapped so that committing pending attributes, managing
/// collection membership, and firing the operation event always happen here,
/// never in adapter code. The adapter only reports success or failure.
impl Entity {
    pub fn save(&self) -> &Self {
        self.save_with(|_success, _extra| {})
    }

    /// Validate, then create or update depending on `is_new`. An invalid
    /// entity short-circuits to `callback(false, vec![])` with no adapter
    /// call and no event.
    pub fn save_with<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(bool, Vec<Value>) + 'static,
    {
        if !self.is_valid() {
            callback(false, Vec::new());
            return self;
        }

        let op = if self.is_new() {
            PersistOp::Create
        } else {
            PersistOp::Update
        };
        self.run_persist(op, callback);
        self
    }

    pub fn destroy(&self) -> &Self {
        self.destroy_with(|_success, _extra| {})
    }

    /// Destroy skips validation entirely.
    pub fn destroy_with<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(bool, Vec<Value>) + 'static,
    {
        self.run_persist(PersistOp::Destroy, callback);
        self
    }

    fn run_persist<F>(&self, op: PersistOp, callback: F)
    where
        F: FnOnce(bool, Vec<Value>) + 'static,
    {
        let adapter = self.owner().and_then(|set| set.adapter());
        let entity = self.clone();

        let done: PersistDone = Box::new(move |success, extra| {
            if success {
                entity.commit_and_clear();

                if let Some(set) = entity.owner() {
                    if op == PersistOp::Destroy {
                        set.evict(&entity);
                    } else {
                        // Idempotent by identity: an entity already in the
                        // set stays a single item.
                        set.admit(entity.clone());
                    }
                }

                entity.trigger(op.event_name());
            }

            // Failure details from the adapter propagate untouched.
            callback(success, extra);
        });

        match adapter {
            Some(adapter) => match op {
                PersistOp::Create => adapter.create(self, done),
                PersistOp::Update => adapter.update(self, done),
                PersistOp::Destroy => adapter.destroy(self, done),
            },
            // No adapter installed: the operation is defined to succeed,
            // synchronously.
            None => done(true, Vec::new()),
        }
    }
}
