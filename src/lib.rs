mod adapter;
mod entity;
mod error_bag;
mod event_hub;
mod set;

pub use adapter::{PersistAdapter, PersistDone, ReadDone};
pub use entity::Entity;
pub use error_bag::ErrorBag;
pub use event_hub::{EventHub, Listener, ListenerToken};
pub use set::EntitySet;

// Re-export the attribute value types from serde_json
pub use serde_json::{Map, Value};
