mod entity_set;
mod query;

pub use entity_set::EntitySet;
pub(crate) use entity_set::SetInner;
