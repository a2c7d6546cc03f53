mod entity;
mod persist;

pub use entity::Entity;
pub(crate) use entity::Validator;
