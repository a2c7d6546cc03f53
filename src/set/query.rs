use std::cmp::Ordering;

use serde_json::Value;

use crate::entity::Entity;

use super::EntitySet;

/// Linear queries over the item sequence, and the derivation operations that
/// produce a new independent set from this one.
impl EntitySet {
    /// First entity whose identity loosely equals the argument. Loose means
    /// numbers compare across integer/float/string forms.
    pub fn lookup(&self, identity: &Value) -> Option<Entity> {
        self.detect(|entity| {
            entity
                .identity()
                .map_or(false, |candidate| loose_eq(&candidate, identity))
        })
    }

    pub fn detect<F>(&self, mut predicate: F) -> Option<Entity>
    where
        F: FnMut(&Entity) -> bool,
    {
        self.all().into_iter().find(|entity| predicate(entity))
    }

    pub fn count(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn first(&self) -> Option<Entity> {
        self.all().into_iter().next()
    }

    pub fn last(&self) -> Option<Entity> {
        self.all().into_iter().last()
    }

    /// Merged-view reads of one attribute across all items.
    pub fn pluck(&self, attribute: &str) -> Vec<Option<Value>> {
        self.all()
            .iter()
            .map(|entity| entity.read(attribute))
            .collect()
    }

    pub fn each<F>(&self, mut f: F) -> &Self
    where
        F: FnMut(&Entity),
    {
        for entity in self.all() {
            f(&entity);
        }
        self
    }

    pub fn map_items<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&Entity) -> T,
    {
        self.all().iter().map(|entity| f(entity)).collect()
    }

    /// Raw predicate scan returning a plain vector; `select` is the
    /// set-producing counterpart.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Entity>
    where
        F: FnMut(&Entity) -> bool,
    {
        self.all()
            .into_iter()
            .filter(|entity| predicate(entity))
            .collect()
    }

    /// Derivative set of the matching entities.
    pub fn select<F>(&self, predicate: F) -> EntitySet
    where
        F: FnMut(&Entity) -> bool,
    {
        let items = self.filter(predicate);
        self.derive(items)
    }

    /// Derivative set ordered by one attribute: numbers and strings compare
    /// with less-than/greater-than, everything else ties, and ties keep the
    /// underlying stable order.
    pub fn sorted_by(&self, attribute: &str) -> EntitySet {
        self.sorted_by_fn(|a, b| {
            compare_values(a.read(attribute).as_ref(), b.read(attribute).as_ref())
        })
    }

    pub fn sorted_by_fn<F>(&self, mut cmp: F) -> EntitySet
    where
        F: FnMut(&Entity, &Entity) -> Ordering,
    {
        let mut items = self.all();
        items.sort_by(|a, b| cmp(a, b));
        self.derive(items)
    }

    /// Derivative set with the item order reversed.
    pub fn reversed(&self) -> EntitySet {
        let mut items = self.all();
        items.reverse();
        self.derive(items)
    }
}

pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(number), Value::String(text))
        | (Value::String(text), Value::Number(number)) => {
            match (text.trim().parse::<f64>(), number.as_f64()) {
                (Ok(parsed), Some(value)) => parsed == value,
                _ => false,
            }
        }
        _ => false,
    }
}

pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
