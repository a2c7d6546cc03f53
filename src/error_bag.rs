use std::collections::HashMap;

/// Validation messages for one entity, keyed by attribute name.
/// Messages for an attribute keep the order they were added in.
#[derive(Clone, Debug, Default)]
pub struct ErrorBag {
    errors: HashMap<String, Vec<String>>,
}

impl ErrorBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: &str, message: &str) -> &mut Self {
        self.errors
            .entry(attribute.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// Total number of messages across all attributes.
    pub fn count(&self) -> usize {
        self.errors.values().map(|messages| messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Messages recorded against one attribute.
    pub fn on(&self, attribute: &str) -> &[String] {
        self.errors
            .get(attribute)
            .map(|messages| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str),
    {
        for (attribute, messages) in &self.errors {
            for message in messages {
                f(attribute, message);
            }
        }
    }

    pub fn all(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }
}
