use std::collections::HashMap;

fn fold(key: &str) -> String {
    key.to_ascii_lowercase()
}

/// Non-owning index from a case-insensitive key to a list position.
/// Inserting an existing key replaces its position (last insert wins);
/// the empty string is a valid key.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveIndex {
    map: HashMap<String, usize>,
}

impl CaseInsensitiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the position previously stored under `key`, if any.
    pub fn insert(&mut self, key: &str, position: usize) -> Option<usize> {
        self.map.insert(fold(key), position)
    }

    pub fn find(&self, key: &str) -> Option<usize> {
        self.map.get(&fold(key)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Case-insensitive key to every position carrying it, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveMultiIndex {
    map: HashMap<String, Vec<usize>>,
}

impl CaseInsensitiveMultiIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, position: usize) {
        self.map.entry(fold(key)).or_default().push(position);
    }

    pub fn find_all(&self, key: &str) -> &[usize] {
        self.map.get(&fold(key)).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
