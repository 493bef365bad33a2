use std::collections::HashMap;

use super::clip::Clip;

/// An explicit clip store, keyed by clip name.
///
/// Passed by value or reference wherever clips are looked up — there is
/// deliberately no global registry, so independent schedulers (or tests
/// running side by side) never share hidden state.
#[derive(Debug, Default, Clone)]
pub struct ClipRegistry {
    clips: HashMap<String, Clip>,
}

impl ClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a clip under its own name, replacing any previous entry.
    pub fn insert(&mut self, clip: Clip) -> Option<Clip> {
        self.clips.insert(clip.name.clone(), clip)
    }

    pub fn get(&self, name: &str) -> Option<&Clip> {
        self.clips.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Clip> {
        self.clips.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }
}
