//! Static topic rename table
//!
//! Operators can give devices readable names: `{"EM/5": "power/main"}` makes
//! the meter publish on `<name>/status/power/main` instead of
//! `<name>/status/EM/5`. Fragments without an entry pass through unchanged.

use std::collections::HashMap;

/// Load-once mapping from canonical fragment to external topic name.
#[derive(Debug, Clone, Default)]
pub struct TopicMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl TopicMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let reverse = entries
            .iter()
            .map(|(fragment, topic)| (topic.clone(), fragment.clone()))
            .collect();
        Self {
            forward: entries,
            reverse,
        }
    }

    /// Returns the configured name for `fragment`, or `fragment` itself.
    pub fn map<'a>(&'a self, fragment: &'a str) -> &'a str {
        self.forward
            .get(fragment)
            .map(String::as_str)
            .unwrap_or(fragment)
    }

    /// Inverse of [`TopicMap::map`], used for command topics.
    ///
    /// If two fragments were mapped to the same name the resolution picks one
    /// of them; such maps are ambiguous for commands anyway.
    pub fn resolve<'a>(&'a self, topic: &'a str) -> &'a str {
        self.reverse
            .get(topic)
            .map(String::as_str)
            .unwrap_or(topic)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl FromIterator<(String, String)> for TopicMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
