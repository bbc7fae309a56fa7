use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::RankedList;

/// A named, unordered set of feature identifiers. Members are deduplicated
/// and keep their first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSet {
    pub name: String,
    pub description: Option<String>,
    members: Vec<String>,
    /// The set as loaded, kept when this instance was qualified against a
    /// ranked list.
    #[serde(skip)]
    original: Option<Arc<GeneSet>>,
}

impl GeneSet {
    pub fn new(name: impl Into<String>, members: Vec<String>) -> GeneSet {
        let mut seen = AHashSet::with_capacity(members.len());
        let members = members
            .into_iter()
            .filter(|m| seen.insert(m.clone()))
            .collect();
        GeneSet {
            name: name.into(),
            description: None,
            members,
            original: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> GeneSet {
        self.description = Some(description.into());
        self
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    /// Restricts the set to the features present in `list`. The returned set
    /// keeps a handle on the unqualified original.
    pub fn qualified(&self, list: &RankedList) -> GeneSet {
        let original = match &self.original {
            Some(o) => o.clone(),
            None => Arc::new(self.clone()),
        };
        GeneSet {
            name: self.name.clone(),
            description: self.description.clone(),
            members: self
                .members
                .iter()
                .filter(|m| list.contains(m))
                .cloned()
                .collect(),
            original: Some(original),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.original.is_some()
    }

    pub fn original(&self) -> Option<&GeneSet> {
        self.original.as_deref()
    }

    /// Size before qualification.
    pub fn original_size(&self) -> usize {
        self.original
            .as_ref()
            .map_or(self.members.len(), |o| o.num_members())
    }

    /// Members lost to qualification.
    pub fn num_dropped(&self) -> usize {
        self.original_size() - self.members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SortOrder;

    #[test]
    fn qualification_keeps_original() {
        let rl = RankedList::new(
            "rl",
            vec!["a".into(), "b".into(), "c".into()],
            vec![3.0, 2.0, 1.0],
            SortOrder::Descending,
        )
        .unwrap();
        let gs = GeneSet::new("set", vec!["a".into(), "x".into(), "c".into(), "a".into()]);
        assert_eq!(gs.num_members(), 3);
        let q = gs.qualified(&rl);
        assert_eq!(q.members(), &["a".to_string(), "c".to_string()]);
        assert_eq!(q.original_size(), 3);
        assert_eq!(q.num_dropped(), 1);
        // qualifying twice still points at the loaded set
        let qq = q.qualified(&rl);
        assert_eq!(qq.original().unwrap().num_members(), 3);
    }
}
