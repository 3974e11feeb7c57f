//! MIME type conditions
//!
//! A persistence-agnostic predicate over an asset's content type. Storage
//! adapters translate it into their own query language; the in-memory store
//! evaluates it directly with [`MimeCondition::matches`].

use serde::Serialize;
use std::collections::BTreeSet;

/// Predicate selecting assets by content type membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "args")]
pub enum MimeCondition {
    /// Content type is one of the set. An empty set matches nothing.
    In(BTreeSet<String>),
    /// Content type is present and not one of the set. An empty set matches any present type.
    NotIn(BTreeSet<String>),
    /// At least one of the conditions holds
    Any(Vec<MimeCondition>),
    /// Every condition holds
    All(Vec<MimeCondition>),
}

impl MimeCondition {
    pub fn is_in<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(mime_types.into_iter().map(Into::into).collect())
    }

    pub fn not_in<I, S>(mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NotIn(mime_types.into_iter().map(Into::into).collect())
    }

    /// Disjunction of `conditions`, folding plain `In` sets together
    pub fn any(conditions: Vec<MimeCondition>) -> Self {
        let mut union = BTreeSet::new();
        let mut rest = Vec::new();
        let mut saw_in = false;

        for condition in conditions {
            match condition {
                MimeCondition::In(set) => {
                    saw_in = true;
                    union.extend(set);
                }
                other => rest.push(other),
            }
        }

        if saw_in {
            rest.insert(0, MimeCondition::In(union));
        }

        match rest.len() {
            0 => MimeCondition::In(BTreeSet::new()),
            1 => rest.remove(0),
            _ => MimeCondition::Any(rest),
        }
    }

    /// Evaluate against a content type. A missing content type never matches.
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        match self {
            MimeCondition::In(set) => content_type.is_some_and(|m| set.contains(m)),
            MimeCondition::NotIn(set) => content_type.is_some_and(|m| !set.contains(m)),
            MimeCondition::Any(conditions) => conditions.iter().any(|c| c.matches(content_type)),
            MimeCondition::All(conditions) => conditions.iter().all(|c| c.matches(content_type)),
        }
    }

    /// Logical negation, pushed down to the leaves
    pub fn negate(self) -> Self {
        match self {
            MimeCondition::In(set) => MimeCondition::NotIn(set),
            MimeCondition::NotIn(set) => MimeCondition::In(set),
            MimeCondition::Any(conditions) => {
                MimeCondition::All(conditions.into_iter().map(Self::negate).collect())
            }
            MimeCondition::All(conditions) => {
                MimeCondition::Any(conditions.into_iter().map(Self::negate).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_and_not_in() {
        let images = MimeCondition::is_in(["image/png", "image/jpeg"]);
        assert!(images.matches(Some("image/png")));
        assert!(!images.matches(Some("application/pdf")));
        assert!(!images.matches(None));

        let not_images = images.negate();
        assert!(!not_images.matches(Some("image/png")));
        assert!(not_images.matches(Some("application/pdf")));
        assert!(!not_images.matches(None));
    }

    #[test]
    fn test_empty_sets() {
        let nothing = MimeCondition::is_in(Vec::<String>::new());
        assert!(!nothing.matches(Some("image/png")));

        let anything = MimeCondition::not_in(Vec::<String>::new());
        assert!(anything.matches(Some("image/png")));
        assert!(!anything.matches(None));
    }

    #[test]
    fn test_any_folds_in_sets() {
        let combined = MimeCondition::any(vec![
            MimeCondition::is_in(["image/png"]),
            MimeCondition::is_in(["audio/mpeg"]),
        ]);
        assert_eq!(combined, MimeCondition::is_in(["audio/mpeg", "image/png"]));

        let with_other = MimeCondition::any(vec![
            MimeCondition::is_in(["image/png"]),
            MimeCondition::not_in(["image/png", "audio/mpeg"]),
        ]);
        assert!(with_other.matches(Some("image/png")));
        assert!(with_other.matches(Some("text/plain")));
        assert!(!with_other.matches(Some("audio/mpeg")));
    }

    #[test]
    fn test_negate_compound() {
        let condition = MimeCondition::Any(vec![
            MimeCondition::is_in(["image/png"]),
            MimeCondition::is_in(["audio/mpeg"]),
        ])
        .negate();

        assert!(matches!(condition, MimeCondition::All(_)));
        assert!(condition.matches(Some("text/plain")));
        assert!(!condition.matches(Some("audio/mpeg")));
    }

    #[test]
    fn test_any_of_nothing_matches_nothing() {
        let condition = MimeCondition::any(vec![]);
        assert!(!condition.matches(Some("image/png")));
    }
}
