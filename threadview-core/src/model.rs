use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

/// Identifier of a comment, unique within a forest and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(u64);

impl CommentId {
    pub const fn new(raw: u64) -> Self {
        CommentId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommentId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(CommentId)
    }
}

/// A single comment and its ordered replies.
///
/// Only `content` ever changes after creation, and only through the forest
/// operations, which build a new node rather than mutating this one. Children
/// are reference counted so that forest snapshots share untouched subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    id: CommentId,
    author: String,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    children: Vec<Arc<CommentNode>>,
}

impl CommentNode {
    pub fn new(
        id: CommentId,
        author: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            content: content.into(),
            created_at,
            children: Vec::new(),
        }
    }

    /// Attach replies, in order (used to seed trees)
    pub fn with_replies(mut self, replies: Vec<CommentNode>) -> Self {
        self.children.extend(replies.into_iter().map(Arc::new));
        self
    }

    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn children(&self) -> &[Arc<CommentNode>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Copy of this node with another body; the subtree is shared
    pub(crate) fn with_content(&self, content: String) -> CommentNode {
        CommentNode {
            id: self.id,
            author: self.author.clone(),
            content,
            created_at: self.created_at,
            children: self.children.clone(),
        }
    }

    /// Copy of this node over another list of children
    pub(crate) fn with_children(&self, children: Vec<Arc<CommentNode>>) -> CommentNode {
        CommentNode {
            id: self.id,
            author: self.author.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            children,
        }
    }
}

// Tear subtrees down with an explicit stack so that a long reply chain cannot
// overflow the call stack on drop.
impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                pending.append(&mut node.children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_comment_id_parse_and_display() {
        let id: CommentId = "42".parse().unwrap();
        assert_eq!(id, CommentId::new(42));
        assert_eq!(id.to_string(), "42");
        assert_eq!("#7".parse::<CommentId>().unwrap(), CommentId::new(7));
        assert!("abc".parse::<CommentId>().is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let node = CommentNode::new(CommentId::new(1), "John", "Hi", at(0))
            .with_replies(vec![CommentNode::new(CommentId::new(2), "Jane", "Hey", at(60))]);
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(value["author"], "John");
        assert_eq!(value["content"], "Hi");
        assert!(value["createdAt"].is_string());
        assert_eq!(value["children"][0]["id"], 2);
        assert_eq!(value["children"][0]["children"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_with_content_shares_children() {
        let node = CommentNode::new(CommentId::new(1), "John", "Hi", at(0))
            .with_replies(vec![CommentNode::new(CommentId::new(2), "Jane", "Hey", at(60))]);
        let edited = node.with_content("Hello".to_string());

        assert_eq!(edited.content(), "Hello");
        assert_eq!(edited.author(), "John");
        assert_eq!(edited.created_at(), node.created_at());
        assert!(Arc::ptr_eq(&edited.children()[0], &node.children()[0]));
    }

    #[test]
    fn test_drop_deep_chain() {
        let mut node = CommentNode::new(CommentId::new(0), "a", "x", at(0));
        for i in 1..200_000u64 {
            node = CommentNode::new(CommentId::new(i), "a", "x", at(0)).with_replies(vec![node]);
        }
        drop(node);
    }
}
