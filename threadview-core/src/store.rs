use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::error::{CommentError, Result};
use crate::forest::Forest;
use crate::model::{CommentId, CommentNode};

/// Source of creation timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant, for reproducible runs
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Monotonic id source. Ids handed out once are never handed out again,
/// even if the comment carrying them is deleted; the counter refuses to wrap.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    /// Generator whose first id is past every id already in `forest`
    pub fn after(forest: &Forest) -> Result<Self> {
        match forest.max_id() {
            None => Ok(Self::default()),
            Some(max) => max
                .get()
                .checked_add(1)
                .map(Self::starting_at)
                .ok_or(CommentError::IdsExhausted(max)),
        }
    }

    pub fn next_id(&mut self) -> Result<CommentId> {
        let id = CommentId::new(self.next);
        self.next = self.next.checked_add(1).ok_or(CommentError::IdsExhausted(id))?;
        Ok(id)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

/// Owner of the authoritative comment forest.
///
/// Every mutation is all-or-nothing: it either installs a complete new forest
/// and returns a snapshot of it, or fails and leaves the current forest as it
/// was. Misses (`NotFound`) and blank content (`EmptyContent`) are reported the
/// same way by every operation.
pub struct CommentStore {
    forest: Forest,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self {
            forest: Forest::new(),
            ids: IdGenerator::default(),
            clock: Box::new(SystemClock),
        }
    }

    /// Take ownership of an existing forest; new ids continue after its largest.
    ///
    /// Fails with `IdsExhausted` when the forest already uses the largest id.
    pub fn from_forest(forest: Forest) -> Result<Self> {
        let ids = IdGenerator::after(&forest)?;
        Ok(Self {
            forest,
            ids,
            clock: Box::new(SystemClock),
        })
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current forest
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Detached copy of the current forest (shares all nodes)
    pub fn snapshot(&self) -> Forest {
        self.forest.clone()
    }

    /// Append a new root comment
    pub fn post_top_level(&mut self, author: &str, content: &str) -> Result<Forest> {
        validate_content(content)?;

        let node = self.new_node(author, content)?;
        let id = node.id();
        let forest = self.forest.with_root(node)?;
        debug!(%id, author, "posted comment");
        Ok(self.install(forest))
    }

    /// Append a reply as the last child of `parent`, at any depth
    pub fn post_reply(&mut self, parent: CommentId, author: &str, content: &str) -> Result<Forest> {
        validate_content(content)?;
        if !self.forest.contains(parent) {
            debug!(%parent, "reply target missing");
            return Err(CommentError::NotFound(parent));
        }

        let node = self.new_node(author, content)?;
        let id = node.id();
        let forest = self.forest.with_reply(parent, node)?;
        debug!(%id, %parent, author, "posted reply");
        Ok(self.install(forest))
    }

    /// Replace the body of an existing comment
    pub fn update_content(&mut self, id: CommentId, content: &str) -> Result<Forest> {
        validate_content(content)?;

        let forest = self.forest.with_content(id, content)?;
        debug!(%id, "updated comment");
        Ok(self.install(forest))
    }

    /// Remove a comment and every reply beneath it
    pub fn delete_subtree(&mut self, id: CommentId) -> Result<Forest> {
        let forest = self.forest.without(id)?;
        debug!(%id, removed = self.forest.len() - forest.len(), "deleted comment");
        Ok(self.install(forest))
    }

    fn new_node(&mut self, author: &str, content: &str) -> Result<CommentNode> {
        let id = self.ids.next_id()?;
        Ok(CommentNode::new(id, author, content, self.clock.now()))
    }

    fn install(&mut self, forest: Forest) -> Forest {
        trace!(comments = forest.len(), "installing forest");
        self.forest = forest;
        self.forest.clone()
    }
}

impl Default for CommentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Blank or whitespace-only content is never stored
pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(CommentError::EmptyContent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn clock() -> FixedClock {
        FixedClock(Utc.timestamp_opt(1_705_314_600, 0).unwrap())
    }

    fn store() -> CommentStore {
        CommentStore::new().with_clock(clock())
    }

    #[test]
    fn test_post_top_level_appends_in_order() {
        let mut store = store();
        store.post_top_level("John", "first").unwrap();
        let forest = store.post_top_level("Jane", "second").unwrap();

        assert_eq!(forest.root_count(), 2);
        assert_eq!(forest.roots()[0].content(), "first");
        assert_eq!(forest.roots()[1].author(), "Jane");
        assert_eq!(forest.roots()[1].created_at(), clock().0);
        assert!(forest.roots()[1].is_leaf());
        assert_eq!(&forest, store.forest());
    }

    #[test]
    fn test_blank_content_rejected() {
        let mut store = store();
        let id = store.post_top_level("John", "hi").unwrap().roots()[0].id();
        let before = store.snapshot();

        assert!(matches!(store.post_top_level("John", "   \n"), Err(CommentError::EmptyContent)));
        assert!(matches!(store.post_reply(id, "John", ""), Err(CommentError::EmptyContent)));
        assert!(matches!(store.update_content(id, "\t"), Err(CommentError::EmptyContent)));
        assert_eq!(store.forest(), &before);
    }

    #[test]
    fn test_misses_leave_forest_unchanged() {
        let mut store = store();
        let id = store.post_top_level("John", "Hi").unwrap().roots()[0].id();
        store.post_reply(id, "Jane", "Hey").unwrap();
        let before = store.snapshot();
        let missing = CommentId::new(999);

        assert!(store.post_reply(missing, "Bob", "Nice").unwrap_err().is_not_found());
        assert!(store.update_content(missing, "x").unwrap_err().is_not_found());
        assert!(store.delete_subtree(missing).unwrap_err().is_not_found());
        assert_eq!(store.forest(), &before);
    }

    #[test]
    fn test_ids_unique_across_posts_and_replies() {
        let mut store = store();
        let mut targets = Vec::new();
        for round in 0..20 {
            let forest = store.post_top_level("a", "root").unwrap();
            let root = forest.roots().last().unwrap().id();
            targets.push(root);
            for target in targets.clone() {
                let forest = store.post_reply(target, "b", &format!("reply {}", round)).unwrap();
                targets.push(forest.find(target).unwrap().children().last().unwrap().id());
            }
            if targets.len() > 40 {
                targets.truncate(10);
            }
        }

        let ids = store.forest().ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut store = store();
        let first = store.post_top_level("a", "one").unwrap().roots()[0].id();
        store.delete_subtree(first).unwrap();
        let second = store.post_top_level("a", "two").unwrap().roots()[0].id();
        assert!(second > first);
    }

    #[test]
    fn test_from_forest_continues_ids() {
        let root = CommentNode::new(CommentId::new(41), "a", "x", clock().0);
        let forest = Forest::from_roots(vec![root]).unwrap();
        let mut store = CommentStore::from_forest(forest).unwrap().with_clock(clock());
        let forest = store.post_reply(CommentId::new(41), "b", "y").unwrap();
        assert_eq!(forest.roots()[0].children()[0].id(), CommentId::new(42));
    }

    #[test]
    fn test_forest_using_largest_id_is_refused() {
        let json = r#"[{"id": 18446744073709551615, "author": "a", "content": "x",
                        "createdAt": "2024-01-15T10:30:00Z"}]"#;
        let forest = Forest::from_json(json).unwrap();
        assert!(matches!(
            CommentStore::from_forest(forest),
            Err(CommentError::IdsExhausted(id)) if id.get() == u64::MAX
        ));
    }

    #[test]
    fn test_id_counter_never_wraps() {
        let mut ids = IdGenerator::starting_at(u64::MAX - 1);
        assert_eq!(ids.next_id().unwrap(), CommentId::new(u64::MAX - 1));
        assert!(matches!(ids.next_id(), Err(CommentError::IdsExhausted(_))));
        assert!(matches!(ids.next_id(), Err(CommentError::IdsExhausted(_))));

        let root = CommentNode::new(CommentId::new(u64::MAX - 1), "a", "x", clock().0);
        let mut store = CommentStore::from_forest(Forest::from_roots(vec![root]).unwrap())
            .unwrap()
            .with_clock(clock());
        let before = store.snapshot();
        assert!(matches!(
            store.post_top_level("b", "y"),
            Err(CommentError::IdsExhausted(_))
        ));
        assert_eq!(store.forest(), &before);
    }

    #[test]
    fn test_reply_order_and_delete_subtree() {
        let mut store = store();
        let root = store.post_top_level("John", "Hi").unwrap().roots()[0].id();
        for text in ["a", "b", "c"] {
            store.post_reply(root, "Jane", text).unwrap();
        }
        let contents: Vec<&str> = store.forest().roots()[0]
            .children()
            .iter()
            .map(|c| c.content())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);

        let kept = store.post_top_level("Bob", "other").unwrap();
        let forest = store.delete_subtree(root).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.roots()[0], kept.roots()[1]);
    }

    #[test]
    fn test_update_keeps_subtree() {
        let mut store = store();
        let root = store.post_top_level("John", "Hi").unwrap().roots()[0].id();
        let before = store.post_reply(root, "Jane", "Hey").unwrap();
        let after = store.update_content(root, "Hello").unwrap();

        assert_eq!(after.roots()[0].content(), "Hello");
        assert_eq!(after.roots()[0].author(), "John");
        assert!(std::sync::Arc::ptr_eq(
            &after.roots()[0].children()[0],
            &before.roots()[0].children()[0]
        ));
    }
}
