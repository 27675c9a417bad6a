use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{CommentError, Result};
use crate::model::{CommentId, CommentNode};

/// Ordered sequence of root comments.
///
/// A `Forest` is an immutable value: every operation returns a new forest and
/// leaves `self` intact. Subtrees the operation does not touch are shared
/// between the old and the new value, so snapshots are cheap to keep around.
///
/// All traversals use an explicit stack; nesting depth is bounded only by
/// memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    roots: Vec<Arc<CommentNode>>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a forest from root nodes, checking that ids are unique
    pub fn from_roots(roots: Vec<CommentNode>) -> Result<Self> {
        let forest = Forest {
            roots: roots.into_iter().map(Arc::new).collect(),
        };
        forest.check_unique_ids()?;
        Ok(forest)
    }

    /// Build a forest whose ids are known to be unique
    pub(crate) fn from_trusted_roots(roots: Vec<CommentNode>) -> Self {
        Forest {
            roots: roots.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn roots(&self) -> &[Arc<CommentNode>] {
        &self.roots
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of comments, replies included
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Pre-order walk yielding `(depth, node)`, roots at depth 0
    pub fn iter(&self) -> ForestIter<'_> {
        ForestIter::new(&self.roots)
    }

    pub fn find(&self, id: CommentId) -> Option<&CommentNode> {
        self.iter().map(|(_, node)| node).find(|node| node.id() == id)
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.find(id).is_some()
    }

    pub fn depth_of(&self, id: CommentId) -> Option<usize> {
        self.iter()
            .find(|(_, node)| node.id() == id)
            .map(|(depth, _)| depth)
    }

    /// All ids in pre-order
    pub fn ids(&self) -> Vec<CommentId> {
        self.iter().map(|(_, node)| node.id()).collect()
    }

    pub fn max_id(&self) -> Option<CommentId> {
        self.iter().map(|(_, node)| node.id()).max()
    }

    /// Append a new root comment (with whatever subtree it carries)
    pub fn with_root(&self, node: CommentNode) -> Result<Forest> {
        self.check_fresh(&node)?;

        let mut roots = self.roots.clone();
        roots.push(Arc::new(node));
        Ok(Forest { roots })
    }

    /// Append `node` as the last reply of `parent`, wherever it sits
    pub fn with_reply(&self, parent: CommentId, node: CommentNode) -> Result<Forest> {
        let path = self.locate(parent).ok_or(CommentError::NotFound(parent))?;
        self.check_fresh(&node)?;

        let reply = Arc::new(node);
        Ok(self.rebuild_along(&path, move |siblings, idx| {
            let mut children = siblings[idx].children().to_vec();
            children.push(reply);
            siblings[idx] = Arc::new(siblings[idx].with_children(children));
        }))
    }

    /// Replace the body of `id`; everything else about the node is kept
    pub fn with_content(&self, id: CommentId, content: impl Into<String>) -> Result<Forest> {
        let path = self.locate(id).ok_or(CommentError::NotFound(id))?;

        let content = content.into();
        Ok(self.rebuild_along(&path, move |siblings, idx| {
            siblings[idx] = Arc::new(siblings[idx].with_content(content));
        }))
    }

    /// Remove `id` together with its whole subtree.
    ///
    /// Ids are unique, so removing the one location found is the same as
    /// filtering the id out at every level.
    pub fn without(&self, id: CommentId) -> Result<Forest> {
        let path = self.locate(id).ok_or(CommentError::NotFound(id))?;

        Ok(self.rebuild_along(&path, |siblings, idx| {
            siblings.remove(idx);
        }))
    }

    /// Inspection format: a JSON array of nested comment records.
    ///
    /// Written from an explicit stack, so any nesting depth can be exported.
    pub fn to_json(&self) -> Result<String> {
        let mut out = String::from("[");
        let mut levels = vec![self.roots.iter()];
        let mut first = true;

        while let Some(level) = levels.last_mut() {
            match level.next() {
                Some(node) => {
                    if !first {
                        out.push(',');
                    }
                    open_record(&mut out, node)?;
                    levels.push(node.children().iter());
                    first = true;
                }
                None => {
                    levels.pop();
                    out.push(']');
                    if !levels.is_empty() {
                        out.push('}');
                    }
                    first = false;
                }
            }
        }

        Ok(out)
    }

    /// Parse the inspection format back into a forest; duplicate ids are rejected.
    ///
    /// Nesting depth is not limited: the stack grows on demand while parsing.
    pub fn from_json(json: &str) -> Result<Forest> {
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let roots = Vec::<CommentNode>::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Forest::from_roots(roots)
    }

    /// Index path from the roots down to `id`
    fn locate(&self, id: CommentId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut stack: Vec<(usize, usize, &Arc<CommentNode>)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, node)| (0, idx, node))
            .collect();

        while let Some((depth, idx, node)) = stack.pop() {
            path.truncate(depth);
            path.push(idx);
            if node.id() == id {
                return Some(path);
            }
            for (child_idx, child) in node.children().iter().enumerate().rev() {
                stack.push((depth + 1, child_idx, child));
            }
        }

        None
    }

    /// Copy the spine from the roots to the target at the end of `path`,
    /// letting `edit` rewrite the sibling list that holds the target.
    /// Everything off the spine is shared with `self`.
    fn rebuild_along<F>(&self, path: &[usize], edit: F) -> Forest
    where
        F: FnOnce(&mut Vec<Arc<CommentNode>>, usize),
    {
        let Some((&target, ancestors_path)) = path.split_last() else {
            return self.clone();
        };

        let mut ancestors: Vec<&Arc<CommentNode>> = Vec::with_capacity(ancestors_path.len());
        let mut level: &[Arc<CommentNode>] = &self.roots;
        for &idx in ancestors_path {
            let node = &level[idx];
            ancestors.push(node);
            level = node.children();
        }

        let mut rebuilt = level.to_vec();
        edit(&mut rebuilt, target);

        for (depth, parent) in ancestors.iter().enumerate().rev() {
            let replacement = Arc::new(parent.with_children(rebuilt));
            let mut level = if depth == 0 {
                self.roots.clone()
            } else {
                ancestors[depth - 1].children().to_vec()
            };
            level[ancestors_path[depth]] = replacement;
            rebuilt = level;
        }

        Forest { roots: rebuilt }
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (_, node) in self.iter() {
            if !seen.insert(node.id()) {
                return Err(CommentError::DuplicateId(node.id()));
            }
        }
        Ok(())
    }

    /// Ensure no id in `node`'s subtree is already used here
    fn check_fresh(&self, node: &CommentNode) -> Result<()> {
        let existing: HashSet<CommentId> = self.iter().map(|(_, n)| n.id()).collect();
        let mut stack = vec![node];
        let mut incoming = HashSet::new();
        while let Some(current) = stack.pop() {
            if existing.contains(&current.id()) || !incoming.insert(current.id()) {
                return Err(CommentError::DuplicateId(current.id()));
            }
            stack.extend(current.children().iter().map(|child| child.as_ref()));
        }
        Ok(())
    }
}

/// Write `node`'s own fields and open its `children` array
fn open_record(out: &mut String, node: &CommentNode) -> Result<()> {
    out.push_str(&format!(
        "{{\"id\":{},\"author\":{},\"content\":{},\"createdAt\":{},\"children\":[",
        node.id(),
        serde_json::to_string(node.author())?,
        serde_json::to_string(node.content())?,
        serde_json::to_string(&node.created_at())?,
    ));
    Ok(())
}

/// Pre-order iterator over a forest, see [`Forest::iter`]
pub struct ForestIter<'a> {
    stack: Vec<(usize, &'a CommentNode)>,
}

impl<'a> ForestIter<'a> {
    fn new(roots: &'a [Arc<CommentNode>]) -> Self {
        Self {
            stack: roots.iter().rev().map(|node| (0, node.as_ref())).collect(),
        }
    }
}

impl<'a> Iterator for ForestIter<'a> {
    type Item = (usize, &'a CommentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children().iter().rev().map(|child| (depth + 1, child.as_ref())));
        Some((depth, node))
    }
}
