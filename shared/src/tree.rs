use std::collections::HashMap;

use crate::Comment;

/// Grouping key of a comment: the comment it replies to, or the thread itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKey {
    Root,
    Comment(i64),
}

impl From<Option<i64>> for ParentKey {
    fn from(parent: Option<i64>) -> Self {
        parent.map_or(ParentKey::Root, ParentKey::Comment)
    }
}

/// Comments of one thread grouped by parent, each group in input order.
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    groups: HashMap<ParentKey, Vec<Comment>>,
}

/// Group a flat, creation-ordered list of comments by parent.
pub fn build_tree(comments: impl IntoIterator<Item = Comment>) -> CommentTree {
    let mut groups: HashMap<ParentKey, Vec<Comment>> = HashMap::new();
    for comment in comments {
        groups
            .entry(ParentKey::from(comment.parent_id))
            .or_default()
            .push(comment);
    }
    CommentTree { groups }
}

impl CommentTree {
    pub fn group(&self, key: ParentKey) -> &[Comment] {
        self.groups.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[Comment] {
        self.group(ParentKey::Root)
    }

    pub fn replies(&self, comment_id: i64) -> &[Comment] {
        self.group(ParentKey::Comment(comment_id))
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Depth-first, pre-order traversal from the roots with nesting depth,
    /// the order in which a thread page renders its comments.
    ///
    /// Only comments reachable from a root are yielded; replies whose parent
    /// is missing from the input never surface.
    pub fn walk(&self) -> Vec<(usize, &Comment)> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<(usize, &Comment)> =
            self.roots().iter().rev().map(|c| (0, c)).collect();
        while let Some((depth, comment)) = stack.pop() {
            out.push((depth, comment));
            stack.extend(self.replies(comment.id).iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }
}
