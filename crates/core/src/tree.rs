//! Tree-shape logic: sibling scopes, ordering, subtree walks, and nesting.
//!
//! Nodes are self-referencing rows, never an in-memory pointer graph. The
//! helpers here work on ids and flat rows handed over by the store.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Sibling scopes
// ---------------------------------------------------------------------------

/// The set of nodes that share one `order_index` sequence.
///
/// Root-level nodes are scoped by their curriculum; everything else by its
/// parent. The derived ordering gives a stable lock acquisition order when an
/// operation touches two scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SiblingScope {
    Root { curriculum_id: DbId },
    Parent(DbId),
}

impl SiblingScope {
    pub fn new(curriculum_id: DbId, parent_node_id: Option<DbId>) -> Self {
        match parent_node_id {
            Some(parent) => SiblingScope::Parent(parent),
            None => SiblingScope::Root { curriculum_id },
        }
    }

    pub fn parent_node_id(self) -> Option<DbId> {
        match self {
            SiblingScope::Root { .. } => None,
            SiblingScope::Parent(id) => Some(id),
        }
    }
}

/// Order index for a node appended after the current maximum.
pub fn next_order_index(current_max: Option<i32>) -> i32 {
    current_max.map_or(0, |max| max + 1)
}

/// Compute the new sibling order after moving `node_id` to `position`.
///
/// `siblings` is the current active sibling list in order, including
/// `node_id`. The result is the full list in its new order; callers renumber
/// it densely from zero.
pub fn plan_reorder(siblings: &[DbId], node_id: DbId, position: usize) -> Result<Vec<DbId>, CoreError> {
    let current = siblings
        .iter()
        .position(|&id| id == node_id)
        .ok_or_else(|| CoreError::node_not_found(node_id))?;
    if position >= siblings.len() {
        return Err(CoreError::Validation(format!(
            "Position {position} is out of range for {} siblings",
            siblings.len()
        )));
    }
    let mut order = siblings.to_vec();
    let moved = order.remove(current);
    order.insert(position, moved);
    Ok(order)
}

// ---------------------------------------------------------------------------
// Subtree walk
// ---------------------------------------------------------------------------

/// Breadth-first walk over a subtree whose edges are fetched level by level.
///
/// The store supplies the children of each frontier; the walk keeps a
/// visited-set so that malformed data containing a cycle still terminates.
///
/// ```
/// use curriculum_core::tree::SubtreeWalk;
///
/// let mut walk = SubtreeWalk::new(1);
/// assert_eq!(walk.frontier(), Some(vec![1]));
/// walk.advance(vec![2, 3]);
/// assert_eq!(walk.frontier(), Some(vec![2, 3]));
/// walk.advance(vec![1]); // cycle back to the root is ignored
/// assert_eq!(walk.frontier(), None);
/// assert_eq!(walk.into_visited(), vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct SubtreeWalk {
    visited: HashSet<DbId>,
    order: Vec<DbId>,
    frontier: Vec<DbId>,
}

impl SubtreeWalk {
    pub fn new(root: DbId) -> Self {
        Self {
            visited: HashSet::from([root]),
            order: vec![root],
            frontier: vec![root],
        }
    }

    /// The ids whose children must be fetched next, or `None` when done.
    pub fn frontier(&self) -> Option<Vec<DbId>> {
        if self.frontier.is_empty() {
            None
        } else {
            Some(self.frontier.clone())
        }
    }

    /// Feed the children of the current frontier. Already-seen ids are dropped.
    pub fn advance(&mut self, children: impl IntoIterator<Item = DbId>) {
        let mut next = Vec::new();
        for id in children {
            if self.visited.insert(id) {
                self.order.push(id);
                next.push(id);
            }
        }
        self.frontier = next;
    }

    /// All collected ids in discovery order, root first.
    pub fn into_visited(self) -> Vec<DbId> {
        self.order
    }
}

// ---------------------------------------------------------------------------
// Nested trees
// ---------------------------------------------------------------------------

/// A flat row that knows its position in the tree.
pub trait TreeItem {
    fn id(&self) -> DbId;
    fn parent_id(&self) -> Option<DbId>;
    fn order_index(&self) -> i32;
}

/// A row with its children nested beneath it, ordered by `order_index`.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Total number of nodes in this tree, including the root.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }
}

impl<T> Drop for TreeNode<T> {
    // Unlink descendants onto a heap stack so dropping a deep chain does not
    // recurse once per level.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Nest a flat list of rows under `root_id`.
///
/// Rows unreachable from the root are dropped. Each row is placed at most
/// once, so a cycle in the data cannot recurse forever. Returns `None` if
/// the root is not among the rows.
pub fn build_tree<T: TreeItem>(root_id: DbId, items: Vec<T>) -> Option<TreeNode<T>> {
    let mut by_id: HashMap<DbId, T> = HashMap::with_capacity(items.len());
    let mut children_of: HashMap<DbId, Vec<(i32, DbId)>> = HashMap::new();
    for item in items {
        if let Some(parent) = item.parent_id() {
            children_of
                .entry(parent)
                .or_default()
                .push((item.order_index(), item.id()));
        }
        by_id.insert(item.id(), item);
    }
    for siblings in children_of.values_mut() {
        siblings.sort_unstable();
    }

    // Depth-first placement with an explicit stack. Each id is placed at
    // most once, under the first parent that reaches it.
    let mut placed = HashSet::new();
    let mut preorder: Vec<(DbId, Option<DbId>)> = Vec::new();
    let mut stack = vec![(root_id, None)];
    while let Some((id, parent)) = stack.pop() {
        if !by_id.contains_key(&id) || !placed.insert(id) {
            continue;
        }
        preorder.push((id, parent));
        if let Some(kids) = children_of.get(&id) {
            stack.extend(kids.iter().rev().map(|&(_, child)| (child, Some(id))));
        }
    }

    // Assemble bottom-up: in reverse preorder every child precedes its parent.
    let mut pending: HashMap<DbId, Vec<TreeNode<T>>> = HashMap::new();
    let mut root = None;
    for (id, parent) in preorder.into_iter().rev() {
        let item = by_id.remove(&id)?;
        let mut children = pending.remove(&id).unwrap_or_default();
        children.reverse();
        let node = TreeNode { item, children };
        match parent {
            Some(parent) => pending.entry(parent).or_default().push(node),
            None => root = Some(node),
        }
    }
    root
}
