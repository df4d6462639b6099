//! Arena-based document tree storage
//!
//! Every node of a parsed document lives in one `Vec<DomNode>`; parent and
//! child links are `u32` indices into it. The arena is created per document
//! and dropped with it.
//!
//! Removal detaches a node from its parent. The node stays in the vector but
//! is unreachable from the root, so indices never shift.
//!
//! ## Memory Layout
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Node0][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```

use crate::error::{DomError, Result};
use crate::types::{is_void_element, DomNode, NodeId, NodeType};
use serde_json::{json, Value};
use smallvec::SmallVec;

/// Arena allocator for document nodes
#[derive(Debug)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,

    /// Root node ID (if set)
    root_id: Option<NodeId>,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root_id: None,
        }
    }

    /// Arena holding only an empty document node, set as root
    pub fn new_document() -> Self {
        let mut arena = Self::new();
        let root = arena.add_node(DomNode::new(0, NodeType::Document, "#document".to_string()));
        arena.root_id = Some(root);
        arena
    }

    /// Add a node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        self.nodes.push(node);
        node_id
    }

    /// Link `child` as the last child of `parent`
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        let parent = self.get(parent_id)?;
        if parent.is_element() && is_void_element(&parent.node_name) {
            return Err(DomError::VoidElementChild(parent.node_name.clone()));
        }
        self.get_mut(child_id)?.parent_id = Some(parent_id);
        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get root node ID
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Total number of nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get children of a node
    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomNode>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// Get parent of a node
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// IDs reachable from the root in document order, root included.
    ///
    /// Passes collect this first and mutate afterwards, which keeps the
    /// borrow checker out of the traversal.
    pub fn descendants(&self) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        if let Some(root_id) = self.root_id {
            self.traverse_df(root_id, |node| {
                ids.push(node.node_id);
                Ok(())
            })?;
        }
        Ok(ids)
    }

    /// Reachable element IDs, optionally filtered by tag
    pub fn elements(&self, tag: Option<&str>) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();
        if let Some(root_id) = self.root_id {
            self.traverse_df(root_id, |node| {
                let matches = match tag {
                    Some(tag) => node.is_tag(tag),
                    None => node.is_element(),
                };
                if matches {
                    ids.push(node.node_id);
                }
                Ok(())
            })?;
        }
        Ok(ids)
    }

    /// Unlink every node in `ids` from its parent. The subtrees become
    /// unreachable. Returns how many were attached.
    ///
    /// Each affected child list is filtered once, however many of its
    /// children go.
    pub fn detach_all(&mut self, ids: &[NodeId]) -> Result<usize> {
        let mut detached = vec![false; self.nodes.len()];
        let mut parents = Vec::new();
        for &node_id in ids {
            if let Some(parent_id) = self.get_mut(node_id)?.parent_id.take() {
                detached[node_id as usize] = true;
                parents.push(parent_id);
            }
        }
        parents.sort_unstable();
        parents.dedup();

        let mut removed = 0;
        for parent_id in parents {
            let parent = self.get_mut(parent_id)?;
            let before = parent.children_ids.len();
            parent
                .children_ids
                .retain(|child| !detached.get(*child as usize).copied().unwrap_or(false));
            removed += before - parent.children_ids.len();
        }
        Ok(removed)
    }

    /// Merge adjacent text siblings and drop empty text nodes.
    ///
    /// Removing a comment or an element can leave two text nodes side by side;
    /// the parser never produces that shape, so passes call this to keep
    /// `parse(serialize(tree))` equal to the tree.
    pub fn normalize(&mut self) -> Result<usize> {
        let mut removed = 0;
        for parent_id in self.descendants()? {
            let children = std::mem::take(&mut self.get_mut(parent_id)?.children_ids);
            let mut kept: SmallVec<[NodeId; 4]> = SmallVec::with_capacity(children.len());
            let mut last_text: Option<NodeId> = None;

            for child_id in children {
                let child = self.get_mut(child_id)?;
                if !child.is_text() {
                    last_text = None;
                    kept.push(child_id);
                    continue;
                }
                if child.node_value.is_empty() {
                    child.parent_id = None;
                    removed += 1;
                    continue;
                }
                match last_text {
                    Some(keep_id) => {
                        child.parent_id = None;
                        let value = std::mem::take(&mut child.node_value);
                        self.get_mut(keep_id)?.node_value.push_str(&value);
                        removed += 1;
                    }
                    None => {
                        last_text = Some(child_id);
                        kept.push(child_id);
                    }
                }
            }

            self.get_mut(parent_id)?.children_ids = kept;
        }
        Ok(removed)
    }

    /// Check the tree invariants: unique attribute keys, childless void
    /// elements and consistent parent links.
    pub fn validate(&self) -> Result<()> {
        let Some(root_id) = self.root_id else {
            return Ok(());
        };
        self.traverse_df(root_id, |node| {
            if node.is_element() {
                if let Some(name) = node.attributes.find_duplicate() {
                    return Err(DomError::DuplicateAttribute {
                        tag: node.node_name.clone(),
                        attribute: name.to_string(),
                    });
                }
                if is_void_element(&node.node_name) && !node.children_ids.is_empty() {
                    return Err(DomError::VoidElementChild(node.node_name.clone()));
                }
            }
            for &child_id in &node.children_ids {
                if self.get(child_id)?.parent_id != Some(node.node_id) {
                    return Err(DomError::NodeNotFound(child_id));
                }
            }
            Ok(())
        })
    }

    /// Nested JSON dump of the reachable tree, for debugging
    pub fn to_json(&self) -> Result<String> {
        let value = match self.root_id {
            Some(root_id) => self.node_to_json(root_id)?,
            None => Value::Null,
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn node_to_json(&self, node_id: NodeId) -> Result<Value> {
        let node = self.get(node_id)?;
        let children = node
            .children_ids
            .iter()
            .map(|&child| self.node_to_json(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(match node.node_type {
            NodeType::Element => json!({
                "type": node.node_type.as_str(),
                "tag": node.node_name,
                "attributes": node.attributes,
                "children": children,
            }),
            NodeType::Document => json!({
                "type": node.node_type.as_str(),
                "children": children,
            }),
            _ => json!({
                "type": node.node_type.as_str(),
                "value": node.node_value,
            }),
        })
    }

}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn div_with_two_spans() -> (DomArena, NodeId, NodeId, NodeId) {
        let mut arena = DomArena::new_document();
        let root = arena.root_id().unwrap();

        let div = arena.add_node(DomNode::element(0, "div"));
        let span1 = arena.add_node(DomNode::element(0, "span"));
        let span2 = arena.add_node(DomNode::element(0, "span"));

        arena.append_child(root, div).unwrap();
        arena.append_child(div, span1).unwrap();
        arena.append_child(div, span2).unwrap();

        (arena, div, span1, span2)
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();

        let id = arena.add_node(DomNode::element(42, "div"));
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert_eq!(retrieved.node_id, 0);
        assert!(arena.get(7).is_err());
    }

    #[test]
    fn test_traverse_df() {
        let (arena, ..) = div_with_two_spans();

        let mut visited = Vec::new();
        arena
            .traverse_df(arena.root_id().unwrap(), |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["#document", "div", "span", "span"]);
    }

    #[test]
    fn test_parent_links() {
        let (arena, div, span1, _) = div_with_two_spans();

        assert_eq!(arena.parent(span1).unwrap().unwrap().node_id, div);
        assert!(arena.parent(arena.root_id().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_detach_makes_subtree_unreachable() {
        let (mut arena, div, span1, span2) = div_with_two_spans();

        assert_eq!(arena.detach_all(&[span1]).unwrap(), 1);
        // Already detached
        assert_eq!(arena.detach_all(&[span1]).unwrap(), 0);

        assert_eq!(arena.get(div).unwrap().children_ids.as_slice(), &[span2]);
        assert!(!arena.descendants().unwrap().contains(&span1));
        assert!(arena.get(span1).unwrap().parent_id.is_none());
        assert_eq!(arena.len(), 4);
    }

    #[test]
    fn test_detach_many_siblings() {
        let mut arena = DomArena::new_document();
        let root = arena.root_id().unwrap();
        let ids: Vec<_> = (0..50_000)
            .map(|i| {
                let id = arena.add_node(DomNode::text(0, if i % 2 == 0 { "a" } else { "" }));
                arena.append_child(root, id).unwrap();
                id
            })
            .collect();

        let odd: Vec<_> = ids.iter().copied().skip(1).step_by(2).collect();
        assert_eq!(arena.detach_all(&odd).unwrap(), 25_000);

        // Every remaining text node is now adjacent to another
        assert_eq!(arena.normalize().unwrap(), 24_999);
        let children = arena.children(root).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_value.len(), 25_000);
        arena.validate().unwrap();
    }

    #[test]
    fn test_void_element_rejects_children() {
        let mut arena = DomArena::new_document();
        let img = arena.add_node(DomNode::element(0, "img"));
        let text = arena.add_node(DomNode::text(0, "x"));

        let err = arena.append_child(img, text).unwrap_err();
        assert!(matches!(err, DomError::VoidElementChild(tag) if tag == "img"));
    }

    #[test]
    fn test_normalize_merges_text() {
        let mut arena = DomArena::new_document();
        let root = arena.root_id().unwrap();
        let a = arena.add_node(DomNode::text(0, "a "));
        let comment = arena.add_node(DomNode::with_value(0, NodeType::Comment, "x"));
        let b = arena.add_node(DomNode::text(0, " b"));
        let empty = arena.add_node(DomNode::text(0, ""));
        for id in [a, comment, b, empty] {
            arena.append_child(root, id).unwrap();
        }

        arena.detach_all(&[comment]).unwrap();
        let removed = arena.normalize().unwrap();

        assert_eq!(removed, 2);
        let children = arena.children(root).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_value, "a  b");
    }

    #[test]
    fn test_validate_catches_duplicate_keys() {
        let (mut arena, div, ..) = div_with_two_spans();
        arena.validate().unwrap();

        // Bypass the first-wins insert by renaming an existing key.
        let node = arena.get_mut(div).unwrap();
        node.attributes.insert("id", Some("a".to_string()));
        node.attributes.insert("class", Some("b".to_string()));
        node.attributes.iter_mut().last().unwrap().name = "ID".to_string();

        assert!(matches!(
            arena.validate(),
            Err(DomError::DuplicateAttribute { .. })
        ));
    }

    #[test]
    fn test_to_json() {
        let (arena, ..) = div_with_two_spans();
        let json: Value = serde_json::from_str(&arena.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "document");
        assert_eq!(json["children"][0]["tag"], "div");
        assert_eq!(json["children"][0]["children"].as_array().unwrap().len(), 2);
    }
}
