//! Structural passes: comments and whitespace
//!
//! Text inside `pre`, `textarea`, `script`, `style` and similar elements is
//! rendered as written and never touched here.

use dom::utils::{
    collapse_whitespace, is_blank, preserves_text, trim_end_whitespace, trim_start_whitespace,
};
use dom::{is_block_element, DomArena, DomNode, NodeId, NodeType};

use crate::error::Result;
use crate::pass::{Pass, PassContext, PassName};

/// Comment bodies that target legacy browsers and must survive
const CONDITIONAL_PREFIXES: &[&str] = &["[if", "<![endif]", "[endif]"];

fn is_conditional_comment(text: &str) -> bool {
    let text = text.trim_start();
    CONDITIONAL_PREFIXES.iter().any(|p| text.starts_with(p))
}

fn is_removable_comment(node: &DomNode) -> bool {
    node.node_type == NodeType::Comment && !is_conditional_comment(&node.node_value)
}

/// Text ending in `&` plus name characters, a character reference that the
/// following text could still complete
fn ends_in_open_reference(text: &str) -> bool {
    text.rfind('&').map_or(false, |at| {
        text[at + 1..]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'#')
    })
}

fn continues_reference(text: &str) -> bool {
    text.bytes()
        .next()
        .map_or(false, |b| b.is_ascii_alphanumeric() || matches!(b, b'#' | b';'))
}

/// Nodes with children in document order, skipping everything below
/// elements whose text is significant as written
fn free_parents(arena: &DomArena) -> Result<Vec<NodeId>> {
    let mut ids = Vec::new();
    let Some(root_id) = arena.root_id() else {
        return Ok(ids);
    };
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        let node = arena.get(id)?;
        if node.children_ids.is_empty() || preserves_text(node) {
            continue;
        }
        ids.push(id);
        stack.extend(node.children_ids.iter().rev().copied());
    }
    Ok(ids)
}

/// Text nodes whose whitespace is not significant
fn free_text_nodes(arena: &DomArena) -> Result<Vec<NodeId>> {
    let mut ids = Vec::new();
    for parent_id in free_parents(arena)? {
        for &child_id in &arena.get(parent_id)?.children_ids {
            if arena.get(child_id)?.is_text() {
                ids.push(child_id);
            }
        }
    }
    Ok(ids)
}

pub struct RemoveComments;

impl RemoveComments {
    /// Comments among `children` that can go without gluing the text around
    /// them into a character reference (`&am<!-- -->p;` stays)
    fn removable(arena: &DomArena, children: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut ids = Vec::new();
        let mut open_reference = false;

        for (i, &child_id) in children.iter().enumerate() {
            let child = arena.get(child_id)?;
            if child.is_text() {
                open_reference = ends_in_open_reference(&child.node_value);
                continue;
            }
            if !is_removable_comment(child) {
                open_reference = false;
                continue;
            }
            if open_reference && Self::next_text_continues(arena, &children[i + 1..])? {
                open_reference = false;
                continue;
            }
            ids.push(child_id);
        }
        Ok(ids)
    }

    /// The first node after any further removable comments is text that
    /// would extend a reference
    fn next_text_continues(arena: &DomArena, rest: &[NodeId]) -> Result<bool> {
        for &id in rest {
            let node = arena.get(id)?;
            if is_removable_comment(node) {
                continue;
            }
            return Ok(node.is_text() && continues_reference(&node.node_value));
        }
        Ok(false)
    }
}

impl Pass for RemoveComments {
    fn name(&self) -> PassName {
        PassName::RemoveComments
    }

    fn apply(&self, arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        let mut comments = Vec::new();
        for id in arena.descendants()? {
            let children = &arena.get(id)?.children_ids;
            if !children.is_empty() {
                comments.extend(Self::removable(arena, children)?);
            }
        }
        Ok(arena.detach_all(&comments)?)
    }
}

/// Collapse whitespace runs in text to one space
pub struct SumUpWhitespace;

impl Pass for SumUpWhitespace {
    fn name(&self) -> PassName {
        PassName::SumUpWhitespace
    }

    fn apply(&self, arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        let mut changes = 0;
        for id in free_text_nodes(arena)? {
            let node = arena.get_mut(id)?;
            let collapsed = collapse_whitespace(&node.node_value);
            if collapsed != node.node_value {
                node.node_value = collapsed;
                changes += 1;
            }
        }
        Ok(changes)
    }
}

/// Whitespace touching a block boundary is never rendered
pub struct WhitespaceAroundTags;

impl WhitespaceAroundTags {
    /// Element on this side is a block, or there is nothing on this side
    /// and the parent is a block
    fn block_edge(sibling: Option<&DomNode>, parent_is_block: bool) -> bool {
        match sibling {
            Some(node) => node.is_element() && is_block_element(&node.node_name),
            None => parent_is_block,
        }
    }

    /// Children of these hold no rendered text, only markup
    fn is_markup_container(parent: &DomNode) -> bool {
        parent.node_type == NodeType::Document || parent.is_tag("html") || parent.is_tag("head")
    }

    fn trimmed(
        value: &str,
        prev: Option<&DomNode>,
        next: Option<&DomNode>,
        parent: &DomNode,
    ) -> String {
        if Self::is_markup_container(parent) && is_blank(value) {
            return String::new();
        }
        let parent_is_block = parent.is_element() && is_block_element(&parent.node_name);
        let mut text = value;
        if Self::block_edge(prev, parent_is_block) {
            text = trim_start_whitespace(text);
        }
        if Self::block_edge(next, parent_is_block) {
            text = trim_end_whitespace(text);
        }
        text.to_string()
    }
}

impl Pass for WhitespaceAroundTags {
    fn name(&self) -> PassName {
        PassName::RemoveWhitespaceAroundTags
    }

    fn apply(&self, arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        let mut changes = 0;
        for parent_id in free_parents(arena)? {
            let children = arena.get(parent_id)?.children_ids.clone();
            for (i, &id) in children.iter().enumerate() {
                let node = arena.get(id)?;
                if !node.is_text() {
                    continue;
                }
                let prev = match i.checked_sub(1) {
                    Some(at) => Some(arena.get(children[at])?),
                    None => None,
                };
                let next = match children.get(i + 1) {
                    Some(&next_id) => Some(arena.get(next_id)?),
                    None => None,
                };
                let trimmed = Self::trimmed(&node.node_value, prev, next, arena.get(parent_id)?);

                let node = arena.get_mut(id)?;
                if trimmed != node.node_value {
                    node.node_value = trimmed;
                    changes += 1;
                }
            }
        }
        // Emptied text nodes are dropped by the normalize step after the pass
        Ok(changes)
    }
}

/// Drop whitespace-only text between tags. Can change inline layout.
pub struct SpacesBetweenTags;

impl Pass for SpacesBetweenTags {
    fn name(&self) -> PassName {
        PassName::RemoveSpacesBetweenTags
    }

    fn apply(&self, arena: &mut DomArena, _ctx: &PassContext) -> Result<usize> {
        let mut blank = Vec::new();
        for id in free_text_nodes(arena)? {
            if is_blank(&arena.get(id)?.node_value) {
                blank.push(id);
            }
        }
        Ok(arena.detach_all(&blank)?)
    }
}
