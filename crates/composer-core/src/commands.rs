//! Host-facing command layer.
//!
//! Every command here is advisory: when its preconditions do not hold it
//! returns `false` and leaves the document untouched. UI panels call these
//! speculatively while the selection races ahead of them, so a missing
//! target is normal control flow, never an error. Passing a kind that is not
//! registered in the schema is a programmer error and panics.

use std::ops::Range;

use crate::core::{Attrs, AttrPatch, Editor, ElementNode, Node, Point, Selection};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{ChildConstraint, ancestor_element_path, children_at_path, node_at_path};

/// The text range occupied by a palette trigger (the typed `/query`),
/// deleted before the chosen fragment is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRange {
    pub path: Path,
    pub range: Range<usize>,
}

/// Path of the nearest ancestor of the selection anchor with this kind.
pub fn active_node_path(editor: &Editor, kind: &str) -> Option<Path> {
    assert_known_kind(editor, kind);
    ancestor_element_path(editor.doc(), &editor.selection().anchor.path, kind)
}

pub fn can_wrap(editor: &Editor, kind: &str) -> bool {
    assert_known_kind(editor, kind);
    wrap_selection_tx(editor, kind, Attrs::default()).is_some()
}

pub fn can_lift(editor: &Editor, kind: &str) -> bool {
    assert_known_kind(editor, kind);
    editor.registry().spec(kind).is_some_and(|s| !s.isolated)
        && ancestor_element_path(editor.doc(), &editor.selection().anchor.path, kind).is_some()
}

/// Wraps the block run spanning the selection in a new `kind` node, with
/// `attrs` merged over the kind's declared defaults.
pub fn wrap_selection_in(editor: &mut Editor, kind: &str, attrs: Attrs) -> bool {
    assert_known_kind(editor, kind);
    let Some(tx) = wrap_selection_tx(editor, kind, attrs) else {
        return false;
    };
    editor.apply(tx).is_ok()
}

/// Lifts out of `kind` when the selection already sits inside one,
/// otherwise wraps. Two consecutive calls with identical arguments restore
/// the pre-toggle document shape.
pub fn toggle_wrap(editor: &mut Editor, kind: &str, attrs: Attrs) -> bool {
    assert_known_kind(editor, kind);
    if ancestor_element_path(editor.doc(), &editor.selection().anchor.path, kind).is_some() {
        lift_out(editor, kind)
    } else {
        wrap_selection_in(editor, kind, attrs)
    }
}

/// Removes exactly one level of the nearest enclosing `kind` ancestor,
/// splicing its children into the parent.
pub fn lift_out(editor: &mut Editor, kind: &str) -> bool {
    assert_known_kind(editor, kind);
    if editor.registry().spec(kind).is_none_or(|s| s.isolated) {
        return false;
    }

    let sel = editor.selection().clone();
    let Some(target_path) = ancestor_element_path(editor.doc(), &sel.anchor.path, kind) else {
        return false;
    };
    let Some((target_ix, parent_path)) = target_path.split_last() else {
        return false;
    };
    let target_ix = *target_ix;
    let parent_path = parent_path.to_vec();
    let Some(Node::Element(target_el)) = node_at_path(editor.doc(), &target_path).cloned() else {
        return false;
    };

    let children = target_el.children;

    let mut ops: Vec<Op> = Vec::new();
    ops.push(Op::RemoveNode {
        path: target_path.clone(),
    });

    for (i, node) in children.into_iter().enumerate() {
        let mut path = parent_path.clone();
        path.push(target_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let remap_point = |point: &Point| -> Point {
        if point.path.len() < target_path.len() + 1 {
            return point.clone();
        }
        if !point.path.starts_with(&target_path) {
            return point.clone();
        }
        let inner_ix = point.path[target_path.len()];
        let mut new_path = parent_path.clone();
        new_path.push(target_ix + inner_ix);
        new_path.extend_from_slice(&point.path[target_path.len() + 1..]);
        Point {
            path: new_path,
            offset: point.offset,
        }
    };

    let selection_after = Selection {
        anchor: remap_point(&sel.anchor),
        focus: remap_point(&sel.focus),
    };

    let tx = Transaction::new(ops)
        .selection_after(selection_after)
        .source(format!("command:lift_out:{kind}"));
    editor.apply(tx).is_ok()
}

/// Shallow-merges `partial` into the attributes of the active node of
/// `kind`. Keys absent from `partial` are untouched. Returns `false`
/// without touching the document when no such node encloses the selection.
pub fn update_attributes(editor: &mut Editor, kind: &str, partial: Attrs) -> bool {
    assert_known_kind(editor, kind);
    if partial.is_empty() {
        return false;
    }
    let Some(path) =
        ancestor_element_path(editor.doc(), &editor.selection().anchor.path, kind)
    else {
        return false;
    };

    let tx = Transaction::new(vec![Op::SetNodeAttrs {
        path,
        patch: AttrPatch {
            set: partial,
            remove: Vec::new(),
        },
    }])
    .source(format!("command:update_attributes:{kind}"));
    editor.apply(tx).is_ok()
}

/// Inserts a prebuilt node subtree at the caret. With a trigger range, the
/// typed trigger text is deleted first; a trigger that emptied its paragraph
/// replaces that paragraph outright. A fresh paragraph always follows the
/// fragment so typing can continue below it.
pub fn insert_templated_fragment(
    editor: &mut Editor,
    node: Node,
    replace: Option<TriggerRange>,
) -> bool {
    let mut ops: Vec<Op> = Vec::new();

    let block_path: Option<Path>;
    let mut replace_block = false;

    match &replace {
        Some(trigger) => {
            let Some((_, block)) = trigger.path.split_last() else {
                return false;
            };
            let block = block.to_vec();
            let Some(Node::Element(block_el)) = node_at_path(editor.doc(), &block) else {
                return false;
            };

            let total_text: usize = block_el
                .children
                .iter()
                .map(|n| match n {
                    Node::Text(t) => t.text.len(),
                    _ => 0,
                })
                .sum();
            let removed = trigger.range.end.saturating_sub(trigger.range.start);
            replace_block = block_el.kind == "paragraph" && total_text <= removed;

            ops.push(Op::RemoveText {
                path: trigger.path.clone(),
                range: trigger.range.clone(),
            });
            block_path = Some(block);
        }
        None => {
            let focus = editor.selection().focus.clone();
            block_path = focus.path.split_last().map(|(_, p)| p.to_vec());
        }
    }

    let (parent_path, insert_at) = match &block_path {
        Some(block) if !block.is_empty() => {
            let (block_ix, parent) = block.split_last().expect("non-empty block path");
            if replace_block {
                ops.push(Op::RemoveNode { path: block.clone() });
                (parent.to_vec(), *block_ix)
            } else {
                (parent.to_vec(), block_ix + 1)
            }
        }
        _ => (Vec::new(), editor.doc().children.len()),
    };

    let fragment_path = {
        let mut path = parent_path.clone();
        path.push(insert_at);
        path
    };
    let paragraph_path = {
        let mut path = parent_path.clone();
        path.push(insert_at + 1);
        path
    };

    let caret_path = match first_text_rel_path(&node) {
        Some(rel) => {
            let mut path = fragment_path.clone();
            path.extend(rel);
            path
        }
        None => {
            let mut path = paragraph_path.clone();
            path.push(0);
            path
        }
    };

    ops.push(Op::InsertNode {
        path: fragment_path,
        node,
    });
    ops.push(Op::InsertNode {
        path: paragraph_path,
        node: Node::paragraph(""),
    });

    let tx = Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(caret_path, 0)))
        .source("command:insert_fragment");
    editor.apply(tx).is_ok()
}

fn assert_known_kind(editor: &Editor, kind: &str) {
    assert!(
        editor.registry().is_known_kind(kind),
        "unknown node kind: {kind}"
    );
}

fn wrap_selection_tx(editor: &Editor, kind: &str, attrs: Attrs) -> Option<Transaction> {
    let spec = editor.registry().spec(kind)?;
    if spec.is_void || spec.isolated {
        return None;
    }
    if !matches!(
        spec.children,
        ChildConstraint::BlockOnly | ChildConstraint::Any
    ) {
        return None;
    }

    let sel = editor.selection().clone();
    let (start, end) = ordered_selection_points(&sel);
    let start_block_path = start.path.split_last().map(|(_, p)| p.to_vec())?;
    let end_block_path = end.path.split_last().map(|(_, p)| p.to_vec())?;

    let (start_ix, start_parent) = start_block_path.split_last()?;
    let (end_ix, end_parent) = end_block_path.split_last()?;

    // Both ends must live in one container; a selection reaching across a
    // column boundary lands in different parents and is rejected here.
    if start_parent != end_parent {
        return None;
    }

    if !start_parent.is_empty() {
        let Some(Node::Element(parent_el)) = node_at_path(editor.doc(), start_parent) else {
            return None;
        };
        // The layout shell owns its columns; banners hold bare paragraphs.
        if parent_el.kind == "column_block" || parent_el.kind == "banner" {
            return None;
        }
    }

    let (start_ix, end_ix) = if start_ix <= end_ix {
        (*start_ix, *end_ix)
    } else {
        (*end_ix, *start_ix)
    };

    let parent_children = children_at_path(editor.doc(), start_parent)?;
    if start_ix >= parent_children.len() || end_ix >= parent_children.len() {
        return None;
    }

    let selected: Vec<Node> = parent_children
        .iter()
        .cloned()
        .take(end_ix + 1)
        .skip(start_ix)
        .collect();

    if selected
        .iter()
        .any(|n| matches!(n, Node::Element(el) if el.kind == "column"))
    {
        return None;
    }

    let mut merged = editor.registry().default_attrs(kind);
    merged.extend(attrs);

    let wrapper = Node::Element(ElementNode {
        kind: kind.to_string(),
        attrs: merged,
        children: selected,
    });

    let mut ops: Vec<Op> = Vec::new();
    for ix in (start_ix..=end_ix).rev() {
        let mut path = start_parent.to_vec();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    let mut insert_path = start_parent.to_vec();
    insert_path.push(start_ix);
    ops.push(Op::InsertNode {
        path: insert_path,
        node: wrapper,
    });

    let start_parent = start_parent.to_vec();
    let remap_point = |point: &Point| -> Point {
        if !point.path.starts_with(&start_parent) || point.path.len() < start_parent.len() + 2 {
            return point.clone();
        }
        let block_ix = point.path[start_parent.len()];
        if block_ix < start_ix || block_ix > end_ix {
            return point.clone();
        }
        let mut new_path = start_parent.clone();
        new_path.push(start_ix);
        new_path.push(block_ix - start_ix);
        new_path.extend_from_slice(&point.path[start_parent.len() + 1..]);
        Point {
            path: new_path,
            offset: point.offset,
        }
    };

    let selection_after = Selection {
        anchor: remap_point(&sel.anchor),
        focus: remap_point(&sel.focus),
    };

    Some(
        Transaction::new(ops)
            .selection_after(selection_after)
            .source(format!("command:wrap_selection:{kind}")),
    )
}

fn ordered_selection_points(sel: &Selection) -> (Point, Point) {
    let a = &sel.anchor;
    let b = &sel.focus;
    if (a.path.as_slice(), a.offset) <= (b.path.as_slice(), b.offset) {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

fn first_text_rel_path(node: &Node) -> Option<Path> {
    match node {
        Node::Text(_) => Some(Vec::new()),
        Node::Void(_) => None,
        Node::Element(el) => {
            for (ix, child) in el.children.iter().enumerate() {
                if let Some(mut rel) = first_text_rel_path(child) {
                    rel.insert(0, ix);
                    return Some(rel);
                }
            }
            None
        }
    }
}
