//! Selection-synchronized floating panel controller.
//!
//! One controller per attribute-editing block kind (card, button). The host
//! calls [`PanelController::sync`] on every selection-change and
//! document-update notification; the controller decides visibility, anchors
//! the panel against the active node's rectangle, and keeps a local mirror
//! of the node's attributes for the panel's input controls.
//!
//! The one correctness rule that everything here serves: while any of the
//! panel's own inputs holds focus, a resync must not run. The local mirror
//! is authoritative during editing, and a selection-driven refresh would
//! overwrite in-flight keystrokes.

use std::collections::BTreeMap;

use composer_core::{Attrs, Editor, Node, active_node_path, update_attributes};
use serde_json::Value;

use crate::layout::{NodeLayout, Rect};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PanelState {
    #[default]
    Hidden,
    Visible {
        rect: Rect,
    },
}

pub struct PanelController {
    kind: String,
    state: PanelState,
    mirror: Attrs,
    drafts: BTreeMap<String, String>,
    focus_within: bool,
}

impl PanelController {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            state: PanelState::default(),
            mirror: Attrs::default(),
            drafts: BTreeMap::new(),
            focus_within: false,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, PanelState::Visible { .. })
    }

    pub fn rect(&self) -> Option<Rect> {
        match &self.state {
            PanelState::Visible { rect } => Some(*rect),
            PanelState::Hidden => None,
        }
    }

    /// Local snapshot of the active node's attributes. Authoritative while
    /// the panel is being edited.
    pub fn mirror(&self) -> &Attrs {
        &self.mirror
    }

    pub fn focus_within(&self) -> bool {
        self.focus_within
    }

    /// The host reports focus entering or leaving the panel's own inputs.
    pub fn set_focus_within(&mut self, focus_within: bool) {
        self.focus_within = focus_within;
    }

    /// Recompute visibility, anchor and mirror from the current selection.
    /// Skipped entirely while the panel holds focus.
    pub fn sync(&mut self, editor: &Editor, layout: &dyn NodeLayout) {
        if self.focus_within {
            return;
        }
        self.resync(editor, layout);
    }

    /// Blur of the whole editor surface: one more recompute so the panel can
    /// hide when focus leaves entirely. Focus moving *into* the panel is
    /// excluded by the same containment check as `sync`.
    pub fn on_editor_blur(&mut self, editor: &Editor, layout: &dyn NodeLayout) {
        if self.focus_within {
            return;
        }
        self.resync(editor, layout);
    }

    fn resync(&mut self, editor: &Editor, layout: &dyn NodeLayout) {
        let Some(path) = active_node_path(editor, &self.kind) else {
            self.state = PanelState::Hidden;
            self.mirror.clear();
            self.drafts.clear();
            return;
        };

        let attrs = match node_attrs(editor.doc(), &path) {
            Some(attrs) => attrs,
            None => {
                self.state = PanelState::Hidden;
                self.mirror.clear();
                self.drafts.clear();
                return;
            }
        };

        let Some(rect) = layout.node_rect(&path) else {
            self.state = PanelState::Hidden;
            self.mirror.clear();
            self.drafts.clear();
            return;
        };

        self.mirror = attrs;
        self.drafts.clear();
        self.state = PanelState::Visible { rect };
    }

    /// Instant attributes (preset swatch, dropdown pick) commit immediately.
    pub fn commit_instant(&mut self, editor: &mut Editor, key: &str, value: Value) -> bool {
        self.mirror.insert(key.to_string(), value.clone());
        let mut partial = Attrs::default();
        partial.insert(key.to_string(), value);
        update_attributes(editor, &self.kind, partial)
    }

    /// Typed attributes buffer every keystroke locally; nothing reaches the
    /// document until [`PanelController::commit_field`].
    pub fn edit_field(&mut self, key: &str, text: impl Into<String>) {
        self.drafts.insert(key.to_string(), text.into());
    }

    /// Pending draft text for a field, falling back to the mirrored value.
    pub fn field_text(&self, key: &str) -> String {
        if let Some(draft) = self.drafts.get(key) {
            return draft.clone();
        }
        self.mirror
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Commit a typed field on blur or Enter. Bare numbers gain a `px`
    /// suffix; values that already carry a unit pass through unchanged.
    /// Committing an unchanged value is skipped so undo history stays clean.
    pub fn commit_field(&mut self, editor: &mut Editor, key: &str) -> bool {
        let Some(draft) = self.drafts.remove(key) else {
            return false;
        };
        let value = normalize_length(&draft);
        let current = self.mirror.get(key).and_then(|v| v.as_str());
        if current == Some(value.as_str()) {
            return false;
        }
        self.commit_instant(editor, key, Value::String(value))
    }
}

/// Appends `px` to a committed bare-numeric value: `"12"` becomes `"12px"`,
/// `"12%"` and `"1.5em"` are left alone.
pub fn normalize_length(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let is_bare_number = trimmed.parse::<f64>().is_ok();
    if is_bare_number {
        format!("{trimmed}px")
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidesMode {
    Unified,
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// Editable model for four-sided CSS shorthand values (padding, border
/// radius). A value set is unified iff all four sides are textually equal.
/// Switching modes only changes how the panel edits the value; it never
/// commits by itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidesField {
    mode: SidesMode,
    top: String,
    right: String,
    bottom: String,
    left: String,
}

impl SidesField {
    pub fn from_value(value: &str) -> Self {
        let parts: Vec<&str> = value.split_whitespace().collect();
        let (top, right, bottom, left) = match parts.as_slice() {
            [] => ("", "", "", ""),
            [all] => (*all, *all, *all, *all),
            [tb, rl] => (*tb, *rl, *tb, *rl),
            [t, rl, b] => (*t, *rl, *b, *rl),
            [t, r, b, l, ..] => (*t, *r, *b, *l),
        };
        let mut field = Self {
            mode: SidesMode::Independent,
            top: top.to_string(),
            right: right.to_string(),
            bottom: bottom.to_string(),
            left: left.to_string(),
        };
        if field.is_unified() {
            field.mode = SidesMode::Unified;
        }
        field
    }

    pub fn mode(&self) -> SidesMode {
        self.mode
    }

    pub fn is_unified(&self) -> bool {
        self.top == self.right && self.right == self.bottom && self.bottom == self.left
    }

    pub fn side(&self, side: Side) -> &str {
        match side {
            Side::Top => &self.top,
            Side::Right => &self.right,
            Side::Bottom => &self.bottom,
            Side::Left => &self.left,
        }
    }

    /// Switching to unified adopts the top value for all four sides;
    /// switching to independent keeps the sides as they are.
    pub fn toggle_mode(&mut self) {
        match self.mode {
            SidesMode::Unified => self.mode = SidesMode::Independent,
            SidesMode::Independent => {
                let top = self.top.clone();
                self.set_all(top);
                self.mode = SidesMode::Unified;
            }
        }
    }

    pub fn set_all(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.top = value.clone();
        self.right = value.clone();
        self.bottom = value.clone();
        self.left = value;
    }

    pub fn set_side(&mut self, side: Side, value: impl Into<String>) {
        let value = value.into();
        match side {
            Side::Top => self.top = value,
            Side::Right => self.right = value,
            Side::Bottom => self.bottom = value,
            Side::Left => self.left = value,
        }
    }

    /// Minimal CSS serialization with each side length-normalized: one value
    /// when unified, four otherwise.
    pub fn css_value(&self) -> String {
        if self.is_unified() {
            normalize_length(&self.top)
        } else {
            format!(
                "{} {} {} {}",
                normalize_length(&self.top),
                normalize_length(&self.right),
                normalize_length(&self.bottom),
                normalize_length(&self.left)
            )
        }
    }
}

/// Attribute map of the node at `path`, used by panels for their mirror.
pub fn node_attrs(doc: &composer_core::Document, path: &composer_core::Path) -> Option<Attrs> {
    match composer_core::node_at_path(doc, path)? {
        Node::Element(el) => Some(el.attrs.clone()),
        Node::Void(v) => Some(v.attrs.clone()),
        Node::Text(_) => None,
    }
}
