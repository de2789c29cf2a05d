//! Slash-command palette: a filterable command list opened by a trigger
//! character, navigated with a wraparound cursor, confirmed with Enter.
//!
//! The trigger-text matching itself lives in the host input layer; this
//! module owns the filtering policy and the keyboard state machine, and
//! hands the confirmed item the full trigger range so its action can delete
//! the typed `/query` before inserting anything.

use std::sync::Arc;

use composer_core::{
    Editor, Node, Op, Transaction, TriggerRange, banner_node, button_node, card_node,
    column_block_node, insert_templated_fragment,
};

use crate::layout::Rect;

pub type PaletteAction = Arc<dyn Fn(&mut Editor, &TriggerRange) + Send + Sync>;

#[derive(Clone)]
pub struct PaletteItem {
    pub title: String,
    pub description: String,
    pub search_terms: Vec<String>,
    pub icon: String,
    pub category: String,
    pub action: PaletteAction,
}

impl PaletteItem {
    pub fn new(
        title: impl Into<String>,
        action: impl Fn(&mut Editor, &TriggerRange) + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            search_terms: Vec::new(),
            icon: String::new(),
            category: "blocks".to_string(),
            action: Arc::new(action),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn search_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Case-insensitive substring match against the title or any search term.
/// An empty query keeps every item, in original order.
pub fn filter_items<'a>(items: &'a [PaletteItem], query: &str) -> Vec<&'a PaletteItem> {
    if query.is_empty() {
        return items.iter().collect();
    }
    let needle = query.to_lowercase();
    items
        .iter()
        .filter(|item| {
            item.title.to_lowercase().contains(&needle)
                || item
                    .search_terms
                    .iter()
                    .any(|term| term.to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum PaletteState {
    Idle,
    Suggesting {
        query: String,
        trigger: TriggerRange,
        trigger_char_len: usize,
        anchor: Rect,
        index: usize,
    },
}

pub struct Palette {
    items: Vec<PaletteItem>,
    state: PaletteState,
}

impl Palette {
    pub fn new(items: Vec<PaletteItem>) -> Self {
        Self {
            items,
            state: PaletteState::Idle,
        }
    }

    /// Swap in a rebuilt item list (presets changed). An open suggestion
    /// keeps its query; the cursor is reset since the list shifted.
    pub fn set_items(&mut self, items: Vec<PaletteItem>) {
        self.items = items;
        if let PaletteState::Suggesting { index, .. } = &mut self.state {
            *index = 0;
        }
    }

    pub fn items(&self) -> &[PaletteItem] {
        &self.items
    }

    pub fn is_suggesting(&self) -> bool {
        matches!(self.state, PaletteState::Suggesting { .. })
    }

    pub fn query(&self) -> Option<&str> {
        match &self.state {
            PaletteState::Suggesting { query, .. } => Some(query),
            PaletteState::Idle => None,
        }
    }

    pub fn anchor(&self) -> Option<Rect> {
        match &self.state {
            PaletteState::Suggesting { anchor, .. } => Some(*anchor),
            PaletteState::Idle => None,
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        match &self.state {
            PaletteState::Suggesting { index, .. } => Some(*index),
            PaletteState::Idle => None,
        }
    }

    /// Entered when the host sees the trigger character typed at a valid
    /// text position. `trigger` covers exactly the trigger character.
    pub fn open(&mut self, trigger: TriggerRange, anchor: Rect) {
        let trigger_char_len = trigger.range.end.saturating_sub(trigger.range.start);
        self.state = PaletteState::Suggesting {
            query: String::new(),
            trigger,
            trigger_char_len,
            anchor,
            index: 0,
        };
    }

    /// Every keystroke while suggesting re-filters; the trigger range grows
    /// to keep covering the trigger character plus the typed query.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let PaletteState::Suggesting {
            query: current,
            trigger,
            trigger_char_len,
            index,
            ..
        } = &mut self.state
        else {
            return;
        };
        *current = query.into();
        trigger.range.end = trigger.range.start + *trigger_char_len + current.len();
        *index = 0;
    }

    pub fn filtered(&self) -> Vec<&PaletteItem> {
        match &self.state {
            PaletteState::Suggesting { query, .. } => filter_items(&self.items, query),
            PaletteState::Idle => Vec::new(),
        }
    }

    pub fn move_up(&mut self) {
        let len = self.filtered().len();
        let PaletteState::Suggesting { index, .. } = &mut self.state else {
            return;
        };
        if len == 0 {
            return;
        }
        *index = (*index + len - 1) % len;
    }

    pub fn move_down(&mut self) {
        let len = self.filtered().len();
        let PaletteState::Suggesting { index, .. } = &mut self.state else {
            return;
        };
        if len == 0 {
            return;
        }
        *index = (*index + 1) % len;
    }

    /// Enter: run the highlighted item's action with the trigger range and
    /// return to idle. Confirming an empty list is a cancel.
    pub fn confirm(&mut self, editor: &mut Editor) -> bool {
        let (action, trigger) = {
            let PaletteState::Suggesting { trigger, index, .. } = &self.state else {
                return false;
            };
            let filtered = self.filtered();
            let Some(item) = filtered.get((*index).min(filtered.len().saturating_sub(1))) else {
                self.state = PaletteState::Idle;
                return false;
            };
            (item.action.clone(), trigger.clone())
        };

        self.state = PaletteState::Idle;
        (action)(editor, &trigger);
        true
    }

    /// Escape: back to idle without inserting anything.
    pub fn cancel(&mut self) {
        self.state = PaletteState::Idle;
    }
}

/// Deletes the typed trigger text without inserting anything else. Used by
/// actions that transform the current block in place.
pub fn delete_trigger(editor: &mut Editor, trigger: &TriggerRange) -> bool {
    let tx = Transaction::new(vec![Op::RemoveText {
        path: trigger.path.clone(),
        range: trigger.range.clone(),
    }])
    .source("palette:delete_trigger");
    editor.apply(tx).is_ok()
}

/// The compiled-in command list; preset-derived items are appended by the
/// palette builder.
pub fn standard_items() -> Vec<PaletteItem> {
    let mut items = Vec::new();

    for level in 1..=3u64 {
        items.push(
            PaletteItem::new(format!("Heading {level}"), move |editor, trigger| {
                delete_trigger(editor, trigger);
                let _ = editor.run_command("heading.set", Some(serde_json::json!({ "level": level })));
            })
            .description("Turn the current block into a heading.")
            .search_terms(["heading", "title", "big"])
            .icon("heading"),
        );
    }

    items.push(
        PaletteItem::new("Banner", |editor, trigger| {
            insert_templated_fragment(
                editor,
                banner_node("info", Vec::new()),
                Some(trigger.clone()),
            );
        })
        .description("Insert a callout banner.")
        .search_terms(["banner", "callout", "info", "warning", "success", "error"])
        .icon("banner"),
    );

    items.push(
        PaletteItem::new("Card", |editor, trigger| {
            insert_templated_fragment(
                editor,
                card_node(Default::default(), Vec::new()),
                Some(trigger.clone()),
            );
        })
        .description("Insert a styled content card.")
        .search_terms(["card", "box", "panel", "container"])
        .icon("card"),
    );

    items.push(
        PaletteItem::new("Button", |editor, trigger| {
            insert_templated_fragment(
                editor,
                button_node("Click me", Default::default()),
                Some(trigger.clone()),
            );
        })
        .description("Insert a call-to-action button.")
        .search_terms(["button", "link", "cta", "action"])
        .icon("button"),
    );

    for cols in [2usize, 3] {
        items.push(
            PaletteItem::new(format!("{cols} Columns"), move |editor, trigger| {
                insert_templated_fragment(editor, column_block_node(cols), Some(trigger.clone()));
            })
            .description("Insert a multi-column layout.")
            .search_terms(["columns", "layout", "grid"])
            .icon("columns"),
        );
    }

    items.push(
        PaletteItem::new("Divider", |editor, trigger| {
            insert_templated_fragment(editor, Node::divider(), Some(trigger.clone()));
        })
        .description("Insert a horizontal divider.")
        .search_terms(["hr", "line", "separator", "horizontal rule"])
        .icon("divider"),
    );

    items
}
