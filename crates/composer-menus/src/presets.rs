//! Preset persistence: named card attribute bundles saved outside any
//! document and surfaced back as palette items.
//!
//! The storage medium sits behind [`PresetStore`]; the palette-building and
//! change-broadcast logic does not care whether presets live in a JSON file
//! or in memory. Saves are append-only read-modify-writes: duplicate titles
//! are allowed and each saved entry stays its own palette item.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use composer_core::{Attrs, card_node, insert_templated_fragment};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::palette::PaletteItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub attributes: Attrs,
}

impl Preset {
    pub fn new(title: impl Into<String>, attributes: Attrs) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            icon: String::new(),
            attributes,
        }
    }
}

#[derive(Debug, Error)]
pub enum PresetStoreError {
    #[error("preset storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("preset storage is corrupt: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub trait PresetStore: Send + Sync {
    fn load(&self) -> Result<Vec<Preset>, PresetStoreError>;
    fn save(&self, presets: &[Preset]) -> Result<(), PresetStoreError>;
}

/// In-process store, used in tests and as a session-scoped fallback.
#[derive(Default)]
pub struct MemoryStore {
    presets: Mutex<Vec<Preset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetStore for MemoryStore {
    fn load(&self) -> Result<Vec<Preset>, PresetStoreError> {
        Ok(self.presets.lock().expect("preset store poisoned").clone())
    }

    fn save(&self, presets: &[Preset]) -> Result<(), PresetStoreError> {
        *self.presets.lock().expect("preset store poisoned") = presets.to_vec();
        Ok(())
    }
}

/// File-backed store holding one JSON array. A missing file is an empty
/// list; an entry that does not deserialize is skipped with a warning so one
/// bad record never hides the rest.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl PresetStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Preset>, PresetStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        let mut presets = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<Preset>(entry) {
                Ok(preset) => presets.push(preset),
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "skipping malformed preset entry");
                }
            }
        }
        Ok(presets)
    }

    fn save(&self, presets: &[Preset]) -> Result<(), PresetStoreError> {
        let json = serde_json::to_string_pretty(presets)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Appends a preset and broadcasts the change. The read half of the
/// read-modify-write tolerates a corrupt store: the save starts a fresh list
/// rather than failing, matching the storage's last-full-write-wins model.
pub fn save_preset(
    store: &dyn PresetStore,
    bus: &ChangeBus,
    preset: Preset,
) -> Result<(), PresetStoreError> {
    let mut presets = match store.load() {
        Ok(presets) => presets,
        Err(err) => {
            warn!(%err, "preset list unreadable, starting a fresh list");
            Vec::new()
        }
    };
    presets.push(preset);
    store.save(&presets)?;
    bus.notify();
    Ok(())
}

type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<HashMap<u64, ChangeCallback>>,
    next_id: AtomicU64,
}

/// Payload-less "presets changed" signal. Every mounted editor subscribes on
/// mount and re-fetches the full list on receipt; dropping the returned
/// [`Subscription`] unsubscribes, so no listener outlives its editor.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .expect("change bus poisoned")
            .insert(id, Arc::new(callback));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn notify(&self) {
        // Snapshot under the lock, invoke outside it: a callback may save
        // another preset and notify again.
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .subscribers
            .lock()
            .expect("change bus poisoned")
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .expect("change bus poisoned")
            .len()
    }
}

pub struct Subscription {
    inner: Weak<BusInner>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .subscribers
                .lock()
                .expect("change bus poisoned")
                .remove(&self.id);
        }
    }
}

/// One palette item per persisted preset: inserting it creates a card with
/// the preset's attributes layered over the card defaults.
pub fn preset_item(preset: Preset) -> PaletteItem {
    let attributes = preset.attributes.clone();
    let description = if preset.description.is_empty() {
        "Insert a card from a saved style.".to_string()
    } else {
        preset.description.clone()
    };
    let icon = if preset.icon.is_empty() {
        "card".to_string()
    } else {
        preset.icon.clone()
    };

    PaletteItem::new(preset.title.clone(), move |editor, trigger| {
        insert_templated_fragment(
            editor,
            card_node(attributes.clone(), Vec::new()),
            Some(trigger.clone()),
        );
    })
    .description(description)
    .search_terms(["preset", "card", "style"])
    .icon(icon)
    .category("presets")
}

/// Static command list plus the persisted presets. A failing store logs and
/// yields the static list only; the palette never goes down with storage.
pub fn build_palette_items(
    static_items: Vec<PaletteItem>,
    store: &dyn PresetStore,
) -> Vec<PaletteItem> {
    let mut items = static_items;
    match store.load() {
        Ok(presets) => {
            for preset in presets {
                items.push(preset_item(preset));
            }
        }
        Err(err) => {
            warn!(%err, "presets unavailable, palette falls back to built-in items");
        }
    }
    items
}
