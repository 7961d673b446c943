use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// One of the three physical storage areas tracked per kitchen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KitchenLocation {
    Fridge,
    Pantry,
    Freezer,
}

impl KitchenLocation {
    pub const ALL: [KitchenLocation; 3] = [
        KitchenLocation::Fridge,
        KitchenLocation::Pantry,
        KitchenLocation::Freezer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KitchenLocation::Fridge => "fridge",
            KitchenLocation::Pantry => "pantry",
            KitchenLocation::Freezer => "freezer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fridge" => Some(KitchenLocation::Fridge),
            "pantry" => Some(KitchenLocation::Pantry),
            "freezer" => Some(KitchenLocation::Freezer),
            _ => None,
        }
    }
}

impl fmt::Display for KitchenLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded upload retained as the location's preview until the next clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// One insertion-ordered, duplicate-free item set per location, plus the
/// preview image from the last scan. Identity is exact string equality;
/// every mutation replaces a location's whole slice.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    fridge: IndexSet<String>,
    pantry: IndexSet<String>,
    freezer: IndexSet<String>,
    fridge_preview: Option<PreviewImage>,
    pantry_preview: Option<PreviewImage>,
    freezer_preview: Option<PreviewImage>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self, location: KitchenLocation) -> Vec<String> {
        self.slot(location).iter().cloned().collect()
    }

    pub fn len(&self, location: KitchenLocation) -> usize {
        self.slot(location).len()
    }

    pub fn is_empty(&self) -> bool {
        KitchenLocation::ALL
            .iter()
            .all(|location| self.slot(*location).is_empty())
    }

    /// Union newly scanned names into a location, keeping existing order
    /// and appending new names. Returns how many were actually new.
    pub fn merge_scanned(
        &mut self,
        location: KitchenLocation,
        scanned: impl IntoIterator<Item = String>,
    ) -> usize {
        let mut merged = self.slot(location).clone();
        let before = merged.len();
        for name in scanned {
            if !name.is_empty() {
                merged.insert(name);
            }
        }
        let added = merged.len() - before;
        *self.slot_mut(location) = merged;
        added
    }

    pub fn add_item(&mut self, location: KitchenLocation, name: impl Into<String>) -> bool {
        let name = name.into();
        if name.is_empty() {
            return false;
        }
        let mut merged = self.slot(location).clone();
        let added = merged.insert(name);
        *self.slot_mut(location) = merged;
        added
    }

    pub fn remove_item(&mut self, location: KitchenLocation, name: &str) -> bool {
        let mut remaining = self.slot(location).clone();
        let removed = remaining.shift_remove(name);
        *self.slot_mut(location) = remaining;
        removed
    }

    /// Drops the location's items and its preview.
    pub fn clear(&mut self, location: KitchenLocation) {
        *self.slot_mut(location) = IndexSet::new();
        *self.preview_mut(location) = None;
    }

    pub fn set_preview(&mut self, location: KitchenLocation, preview: PreviewImage) {
        *self.preview_mut(location) = Some(preview);
    }

    pub fn preview(&self, location: KitchenLocation) -> Option<&PreviewImage> {
        match location {
            KitchenLocation::Fridge => self.fridge_preview.as_ref(),
            KitchenLocation::Pantry => self.pantry_preview.as_ref(),
            KitchenLocation::Freezer => self.freezer_preview.as_ref(),
        }
    }

    fn slot(&self, location: KitchenLocation) -> &IndexSet<String> {
        match location {
            KitchenLocation::Fridge => &self.fridge,
            KitchenLocation::Pantry => &self.pantry,
            KitchenLocation::Freezer => &self.freezer,
        }
    }

    fn slot_mut(&mut self, location: KitchenLocation) -> &mut IndexSet<String> {
        match location {
            KitchenLocation::Fridge => &mut self.fridge,
            KitchenLocation::Pantry => &mut self.pantry,
            KitchenLocation::Freezer => &mut self.freezer,
        }
    }

    fn preview_mut(&mut self, location: KitchenLocation) -> &mut Option<PreviewImage> {
        match location {
            KitchenLocation::Fridge => &mut self.fridge_preview,
            KitchenLocation::Pantry => &mut self.pantry_preview,
            KitchenLocation::Freezer => &mut self.freezer_preview,
        }
    }
}

/// Missing ingredients flagged for the next grocery run.
#[derive(Debug, Clone, Default)]
pub struct ShoppingList {
    items: IndexSet<String>,
}

impl ShoppingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name.is_empty() {
            return false;
        }
        self.items.insert(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.items.shift_remove(name)
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
