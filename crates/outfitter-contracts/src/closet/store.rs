use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage::KeyValueStorage;
use crate::catalog::Category;
use crate::errors::OutfitError;
use crate::session::SelectionSet;

pub const CLOSET_STORAGE_KEY: &str = "outfitterCloset";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorableClothingItem {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Data URI of the photo.
    pub base64: String,
    pub mime_type: String,
    pub category: Category,
}

/// A closet item before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClothingItem {
    pub name: String,
    pub size: u64,
    pub base64: String,
    pub mime_type: String,
    pub category: Category,
}

/// The user's persisted closet.
///
/// The whole collection is serialized into one storage slot after every
/// mutation. Storage failures are logged and never surface to the caller:
/// a failed load starts empty, a failed save is dropped.
#[derive(Debug)]
pub struct ClosetStore<S: KeyValueStorage> {
    storage: S,
    items: Vec<StorableClothingItem>,
}

impl<S: KeyValueStorage> ClosetStore<S> {
    pub fn load(storage: S) -> Self {
        let items = match storage.get_item(CLOSET_STORAGE_KEY) {
            Ok(Some(raw)) => parse_items(&raw),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load closet items; starting empty");
                Vec::new()
            }
        };
        Self { storage, items }
    }

    pub fn items(&self) -> &[StorableClothingItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StorableClothingItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Closet items whose ids are selected, in closet order. Selected ids that
    /// no longer exist are ignored.
    pub fn selected(&self, selection: &SelectionSet) -> Vec<&StorableClothingItem> {
        self.items
            .iter()
            .filter(|item| selection.contains(&item.id))
            .collect()
    }

    /// Appends a categorized item under a fresh id and persists the closet.
    pub fn add(&mut self, item: NewClothingItem) -> Result<StorableClothingItem, OutfitError> {
        if !item.category.is_categorized() {
            return Err(OutfitError::validation(format!(
                "'{}' needs a category before it can go into the closet",
                item.name
            )));
        }
        let stored = StorableClothingItem {
            id: self.next_item_id(),
            name: item.name,
            size: item.size,
            base64: item.base64,
            mime_type: item.mime_type,
            category: item.category,
        };
        self.items.push(stored.clone());
        self.save();
        Ok(stored)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        self.save();
        removed
    }

    /// Overwrites the storage slot with the full collection.
    pub fn save(&mut self) {
        let raw = match serde_json::to_string(&self.items) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize closet items");
                return;
            }
        };
        if let Err(err) = self.storage.set_item(CLOSET_STORAGE_KEY, &raw) {
            tracing::error!(error = %err, "failed to save closet items");
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn next_item_id(&self) -> String {
        loop {
            let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
            let id = format!("item-{}-{suffix}", chrono::Utc::now().timestamp_millis());
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

fn parse_items(raw: &str) -> Vec<StorableClothingItem> {
    let parsed: Vec<StorableClothingItem> = match serde_json::from_str(raw) {
        Ok(items) => items,
        Err(err) => {
            let err = OutfitError::persistence(format!("stored closet is malformed: {err}"));
            tracing::warn!(error = %err, "failed to load closet items; starting empty");
            return Vec::new();
        }
    };
    let mut seen = HashSet::new();
    parsed
        .into_iter()
        .filter(|item| {
            if !item.category.is_categorized() {
                tracing::warn!(id = %item.id, "dropping closet item without a category");
                return false;
            }
            let fresh = seen.insert(item.id.clone());
            if !fresh {
                tracing::warn!(id = %item.id, "dropping closet item with duplicate id");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{ClosetStore, NewClothingItem, CLOSET_STORAGE_KEY};
    use crate::catalog::Category;
    use crate::closet::{FileStorage, KeyValueStorage, MemoryStorage};
    use crate::errors::OutfitError;
    use crate::session::SelectionSet;

    struct FailingStorage;

    impl KeyValueStorage for FailingStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, OutfitError> {
            Err(OutfitError::persistence("quota exceeded"))
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), OutfitError> {
            Err(OutfitError::persistence("quota exceeded"))
        }
    }

    fn new_item(name: &str, category: Category) -> NewClothingItem {
        NewClothingItem {
            name: name.to_string(),
            size: 4,
            base64: "data:image/png;base64,AAAA".to_string(),
            mime_type: "image/png".to_string(),
            category,
        }
    }

    #[test]
    fn add_assigns_unique_ids_and_keeps_order() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(MemoryStorage::new());
        for idx in 0..25 {
            closet.add(new_item(&format!("shirt-{idx}.png"), Category::Top))?;
        }
        let ids: HashSet<&str> = closet.items().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids.len(), 25);
        assert_eq!(closet.items()[0].name, "shirt-0.png");
        assert_eq!(closet.items()[24].name, "shirt-24.png");
        assert!(closet.items().iter().all(|item| item.id.starts_with("item-")));
        Ok(())
    }

    #[test]
    fn every_mutation_persists_whole_collection() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(MemoryStorage::new());
        let shirt = closet.add(new_item("shirt.png", Category::Top))?;
        closet.add(new_item("jeans.png", Category::Bottom))?;

        let reloaded = ClosetStore::load(closet.storage().clone());
        assert_eq!(reloaded.items(), closet.items());

        assert!(closet.remove(&shirt.id));
        assert!(!closet.remove(&shirt.id));
        let reloaded = ClosetStore::load(closet.into_storage());
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.items()[0].name, "jeans.png");
        Ok(())
    }

    #[test]
    fn save_load_save_is_byte_identical() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        let mut closet = ClosetStore::load(FileStorage::new(&path));
        closet.add(new_item("shirt.png", Category::Top))?;
        closet.add(new_item("boots.png", Category::Shoes))?;
        let first = std::fs::read(&path)?;

        let mut reloaded = ClosetStore::load(FileStorage::new(&path));
        reloaded.save();
        let second = std::fs::read(&path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn stored_json_uses_camel_case_fields() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(MemoryStorage::new());
        closet.add(new_item("dress.png", Category::FullbodyOuterwear))?;
        let raw = closet.storage().get_item(CLOSET_STORAGE_KEY)?.unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(parsed[0]["mimeType"], "image/png");
        assert_eq!(parsed[0]["category"], "fullbody_outerwear");
        assert_eq!(parsed[0]["size"], 4);
        Ok(())
    }

    #[test]
    fn malformed_slot_loads_as_empty() -> anyhow::Result<()> {
        let mut storage = MemoryStorage::new();
        storage.set_item(CLOSET_STORAGE_KEY, "{\"broken\":")?;
        let closet = ClosetStore::load(storage);
        assert!(closet.is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() -> anyhow::Result<()> {
        let mut storage = MemoryStorage::new();
        storage.set_item(
            CLOSET_STORAGE_KEY,
            r#"[
                {"id":"item-1","name":"a","size":1,"base64":"x","mimeType":"image/png","category":"top"},
                {"id":"item-1","name":"b","size":1,"base64":"x","mimeType":"image/png","category":"top"}
            ]"#,
        )?;
        let closet = ClosetStore::load(storage);
        assert_eq!(closet.len(), 1);
        assert_eq!(closet.items()[0].name, "a");
        Ok(())
    }

    #[test]
    fn storage_failures_are_not_fatal() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(FailingStorage);
        assert!(closet.is_empty());
        let item = closet.add(new_item("shirt.png", Category::Top))?;
        assert_eq!(closet.get(&item.id), Some(&item));
        assert!(closet.remove(&item.id));
        Ok(())
    }

    #[test]
    fn uncategorized_items_never_enter_the_closet() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(MemoryStorage::new());
        let err = closet.add(new_item("mystery.png", Category::Uncategorized)).err();
        assert_eq!(err.map(|err| err.kind()), Some("validation"));
        assert!(closet.is_empty());
        assert_eq!(closet.storage().get_item(CLOSET_STORAGE_KEY)?, None);

        let mut storage = MemoryStorage::new();
        storage.set_item(
            CLOSET_STORAGE_KEY,
            r#"[
                {"id":"item-1","name":"a","size":1,"base64":"x","mimeType":"image/png","category":"uncategorized"},
                {"id":"item-2","name":"b","size":1,"base64":"x","mimeType":"image/png","category":"shoes"}
            ]"#,
        )?;
        let closet = ClosetStore::load(storage);
        assert_eq!(closet.len(), 1);
        assert_eq!(closet.items()[0].id, "item-2");
        Ok(())
    }

    #[test]
    fn selected_follows_closet_order_and_skips_stale_ids() -> anyhow::Result<()> {
        let mut closet = ClosetStore::load(MemoryStorage::new());
        let shirt = closet.add(new_item("shirt.png", Category::Top))?;
        let jeans = closet.add(new_item("jeans.png", Category::Bottom))?;

        let mut selection = SelectionSet::new();
        selection.toggle(&jeans.id);
        selection.toggle("item-gone");
        selection.toggle(&shirt.id);

        let names: Vec<&str> = closet
            .selected(&selection)
            .into_iter()
            .map(|item| item.name.as_str())
            .collect();
        assert_eq!(names, vec!["shirt.png", "jeans.png"]);
        Ok(())
    }
}
