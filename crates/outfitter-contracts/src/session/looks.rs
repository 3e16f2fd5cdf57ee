use serde::{Deserialize, Serialize};

use crate::media::DataUri;

/// One look as produced by the response decoder, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLook {
    pub image: Option<DataUri>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Look {
    pub id: String,
    pub image: Option<DataUri>,
    pub description: String,
    pub is_favorited: bool,
}

/// What a results view lists: favorites once on their own, then every look
/// again, favorites included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookGroups<'a> {
    pub favorites: Vec<&'a Look>,
    pub all: &'a [Look],
}

/// The current batch of generated looks plus the favorite flags on them.
#[derive(Debug, Clone, Default)]
pub struct LookBatch {
    looks: Vec<Look>,
    last_stamp: i64,
}

impl LookBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the batch. Ids are `look-<millis>-<index>`; the stamp is
    /// bumped when needed so ids from an earlier batch never match.
    pub fn replace(&mut self, decoded: Vec<DecodedLook>) -> &[Look] {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + 1
        };
        self.last_stamp = stamp;
        self.looks = decoded
            .into_iter()
            .enumerate()
            .map(|(index, look)| Look {
                id: format!("look-{stamp}-{index}"),
                image: look.image,
                description: look.description,
                is_favorited: false,
            })
            .collect();
        &self.looks
    }

    pub fn clear(&mut self) {
        self.looks.clear();
    }

    pub fn looks(&self) -> &[Look] {
        &self.looks
    }

    pub fn get(&self, id: &str) -> Option<&Look> {
        self.looks.iter().find(|look| look.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.looks.is_empty()
    }

    /// Flips the flag of the matching look. Unknown ids, including ids from a
    /// replaced batch, are ignored and yield `None`.
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let look = self.looks.iter_mut().find(|look| look.id == id)?;
        look.is_favorited = !look.is_favorited;
        Some(look.is_favorited)
    }

    pub fn favorites(&self) -> Vec<&Look> {
        self.looks.iter().filter(|look| look.is_favorited).collect()
    }

    pub fn groups(&self) -> LookGroups<'_> {
        LookGroups {
            favorites: self.favorites(),
            all: &self.looks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodedLook, LookBatch};
    use crate::media::DataUri;

    fn decoded(descriptions: &[&str]) -> Vec<DecodedLook> {
        descriptions
            .iter()
            .map(|text| DecodedLook {
                image: Some(DataUri::new("image/png", "AAAA")),
                description: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn replace_assigns_ids_and_resets_favorites() {
        let mut batch = LookBatch::new();
        let first_id = batch.replace(decoded(&["one", "two"]))[0].id.clone();
        assert!(first_id.starts_with("look-"));
        assert!(first_id.ends_with("-0"));
        assert_eq!(batch.toggle_favorite(&first_id), Some(true));

        batch.replace(decoded(&["three"]));
        assert!(batch.favorites().is_empty());
        assert_eq!(batch.looks().len(), 1);
        assert!(!batch.looks()[0].is_favorited);
    }

    #[test]
    fn ids_never_repeat_across_batches() {
        let mut batch = LookBatch::new();
        let first = batch.replace(decoded(&["a"]))[0].id.clone();
        let second = batch.replace(decoded(&["b"]))[0].id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn toggle_twice_restores_flag() {
        let mut batch = LookBatch::new();
        let id = batch.replace(decoded(&["a", "b"]))[1].id.clone();
        assert_eq!(batch.toggle_favorite(&id), Some(true));
        assert_eq!(batch.toggle_favorite(&id), Some(false));
        assert!(batch.looks().iter().all(|look| !look.is_favorited));
    }

    #[test]
    fn stale_or_unknown_ids_are_noops() {
        let mut batch = LookBatch::new();
        let stale = batch.replace(decoded(&["a"]))[0].id.clone();
        batch.replace(decoded(&["b"]));
        assert_eq!(batch.toggle_favorite(&stale), None);
        assert_eq!(batch.toggle_favorite("look-nope"), None);
        assert!(batch.favorites().is_empty());

        batch.clear();
        assert_eq!(batch.toggle_favorite(&stale), None);
    }

    #[test]
    fn groups_list_favorites_then_everything() {
        let mut batch = LookBatch::new();
        let ids: Vec<String> = batch
            .replace(decoded(&["a", "b", "c"]))
            .iter()
            .map(|look| look.id.clone())
            .collect();
        batch.toggle_favorite(&ids[1]);

        let groups = batch.groups();
        assert_eq!(groups.favorites.len(), 1);
        assert_eq!(groups.favorites[0].description, "b");
        assert_eq!(groups.all.len(), 3);
    }

    #[test]
    fn look_serializes_with_camel_case_and_null_image() -> anyhow::Result<()> {
        let mut batch = LookBatch::new();
        batch.replace(vec![DecodedLook {
            image: None,
            description: "text only".to_string(),
        }]);
        let value = serde_json::to_value(&batch.looks()[0])?;
        assert_eq!(value["image"], serde_json::Value::Null);
        assert_eq!(value["isFavorited"], false);
        Ok(())
    }
}
