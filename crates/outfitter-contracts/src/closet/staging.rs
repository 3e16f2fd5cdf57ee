use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use super::storage::KeyValueStorage;
use super::store::{ClosetStore, NewClothingItem, StorableClothingItem};
use crate::catalog::Category;
use crate::errors::OutfitError;
use crate::media::{mime_for_path, DataUri, DEFAULT_IMAGE_MIME};

pub const MAX_INGEST_WORKERS: usize = 8;

/// An uploaded file before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn read(path: &Path) -> Result<Self, OutfitError> {
        let bytes = std::fs::read(path).map_err(|err| {
            OutfitError::persistence(format!("failed reading {}: {err}", path.display()))
        })?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self {
            name,
            mime_type: mime_for_path(path).unwrap_or(DEFAULT_IMAGE_MIME).to_string(),
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data_uri: DataUri,
    pub category: Category,
}

impl StagedItem {
    fn encode(file: RawFile) -> Self {
        let data_uri = DataUri::from_bytes(file.mime_type.clone(), &file.bytes);
        Self {
            name: file.name,
            size: file.bytes.len() as u64,
            mime_type: file.mime_type,
            data_uri,
            category: Category::Uncategorized,
        }
    }
}

/// Newly uploaded photos waiting for a category before they enter the closet.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    items: Vec<StagedItem>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[StagedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_uncategorized(&self) -> bool {
        self.items.iter().any(|item| !item.category.is_categorized())
    }

    /// Encodes the files on at most [`MAX_INGEST_WORKERS`] workers and
    /// appends the results as they finish; the resulting order is not tied
    /// to the input order.
    pub fn ingest(&mut self, files: Vec<RawFile>) -> usize {
        let count = files.len();
        if count == 0 {
            return 0;
        }
        let workers = count.min(MAX_INGEST_WORKERS);
        let mut batches: Vec<Vec<RawFile>> = (0..workers).map(|_| Vec::new()).collect();
        for (idx, file) in files.into_iter().enumerate() {
            batches[idx % workers].push(file);
        }
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for batch in batches {
                let tx = tx.clone();
                scope.spawn(move || {
                    for file in batch {
                        if tx.send(StagedItem::encode(file)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            for staged in rx {
                self.items.push(staged);
            }
        });
        count
    }

    /// Reads every path first; nothing is staged if any read fails.
    pub fn ingest_paths(&mut self, paths: &[PathBuf]) -> Result<usize, OutfitError> {
        let files = paths
            .iter()
            .map(|path| RawFile::read(path))
            .collect::<Result<Vec<RawFile>, OutfitError>>()?;
        Ok(self.ingest(files))
    }

    pub fn set_category(&mut self, index: usize, category: Category) -> Result<(), OutfitError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        item.category = category;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<StagedItem, OutfitError> {
        if index >= self.items.len() {
            return Err(out_of_range(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    /// Moves every staged item into the closet, or nothing at all when an item
    /// still lacks a category.
    pub fn commit<S: KeyValueStorage>(
        &mut self,
        closet: &mut ClosetStore<S>,
    ) -> Result<Vec<StorableClothingItem>, OutfitError> {
        if self.items.is_empty() {
            return Err(OutfitError::validation("There are no staged pieces to save."));
        }
        let pending = self
            .items
            .iter()
            .filter(|item| !item.category.is_categorized())
            .count();
        if pending > 0 {
            return Err(OutfitError::validation(format!(
                "Choose a category for every piece before saving ({pending} uncategorized)."
            )));
        }
        self.items
            .drain(..)
            .map(|item| {
                closet.add(NewClothingItem {
                    name: item.name,
                    size: item.size,
                    base64: item.data_uri.to_string(),
                    mime_type: item.mime_type,
                    category: item.category,
                })
            })
            .collect()
    }
}

fn out_of_range(index: usize, len: usize) -> OutfitError {
    OutfitError::validation(format!(
        "staged item {index} does not exist ({len} staged)"
    ))
}
