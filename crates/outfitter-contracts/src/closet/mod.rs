mod staging;
mod storage;
mod store;

pub use staging::{RawFile, StagedItem, StagingArea, MAX_INGEST_WORKERS};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{ClosetStore, NewClothingItem, StorableClothingItem, CLOSET_STORAGE_KEY};
