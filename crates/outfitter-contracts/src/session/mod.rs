mod looks;
mod selection;
mod state;

pub use looks::{DecodedLook, Look, LookBatch, LookGroups};
pub use selection::SelectionSet;
pub use state::Session;
