mod category;
mod registry;

pub use category::Category;
pub use registry::{Avatar, AvatarCatalog, StyleCatalog, StyleOption};
