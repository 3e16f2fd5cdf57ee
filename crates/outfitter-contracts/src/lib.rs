pub mod api;
pub mod catalog;
pub mod chat;
pub mod closet;
pub mod errors;
pub mod events;
pub mod media;
pub mod session;

pub use errors::OutfitError;
