//! SoundCloud catalog access and record transformation

pub mod client;
pub mod collection;
pub mod errors;
pub mod types;

pub use client::{Catalog, SoundCloudClient};
pub use collection::{CollectionTransformer, PayloadVariant, UnknownKindPolicy};
pub use errors::CatalogError;
