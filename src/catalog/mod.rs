//! Catalog loading.

mod fetch;
mod resolver;
mod revalidate;
mod types;

pub use fetch::{parse_payload, CatalogFetcher, FallbackSource};
pub use resolver::SourceResolver;
pub use revalidate::Revalidator;
pub use types::{CatalogPayload, Category, EquipmentItem};
