//! Catalog synchronization with stale-while-revalidate caching, and
//! resilient submission of leads.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod submit;

pub use cache::{CacheStore, Provenance, Resolved};
pub use catalog::{CatalogPayload, SourceResolver};
pub use config::Config;
pub use error::{CatalogError, SubmitError};
pub use events::{CatalogEvent, EventChannel, SourceKind};
pub use submit::{Lead, LeadSender, RequestChannel, SubmissionResult};
