//! Link preview metadata
//!
//! Extracts Open Graph, Twitter card and plain HTML metadata from a page for
//! the preview card shown next to a point's link.

pub mod error;
pub mod extract;
pub mod fetcher;

pub use error::{MetadataError, MetadataResult};
pub use extract::{extract, LinkMetadata, MetadataExtractor, FALLBACK_IMAGE, FALLBACK_SITE, FALLBACK_TITLE};
pub use fetcher::{FetcherConfig, MetadataFetcher, USER_AGENT};
