//! Bramble crawl engine — paginated traversal with deduplication.
//!
//! One generic engine walks any offset-addressed page sequence: a URL
//! builder turns the cursor into a page URL, a [`PageExtractor`] turns
//! page content into records, and the engine handles termination (empty
//! page, explicit end marker, duplicate page signature, hard stop,
//! transport failure), context tagging and storage routing. The
//! [`Harvester`] composes the engine into the site-shaped flows: thread
//! print views, member enumeration and the nested forum → topics →
//! threads traversal.

#![warn(clippy::all)]

pub mod cursor;
pub mod engine;
pub mod error;
pub mod extract;
pub mod harvester;
pub mod urls;

// Re-export commonly used types
pub use cursor::{CrawlCursor, PageSignature};
pub use engine::{CrawlEngine, CrawlPolicy, ExtractOutcome, PageExtractor, PageFetcher, WalkEnd, WalkReport};
pub use error::{CrawlError, Result};
pub use harvester::{Harvester, RunReport, Task};
