//! Builders for API replies and documents

mod documents;
pub mod replies;

pub use documents::AnimeDocumentBuilder;
pub use replies::FileLineBuilder;
