//! Mock implementations for testing

mod documents;
mod transport;

pub use documents::MockDocuments;
pub use transport::{MockTransport, SESSION, SentRequest};
