//! AniDB protocol surface
//!
//! - `reply`/`fields`: parsed UDP API replies and their `|`-delimited data lines
//! - `transport`: the [`ApiTransport`] seam the dispatch queue sends through
//! - `udp`: a plain datagram implementation of that seam
//! - `document`: the HTTP API anime document and its [`DocumentSource`] seam

pub mod document;
pub mod error;
pub mod fields;
pub mod reply;
pub mod transport;
pub mod udp;

// Re-export main types
pub use document::{AnimeDocument, DocumentSource};
pub use error::{ProtocolError, Result};
pub use fields::Fields;
pub use reply::Reply;
pub use transport::{ApiTransport, ParamMap};
pub use udp::UdpTransport;

/// Protocol version supported by this implementation
pub const PROTOCOL_VERSION: &str = "3";

/// Maximum UDP packet size (considering PPPoE)
pub const MAX_PACKET_SIZE: usize = 1400;

/// Default AniDB server address
pub const DEFAULT_SERVER: &str = "api.anidb.net";

/// Default AniDB UDP port
pub const DEFAULT_PORT: u16 = 9000;

/// Client name registered with AniDB
pub const CLIENT_NAME: &str = "anidbcache";

/// Client version registered with AniDB
pub const CLIENT_VERSION: u32 = 1;
