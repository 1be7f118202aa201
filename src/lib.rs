pub mod cache;
pub mod config;
mod error;
pub mod format;
pub mod health;
pub mod mcp;
pub mod metrics;
pub mod page;
pub mod parser;
pub mod rate_limit;
pub mod service;
pub mod track;
pub mod transcript;
pub mod video_id;

pub use error::{ErrorKind, Result, TranscriptError};
pub use service::TranscriptService;
pub use transcript::{LanguageInfo, Segment, Transcript};
