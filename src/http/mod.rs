//! HTTP protocol layer module
//!
//! Path resolution, cache validators, range planning and response building, decoupled from the
//! transfer logic in `handler`.

pub mod cache;
pub mod mime;
pub mod path;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use cache::{Freshness, Validators};
pub use path::{resolve, SafePath};
pub use range::{ByteWindow, RangeDecision};
pub use response::{ResponseBody, ResponseDraft};
