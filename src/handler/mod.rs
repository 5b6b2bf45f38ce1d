//! Request handler module
//!
//! The file-transfer engine and its stages, plus the hyper entry point feeding it.

pub mod engine;
pub mod listing;
pub mod locate;
pub mod policy;
pub mod report;
pub mod router;
pub mod transfer;

// Re-export main entry points
pub use engine::{TransferEngine, TransferRequest};
pub use listing::{DirEntryInfo, DirectoryRenderer, HtmlListing};
pub use locate::{Located, ResolvedResource};
pub use report::{NoopObserver, TransferObserver, TransferOutcome, TransferReport};
pub use router::handle_request;
