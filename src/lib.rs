//! Editable plain-text mirror of GitHub issues, pull requests and discussions.
//!
//! The [`document`] module holds the file format: a YAML header, an editable
//! content region and a comment section that round-trips threaded comments.
//! [`plan`] diffs a parsed document against remote state, and [`sync`] applies
//! the result through a [`remote::RemoteSource`].

pub mod config;
pub mod document;
pub mod plan;
pub mod remote;
pub mod store;
pub mod sync;

// Re-export the document model at crate root for convenience
pub use document::{
	Comment, DiscussionMeta, Document, IssueMeta, IssueRef, ItemKind, ItemMeta, ParseContext, ParseError, PullRequestMeta, ReviewComment, ReviewThread, SubIssuesSummary,
};
