//! Document file format.
//!
//! A document is one conversational item serialized as markdown:
//!
//! ```text
//! ---
//! <yaml header>
//! ---
//!
//! <!-- gh-md:content -->
//! # Title
//!
//! Body
//! <!-- /gh-md:content -->
//!
//! <comment section, review threads, new-comment placeholders>
//! ```
//!
//! Everything here is pure: no network, and the only filesystem access is
//! [`Document::parse_file`].

mod assemble;
pub mod comments;
pub mod content;
mod error;
pub mod frontmatter;
mod types;

pub use error::{ParseContext, ParseError};
pub use types::{Comment, DiscussionMeta, Document, IssueMeta, IssueRef, ItemKind, ItemMeta, PullRequestMeta, ReviewComment, ReviewThread, SubIssuesSummary};
