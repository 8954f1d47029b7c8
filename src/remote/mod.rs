//! Remote source abstraction.
//!
//! Everything that talks to the hosting service goes through [`RemoteSource`], so sync logic can
//! run against [`mock::MockRemote`] in tests and in offline mode.

pub mod mock;

use async_trait::async_trait;
use color_eyre::eyre::Result;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::document::{Document, ItemKind};

/// What conflict detection and state planning need to know about the remote item.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteState {
	pub updated_at: Timestamp,
	/// Uppercase: `OPEN`, `CLOSED`, `MERGED`. Empty for discussions.
	pub state: String,
}

/// A remote comment as seen by the diff. Discussion replies are flattened in with top-level comments.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteComment {
	pub id: String,
	pub body: String,
}

/// Operations the sync layer needs from the hosting service.
///
/// Items are addressed by `(kind, owner, repo, number)` for reads and by remote node id for mutations.
#[async_trait]
pub trait RemoteSource: Send + Sync {
	/// Fetch a full item, comments and review threads included. State comes back lowercase.
	async fn fetch_item(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<Document>;

	/// Fetch every item of `kind` in a repository, optionally only those updated at or after `since`.
	async fn fetch_items(&self, kind: ItemKind, owner: &str, repo: &str, since: Option<Timestamp>) -> Result<Vec<Document>>;

	async fn fetch_remote_state(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<RemoteState>;

	async fn fetch_comments(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<Vec<RemoteComment>>;

	//==========================================================================
	// Mutations
	//==========================================================================

	async fn update_item(&self, kind: ItemKind, item_id: &str, title: &str, body: &str) -> Result<()>;

	async fn close_item(&self, kind: ItemKind, item_id: &str) -> Result<()>;

	async fn reopen_item(&self, kind: ItemKind, item_id: &str) -> Result<()>;

	/// Add a top-level comment to an item.
	async fn add_comment(&self, kind: ItemKind, item_id: &str, body: &str) -> Result<()>;

	async fn update_comment(&self, kind: ItemKind, comment_id: &str, body: &str) -> Result<()>;

	/// Reply to a discussion comment.
	async fn add_reply(&self, discussion_id: &str, parent_comment_id: &str, body: &str) -> Result<()>;

	async fn add_review_thread_reply(&self, thread_id: &str, body: &str) -> Result<()>;
}

