//! In-memory remote for tests and offline use.
//!
//! Items are stored as whole [`Document`]s. Every mutation bumps the touched item's `updated` to one
//! minute past the latest timestamp in the store, so conflict detection behaves like the real service.
//! State can be loaded from and dumped to JSON, which is how the CLI works against a snapshot.

use std::{
	collections::HashSet,
	sync::{
		Mutex, MutexGuard, PoisonError,
		atomic::{AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use color_eyre::eyre::{Result, bail, eyre};
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{RemoteComment, RemoteSource, RemoteState};
use crate::document::{Comment, Document, ItemKind, ItemMeta, ReviewComment};

/// Serialized form of the mock's contents.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MockState {
	/// Author recorded on comments created through the mock.
	#[serde(default)]
	pub user_login: String,
	#[serde(default)]
	pub items: Vec<Document>,
}

/// Mock remote that stores all state in memory.
pub struct MockRemote {
	state: Mutex<MockState>,
	/// Counter for generating comment ids
	next_comment_id: AtomicU64,
	/// Operations that should fail when called
	fail_on: Mutex<HashSet<String>>,
	/// Call log for assertions
	call_log: Mutex<Vec<String>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
	m.lock().unwrap_or_else(PoisonError::into_inner)
}

const COMMENT_ID_PREFIX: &str = "MC_";

/// One past the highest comment id the mock has handed out before, so reloaded snapshots never reuse one.
fn first_free_comment_id(items: &[Document]) -> u64 {
	items
		.iter()
		.flat_map(|d| {
			d.comments
				.iter()
				.filter_map(|c| c.id.as_deref())
				.chain(d.review_threads().iter().flat_map(|t| t.comments.iter().map(|c| c.id.as_str())))
		})
		.filter_map(|id| id.strip_prefix(COMMENT_ID_PREFIX)?.parse::<u64>().ok())
		.max()
		.map_or(1, |n| n + 1)
}

impl MockRemote {
	pub fn new(user_login: &str) -> Self {
		Self::from_state(MockState {
			user_login: user_login.to_string(),
			items: Vec::new(),
		})
	}

	pub fn from_state(state: MockState) -> Self {
		Self {
			next_comment_id: AtomicU64::new(first_free_comment_id(&state.items)),
			state: Mutex::new(state),
			fail_on: Mutex::new(HashSet::new()),
			call_log: Mutex::new(Vec::new()),
		}
	}

	/// Load state from JSON content, as written by [`MockRemote::state_json`].
	pub fn load_state_json(content: &str) -> Result<Self> {
		let state: MockState = serde_json::from_str(content)?;
		tracing::debug!(target: "mock_remote", items = state.items.len(), "loaded state");
		Ok(Self::from_state(state))
	}

	pub fn state_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(&*guard(&self.state))?)
	}

	/// Insert or replace an item (matched by kind, owner, repo and number).
	pub fn add_item(&self, doc: Document) {
		let mut state = guard(&self.state);
		state.items.retain(|d| !(d.kind() == doc.kind() && d.owner == doc.owner && d.repo == doc.repo && d.number == doc.number));
		state.items.push(doc);
	}

	/// Current stored copy of an item, without going through the call log.
	pub fn item(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Option<Document> {
		guard(&self.state).items.iter().find(|d| matches(d, kind, owner, repo, number)).cloned()
	}

	/// Make every subsequent call to `operation` fail.
	pub fn fail_on(&self, operation: &str) {
		guard(&self.fail_on).insert(operation.to_string());
	}

	pub fn get_call_log(&self) -> Vec<String> {
		guard(&self.call_log).clone()
	}

	pub fn clear_call_log(&self) {
		guard(&self.call_log).clear();
	}

	/// Record the call, then fail if `operation` was marked with [`MockRemote::fail_on`].
	fn enter(&self, operation: &str, target: &str) -> Result<()> {
		guard(&self.call_log).push(format!("{operation} {target}"));
		if guard(&self.fail_on).contains(operation) {
			bail!("injected failure: {operation}");
		}
		Ok(())
	}

	fn next_comment_id(&self) -> String {
		format!("{COMMENT_ID_PREFIX}{}", self.next_comment_id.fetch_add(1, Ordering::SeqCst))
	}

	/// Apply `f` to the item with node id `item_id`, then bump its `updated`.
	fn mutate<T>(&self, kind: ItemKind, item_id: &str, f: impl FnOnce(&mut Document, Timestamp, &str) -> Result<T>) -> Result<T> {
		let mut state = guard(&self.state);
		let now = tick(&state.items)?;
		let user = state.user_login.clone();
		let doc = state.items.iter_mut().find(|d| d.id == item_id).ok_or_else(|| eyre!("item {item_id} not found"))?;
		if doc.kind() != Some(kind) {
			bail!("item {item_id} is not a {kind}");
		}
		let out = f(doc, now, &user)?;
		doc.updated = Some(now);
		Ok(out)
	}
}

fn matches(doc: &Document, kind: ItemKind, owner: &str, repo: &str, number: u64) -> bool {
	doc.kind() == Some(kind) && doc.owner == owner && doc.repo == repo && doc.number == number
}

/// One minute past the latest `updated` in the store.
fn tick(items: &[Document]) -> Result<Timestamp> {
	let latest = items.iter().filter_map(|d| d.updated).max().unwrap_or(Timestamp::UNIX_EPOCH);
	Ok(latest.checked_add(SignedDuration::from_mins(1))?)
}

fn is_merged(doc: &Document) -> bool {
	doc.state.eq_ignore_ascii_case("merged")
}

#[async_trait]
impl RemoteSource for MockRemote {
	#[instrument(skip(self), name = "MockRemote::fetch_item")]
	async fn fetch_item(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<Document> {
		self.enter("fetch_item", &format!("{owner}/{repo}#{number}"))?;
		let mut doc = self.item(kind, owner, repo, number).ok_or_else(|| eyre!("{kind} {owner}/{repo}#{number} not found"))?;
		doc.state = doc.state.to_lowercase();
		Ok(doc)
	}

	#[instrument(skip(self), name = "MockRemote::fetch_items")]
	async fn fetch_items(&self, kind: ItemKind, owner: &str, repo: &str, since: Option<Timestamp>) -> Result<Vec<Document>> {
		self.enter("fetch_items", &format!("{owner}/{repo}"))?;
		let state = guard(&self.state);
		Ok(state
			.items
			.iter()
			.filter(|d| d.kind() == Some(kind) && d.owner == owner && d.repo == repo)
			.filter(|d| match (since, d.updated) {
				(Some(since), Some(updated)) => updated >= since,
				(Some(_), None) => false,
				(None, _) => true,
			})
			.cloned()
			.map(|mut d| {
				d.state = d.state.to_lowercase();
				d
			})
			.collect())
	}

	#[instrument(skip(self), name = "MockRemote::fetch_remote_state")]
	async fn fetch_remote_state(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<RemoteState> {
		self.enter("fetch_remote_state", &format!("{owner}/{repo}#{number}"))?;
		let doc = self.item(kind, owner, repo, number).ok_or_else(|| eyre!("{kind} {owner}/{repo}#{number} not found"))?;
		Ok(RemoteState {
			updated_at: doc.updated.unwrap_or(Timestamp::UNIX_EPOCH),
			state: doc.state.to_uppercase(),
		})
	}

	#[instrument(skip(self), name = "MockRemote::fetch_comments")]
	async fn fetch_comments(&self, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<Vec<RemoteComment>> {
		self.enter("fetch_comments", &format!("{owner}/{repo}#{number}"))?;
		let doc = self.item(kind, owner, repo, number).ok_or_else(|| eyre!("{kind} {owner}/{repo}#{number} not found"))?;
		Ok(doc
			.comments
			.into_iter()
			.filter_map(|c| Some(RemoteComment { id: c.id?, body: c.body }))
			.collect())
	}

	#[instrument(skip(self, body), name = "MockRemote::update_item")]
	async fn update_item(&self, kind: ItemKind, item_id: &str, title: &str, body: &str) -> Result<()> {
		self.enter("update_item", item_id)?;
		self.mutate(kind, item_id, |doc, _, _| {
			doc.title = title.to_string();
			doc.body = body.to_string();
			Ok(())
		})
	}

	#[instrument(skip(self), name = "MockRemote::close_item")]
	async fn close_item(&self, kind: ItemKind, item_id: &str) -> Result<()> {
		self.enter("close_item", item_id)?;
		self.mutate(kind, item_id, |doc, _, _| {
			if is_merged(doc) {
				bail!("cannot close merged {kind} {item_id}");
			}
			doc.state = "closed".to_string();
			Ok(())
		})
	}

	#[instrument(skip(self), name = "MockRemote::reopen_item")]
	async fn reopen_item(&self, kind: ItemKind, item_id: &str) -> Result<()> {
		self.enter("reopen_item", item_id)?;
		self.mutate(kind, item_id, |doc, _, _| {
			if is_merged(doc) {
				bail!("cannot reopen merged {kind} {item_id}");
			}
			doc.state = "open".to_string();
			Ok(())
		})
	}

	#[instrument(skip(self, body), name = "MockRemote::add_comment")]
	async fn add_comment(&self, kind: ItemKind, item_id: &str, body: &str) -> Result<()> {
		self.enter("add_comment", item_id)?;
		let id = self.next_comment_id();
		self.mutate(kind, item_id, |doc, now, user| {
			doc.comments.push(Comment {
				id: Some(id),
				author: user.to_string(),
				body: body.to_string(),
				parent_id: None,
				created: Some(now),
			});
			Ok(())
		})
	}

	#[instrument(skip(self, body), name = "MockRemote::update_comment")]
	async fn update_comment(&self, kind: ItemKind, comment_id: &str, body: &str) -> Result<()> {
		self.enter("update_comment", comment_id)?;
		let item_id = guard(&self.state)
			.items
			.iter()
			.find(|d| d.comments.iter().any(|c| c.id.as_deref() == Some(comment_id)))
			.map(|d| d.id.clone())
			.ok_or_else(|| eyre!("comment {comment_id} not found"))?;
		self.mutate(kind, &item_id, |doc, _, _| {
			if let Some(c) = doc.comments.iter_mut().find(|c| c.id.as_deref() == Some(comment_id)) {
				c.body = body.to_string();
			}
			Ok(())
		})
	}

	#[instrument(skip(self, body), name = "MockRemote::add_reply")]
	async fn add_reply(&self, discussion_id: &str, parent_comment_id: &str, body: &str) -> Result<()> {
		self.enter("add_reply", parent_comment_id)?;
		let id = self.next_comment_id();
		self.mutate(ItemKind::Discussion, discussion_id, |doc, now, user| {
			let Some(parent) = doc.comments.iter().find(|c| c.id.as_deref() == Some(parent_comment_id)) else {
				bail!("comment {parent_comment_id} not found in {discussion_id}");
			};
			if parent.parent_id.is_some() {
				bail!("comment {parent_comment_id} is itself a reply; discussions nest one level");
			}
			doc.comments.push(Comment {
				id: Some(id),
				author: user.to_string(),
				body: body.to_string(),
				parent_id: Some(parent_comment_id.to_string()),
				created: Some(now),
			});
			Ok(())
		})
	}

	#[instrument(skip(self, body), name = "MockRemote::add_review_thread_reply")]
	async fn add_review_thread_reply(&self, thread_id: &str, body: &str) -> Result<()> {
		self.enter("add_review_thread_reply", thread_id)?;
		let item_id = guard(&self.state)
			.items
			.iter()
			.find(|d| d.review_threads().iter().any(|t| t.id == thread_id))
			.map(|d| d.id.clone())
			.ok_or_else(|| eyre!("review thread {thread_id} not found"))?;
		let id = self.next_comment_id();
		self.mutate(ItemKind::PullRequest, &item_id, |doc, now, user| {
			if let ItemMeta::PullRequest(pr) = &mut doc.meta
				&& let Some(thread) = pr.review_threads.iter_mut().find(|t| t.id == thread_id)
			{
				thread.comments.push(ReviewComment {
					id,
					author: user.to_string(),
					body: body.to_string(),
					created: Some(now),
				});
			}
			Ok(())
		})
	}
}
