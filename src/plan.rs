//! Change plan: the remote mutations needed to make the remote item match a local document.
//!
//! Building a plan is pure. It takes the parsed document plus what the remote currently says about
//! the item (`updated_at`, state, comment bodies) and never talks to the remote itself.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use std::{collections::HashMap, fmt};

use jiff::Timestamp;
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::{
	config::PushOptions,
	document::{Document, ItemKind},
	remote::{RemoteComment, RemoteState},
};

/// Length of the body preview in [`ChangePlan::summary`].
const PREVIEW_CHARS: usize = 50;

/// Remote changed after the local copy was pulled.
#[derive(Debug, Diagnostic, Error)]
#[error("conflict: {reference} was updated remotely at {remote}, local copy is from {}", describe_local(.local))]
#[diagnostic(code(gh_md::plan::conflict), help("Pull the item again to pick up the remote changes, or push with --force to overwrite them."))]
pub struct ConflictError {
	pub reference: String,
	pub local: Option<Timestamp>,
	pub remote: Timestamp,
}

fn describe_local(local: &Option<Timestamp>) -> String {
	local.map(|t| t.to_string()).unwrap_or_else(|| "an unknown time".to_string())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
	Close,
	Reopen,
}

impl fmt::Display for StateChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateChange::Close => f.write_str("close"),
			StateChange::Reopen => f.write_str("reopen"),
		}
	}
}

/// Where a new comment gets posted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyTarget {
	/// Top-level comment on the item.
	Item,
	/// Reply to a discussion comment.
	Comment(String),
	/// Reply to a pull request review thread.
	ReviewThread(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewComment {
	pub body: String,
	pub target: ReplyTarget,
}

impl NewComment {
	pub fn is_reply(&self) -> bool {
		self.target != ReplyTarget::Item
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EditedComment {
	pub id: String,
	pub body: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChangePlan {
	pub kind: ItemKind,
	/// Remote node id of the item.
	pub item_id: String,
	/// `owner/repo#number`, for messages.
	pub reference: String,
	pub number: u64,
	pub title: String,
	pub body: String,
	/// Always true: title and body are pushed unconditionally.
	pub title_body_changed: bool,
	pub state_change: Option<StateChange>,
	pub edited_comments: Vec<EditedComment>,
	pub new_comments: Vec<NewComment>,
	/// The push goes ahead despite a conflict because `force` was set.
	pub conflict_overridden: bool,
}

/// Err if the remote was updated after the local copy, unless `force` is set.
/// Returns whether a conflict was overridden.
pub fn check_conflict(doc: &Document, remote: &RemoteState, force: bool) -> Result<bool, ConflictError> {
	let local = doc.updated.unwrap_or(Timestamp::UNIX_EPOCH);
	if remote.updated_at <= local {
		return Ok(false);
	}
	if !force {
		return Err(ConflictError {
			reference: doc.reference(),
			local: doc.updated,
			remote: remote.updated_at,
		});
	}
	tracing::warn!("[plan] overriding conflict on {}: remote updated at {}", doc.reference(), remote.updated_at);
	Ok(true)
}

/// Plan a state transition. Comparison is case-insensitive; remote state is uppercase.
pub fn plan_state(kind: ItemKind, local: &str, remote: &str) -> Option<StateChange> {
	if kind == ItemKind::Discussion || local.is_empty() || remote.is_empty() {
		return None;
	}
	let local = local.to_ascii_uppercase();
	let remote = remote.to_ascii_uppercase();
	if local == remote {
		return None;
	}
	match local.as_str() {
		"CLOSED" => Some(StateChange::Close),
		// Merged pull requests can't be reopened
		"OPEN" if remote != "MERGED" => Some(StateChange::Reopen),
		_ => None,
	}
}

/// Where a new comment with `parent_id` goes. Anything that isn't a known review thread (pull requests)
/// or a discussion comment is posted on the item itself.
fn reply_target(doc: &Document, kind: ItemKind, parent_id: Option<&str>) -> ReplyTarget {
	let Some(parent) = parent_id else {
		return ReplyTarget::Item;
	};
	match kind {
		ItemKind::PullRequest if doc.review_threads().iter().any(|t| t.id == parent) => ReplyTarget::ReviewThread(parent.to_string()),
		ItemKind::Discussion => {
			// Discussions nest one level: a reply to a reply goes to its root comment
			let root = doc
				.existing_comments()
				.find(|c| c.id.as_deref() == Some(parent))
				.and_then(|c| c.parent_id.as_deref())
				.unwrap_or(parent);
			ReplyTarget::Comment(root.to_string())
		}
		_ => ReplyTarget::Item,
	}
}

impl ChangePlan {
	/// Diff `doc` against the remote.
	///
	/// Comments without an id become new comments. Comments with an id whose trimmed body differs
	/// from the remote body become edits; ids the remote doesn't know are skipped.
	pub fn build(doc: &Document, kind: ItemKind, remote: &RemoteState, remote_comments: &[RemoteComment], opts: &PushOptions) -> Result<Self, ConflictError> {
		let conflict_overridden = check_conflict(doc, remote, opts.force)?;

		let remote_bodies: HashMap<&str, &str> = remote_comments.iter().map(|c| (c.id.as_str(), c.body.as_str())).collect();

		let mut edited_comments = Vec::new();
		let mut new_comments = Vec::new();
		for comment in &doc.comments {
			match &comment.id {
				None => new_comments.push(NewComment {
					body: comment.body.clone(),
					target: reply_target(doc, kind, comment.parent_id.as_deref()),
				}),
				Some(id) => match remote_bodies.get(id.as_str()) {
					Some(remote_body) if comment.body.trim() != remote_body.trim() => edited_comments.push(EditedComment {
						id: id.clone(),
						body: comment.body.clone(),
					}),
					Some(_) => {}
					None => tracing::debug!("[plan] comment {id} not found remotely, skipping"),
				},
			}
		}

		let plan = Self {
			kind,
			item_id: doc.id.clone(),
			reference: doc.reference(),
			number: doc.number,
			title: doc.title.clone(),
			body: doc.body.clone(),
			title_body_changed: true,
			state_change: plan_state(kind, &doc.state, &remote.state),
			edited_comments,
			new_comments,
			conflict_overridden,
		};
		tracing::debug!(
			"[plan] {}: state={:?} edited={} new={}",
			plan.reference,
			plan.state_change,
			plan.edited_comments.len(),
			plan.new_comments.len()
		);
		Ok(plan)
	}

	pub fn has_changes(&self) -> bool {
		self.title_body_changed || self.state_change.is_some() || !self.edited_comments.is_empty() || !self.new_comments.is_empty()
	}

	/// Human-readable listing of what a push would do.
	pub fn summary(&self) -> String {
		let mut out = format!("Would push {} #{}:\n", self.kind, self.number);
		out.push_str(&format!("  Title: {}\n", self.title));
		out.push_str(&format!("  Body:  {} characters\n", self.body.chars().count()));

		if let Some(change) = self.state_change {
			out.push_str(&format!("  State: {change}\n"));
		}

		if !self.new_comments.is_empty() {
			out.push_str(&format!("  New comments: {}\n", self.new_comments.len()));
			for (i, c) in self.new_comments.iter().enumerate() {
				let tag = if c.is_reply() { "(reply) " } else { "" };
				out.push_str(&format!("    {}. {tag}{}\n", i + 1, preview(&c.body)));
			}
		}

		if !self.edited_comments.is_empty() {
			out.push_str(&format!("  Edited comments: {}\n", self.edited_comments.len()));
			for (i, c) in self.edited_comments.iter().enumerate() {
				out.push_str(&format!("    {}. {}\n", i + 1, c.id));
			}
		}

		out
	}
}

fn preview(body: &str) -> String {
	let flat = body.replace('\n', " ");
	if flat.chars().count() <= PREVIEW_CHARS {
		return flat;
	}
	let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
	format!("{cut}...")
}
