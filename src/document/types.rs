//! Core document data structures.

use std::{fmt, path::Path};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Kind of conversational item. Decides the storage directory and which mutations apply.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
	Issue,
	PullRequest,
	Discussion,
}

impl ItemKind {
	pub const ALL: [ItemKind; 3] = [ItemKind::Issue, ItemKind::PullRequest, ItemKind::Discussion];

	/// Parse a storage directory name or URL path segment.
	/// Accepts `issue`/`issues`, `pull`/`pulls`, `discussion`/`discussions`, case-insensitively.
	pub fn from_dir_name(dir: &str) -> Option<Self> {
		match dir.to_ascii_lowercase().as_str() {
			"issue" | "issues" => Some(ItemKind::Issue),
			"pull" | "pulls" => Some(ItemKind::PullRequest),
			"discussion" | "discussions" => Some(ItemKind::Discussion),
			_ => None,
		}
	}

	/// Infer the kind from the directory a document file lives in.
	pub fn from_path(path: &Path) -> Option<Self> {
		let dir = path.parent()?.file_name()?.to_str()?;
		Self::from_dir_name(dir)
	}

	/// Local storage directory name.
	pub fn dir_name(self) -> &'static str {
		match self {
			ItemKind::Issue => "issues",
			ItemKind::PullRequest => "pulls",
			ItemKind::Discussion => "discussions",
		}
	}

	/// Path segment used in github.com web URLs.
	pub fn url_segment(self) -> &'static str {
		match self {
			ItemKind::Issue => "issues",
			ItemKind::PullRequest => "pull",
			ItemKind::Discussion => "discussions",
		}
	}

	/// Short label for listings.
	pub fn label(self) -> &'static str {
		match self {
			ItemKind::Issue => "issue",
			ItemKind::PullRequest => "pr",
			ItemKind::Discussion => "discussion",
		}
	}
}

impl fmt::Display for ItemKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ItemKind::Issue => "issue",
			ItemKind::PullRequest => "pull",
			ItemKind::Discussion => "discussion",
		};
		f.write_str(s)
	}
}

/// A comment in the conversation.
///
/// `id == None` means the comment was written locally and has not been pushed yet.
/// `parent_id` points at another comment (discussion reply) or at a review thread.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Comment {
	pub id: Option<String>,
	#[serde(default)]
	pub author: String,
	pub body: String,
	#[serde(default)]
	pub parent_id: Option<String>,
	#[serde(default)]
	pub created: Option<Timestamp>,
}

impl Comment {
	/// A locally authored comment, not yet pushed.
	pub fn new_local(body: impl Into<String>, parent_id: Option<String>) -> Self {
		Self {
			id: None,
			author: String::new(),
			body: body.into(),
			parent_id,
			created: None,
		}
	}

	pub fn is_new(&self) -> bool {
		self.id.is_none()
	}
}

/// Inline review comment inside a [`ReviewThread`]. Read-only locally.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReviewComment {
	pub id: String,
	pub author: String,
	pub body: String,
	#[serde(default)]
	pub created: Option<Timestamp>,
}

/// A pull request review conversation anchored to a file and line.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReviewThread {
	pub id: String,
	pub path: String,
	#[serde(default)]
	pub line: Option<u64>,
	#[serde(default)]
	pub resolved: bool,
	#[serde(default)]
	pub outdated: bool,
	#[serde(default)]
	pub comments: Vec<ReviewComment>,
}

/// Reference to a parent or child issue. `owner`/`repo` are always filled in memory;
/// the header omits them for same-repository references.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IssueRef {
	#[serde(default)]
	pub id: String,
	pub number: u64,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub state: String,
	pub owner: String,
	pub repo: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SubIssuesSummary {
	pub total: u64,
	pub completed: u64,
	pub percent_complete: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IssueMeta {
	#[serde(default)]
	pub labels: Vec<String>,
	#[serde(default)]
	pub assignees: Vec<String>,
	#[serde(default)]
	pub parent: Option<IssueRef>,
	#[serde(default)]
	pub children: Vec<IssueRef>,
	#[serde(default)]
	pub sub_issues_summary: Option<SubIssuesSummary>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PullRequestMeta {
	#[serde(default)]
	pub labels: Vec<String>,
	#[serde(default)]
	pub assignees: Vec<String>,
	#[serde(default)]
	pub draft: bool,
	#[serde(default)]
	pub reviewers: Vec<String>,
	#[serde(default)]
	pub head_ref: String,
	#[serde(default)]
	pub base_ref: String,
	/// Empty unless merged.
	#[serde(default)]
	pub merge_commit: String,
	#[serde(default)]
	pub merged: Option<Timestamp>,
	#[serde(default)]
	pub review_threads: Vec<ReviewThread>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiscussionMeta {
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub answer_id: String,
	#[serde(default)]
	pub locked: bool,
}

/// Kind-specific metadata. The variant is the kind discriminator of a [`Document`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemMeta {
	Issue(IssueMeta),
	PullRequest(PullRequestMeta),
	Discussion(DiscussionMeta),
	/// Kind could not be inferred from the storage path.
	#[default]
	Unknown,
}

impl ItemMeta {
	/// Empty metadata for the given kind.
	pub fn for_kind(kind: Option<ItemKind>) -> Self {
		match kind {
			Some(ItemKind::Issue) => ItemMeta::Issue(IssueMeta::default()),
			Some(ItemKind::PullRequest) => ItemMeta::PullRequest(PullRequestMeta::default()),
			Some(ItemKind::Discussion) => ItemMeta::Discussion(DiscussionMeta::default()),
			None => ItemMeta::Unknown,
		}
	}

	pub fn kind(&self) -> Option<ItemKind> {
		match self {
			ItemMeta::Issue(_) => Some(ItemKind::Issue),
			ItemMeta::PullRequest(_) => Some(ItemKind::PullRequest),
			ItemMeta::Discussion(_) => Some(ItemKind::Discussion),
			ItemMeta::Unknown => None,
		}
	}
}

/// One conversational item.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Document {
	/// Remote node id.
	pub id: String,
	#[serde(default)]
	pub url: String,
	pub owner: String,
	pub repo: String,
	pub number: u64,
	pub title: String,
	pub body: String,
	/// Free-form; case is preserved on parse.
	#[serde(default)]
	pub state: String,
	#[serde(default)]
	pub author: String,
	#[serde(default)]
	pub created: Option<Timestamp>,
	/// Remote `updatedAt` as of the last pull. Conflict detection compares against this.
	#[serde(default)]
	pub updated: Option<Timestamp>,
	#[serde(default)]
	pub last_pulled: Option<Timestamp>,
	/// Flat, in document order. Discussion replies carry `parent_id`.
	#[serde(default)]
	pub comments: Vec<Comment>,
	#[serde(default)]
	pub meta: ItemMeta,
}

impl Document {
	pub fn kind(&self) -> Option<ItemKind> {
		self.meta.kind()
	}

	pub fn review_threads(&self) -> &[ReviewThread] {
		match &self.meta {
			ItemMeta::PullRequest(pr) => &pr.review_threads,
			_ => &[],
		}
	}

	pub fn labels(&self) -> &[String] {
		match &self.meta {
			ItemMeta::Issue(m) => &m.labels,
			ItemMeta::PullRequest(m) => &m.labels,
			_ => &[],
		}
	}

	/// Comments that were present at the last sync.
	pub fn existing_comments(&self) -> impl Iterator<Item = &Comment> {
		self.comments.iter().filter(|c| !c.is_new())
	}

	/// Comments authored locally since the last sync.
	pub fn new_comments(&self) -> impl Iterator<Item = &Comment> {
		self.comments.iter().filter(|c| c.is_new())
	}

	/// `owner/repo#number`
	pub fn reference(&self) -> String {
		format!("{}/{}#{}", self.owner, self.repo, self.number)
	}

	/// Web URL, constructed when the header didn't carry one.
	pub fn web_url(&self) -> Option<String> {
		if !self.url.is_empty() {
			return Some(self.url.clone());
		}
		let kind = self.kind()?;
		Some(format!("https://github.com/{}/{}/{}/{}", self.owner, self.repo, kind.url_segment(), self.number))
	}
}
