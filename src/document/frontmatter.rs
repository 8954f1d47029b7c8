//! YAML header block.
//!
//! The header sits between two `---` lines at the very top of the file. Optional
//! fields are omitted when empty so simple items keep a small header.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{
	error::{ParseContext, ParseError},
	types::{DiscussionMeta, Document, IssueMeta, IssueRef, ItemKind, ItemMeta, PullRequestMeta, SubIssuesSummary},
};

/// Header delimiter line.
pub const DELIMITER: &str = "---";

const OPEN: &str = "---\n";
const CLOSE: &str = "\n---\n";

/// Flat header record covering every kind. Which fields get filled depends on the document kind.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Frontmatter {
	#[serde(default)]
	pub id: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub url: String,
	#[serde(default)]
	pub number: u64,
	#[serde(default)]
	pub owner: String,
	#[serde(default)]
	pub repo: String,
	#[serde(default)]
	pub title: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub state: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub author: String,
	#[serde(default, skip_serializing_if = "is_false")]
	pub draft: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub labels: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub assignees: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub reviewers: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub head_ref: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base_ref: Option<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub merge_commit: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub answer_id: String,
	#[serde(default, skip_serializing_if = "is_false")]
	pub locked: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<RefHeader>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<RefHeader>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub_issues_summary: Option<SubIssuesSummary>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created: Option<Timestamp>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated: Option<Timestamp>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub merged: Option<Timestamp>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_pulled: Option<Timestamp>,
}

fn is_false(b: &bool) -> bool {
	!*b
}

/// Issue reference as written in the header.
/// `owner`/`repo` are present only when the referenced issue lives in another repository.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RefHeader {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub id: String,
	pub number: u64,
	#[serde(default)]
	pub title: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub url: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub state: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repo: Option<String>,
}

impl RefHeader {
	/// Build the header form of `r`, relative to the repository of the document holding it.
	pub fn from_ref(r: &IssueRef, owner: &str, repo: &str) -> Self {
		let same_repo = r.owner == owner && r.repo == repo;
		Self {
			id: r.id.clone(),
			number: r.number,
			title: r.title.clone(),
			url: r.url.clone(),
			state: r.state.clone(),
			owner: (!same_repo).then(|| r.owner.clone()),
			repo: (!same_repo).then(|| r.repo.clone()),
		}
	}

	/// Resolve back to a full reference, defaulting to the holding document's repository.
	pub fn into_ref(self, owner: &str, repo: &str) -> IssueRef {
		IssueRef {
			id: self.id,
			number: self.number,
			title: self.title,
			url: self.url,
			state: self.state,
			owner: self.owner.unwrap_or_else(|| owner.to_string()),
			repo: self.repo.unwrap_or_else(|| repo.to_string()),
		}
	}
}

impl Frontmatter {
	pub fn from_document(doc: &Document) -> Self {
		let mut fm = Frontmatter {
			id: doc.id.clone(),
			url: doc.url.clone(),
			number: doc.number,
			owner: doc.owner.clone(),
			repo: doc.repo.clone(),
			title: doc.title.clone(),
			state: doc.state.clone(),
			author: doc.author.clone(),
			created: doc.created,
			updated: doc.updated,
			last_pulled: doc.last_pulled,
			..Default::default()
		};

		match &doc.meta {
			ItemMeta::Issue(m) => {
				fm.labels = m.labels.clone();
				fm.assignees = m.assignees.clone();
				fm.parent = m.parent.as_ref().map(|p| RefHeader::from_ref(p, &doc.owner, &doc.repo));
				fm.children = m.children.iter().map(|c| RefHeader::from_ref(c, &doc.owner, &doc.repo)).collect();
				fm.sub_issues_summary = m.sub_issues_summary;
			}
			ItemMeta::PullRequest(m) => {
				fm.labels = m.labels.clone();
				fm.assignees = m.assignees.clone();
				fm.draft = m.draft;
				fm.reviewers = m.reviewers.clone();
				fm.head_ref = Some(m.head_ref.clone());
				fm.base_ref = Some(m.base_ref.clone());
				fm.merge_commit = m.merge_commit.clone();
				fm.merged = m.merged;
			}
			ItemMeta::Discussion(m) => {
				fm.category = Some(m.category.clone());
				fm.answer_id = m.answer_id.clone();
				fm.locked = m.locked;
			}
			ItemMeta::Unknown => {}
		}

		fm
	}

	/// Build a document skeleton (no title/body/comments) for the given kind.
	/// Review threads are not part of the header; they come from the comment section.
	pub fn into_document(self, kind: Option<ItemKind>) -> Document {
		let owner = self.owner;
		let repo = self.repo;

		let meta = match kind {
			Some(ItemKind::Issue) => ItemMeta::Issue(IssueMeta {
				labels: self.labels,
				assignees: self.assignees,
				parent: self.parent.map(|p| p.into_ref(&owner, &repo)),
				children: self.children.into_iter().map(|c| c.into_ref(&owner, &repo)).collect(),
				sub_issues_summary: self.sub_issues_summary,
			}),
			Some(ItemKind::PullRequest) => ItemMeta::PullRequest(PullRequestMeta {
				labels: self.labels,
				assignees: self.assignees,
				draft: self.draft,
				reviewers: self.reviewers,
				head_ref: self.head_ref.unwrap_or_default(),
				base_ref: self.base_ref.unwrap_or_default(),
				merge_commit: self.merge_commit,
				merged: self.merged,
				review_threads: Vec::new(),
			}),
			Some(ItemKind::Discussion) => ItemMeta::Discussion(DiscussionMeta {
				category: self.category.unwrap_or_default(),
				answer_id: self.answer_id,
				locked: self.locked,
			}),
			None => ItemMeta::Unknown,
		};

		Document {
			id: self.id,
			url: self.url,
			owner,
			repo,
			number: self.number,
			title: self.title,
			state: self.state,
			author: self.author,
			created: self.created,
			updated: self.updated,
			last_pulled: self.last_pulled,
			meta,
			..Default::default()
		}
	}
}

/// Serialize the header block, delimiters included. Ends with a newline.
pub fn serialize(fm: &Frontmatter) -> String {
	// Plain strings, integers, bools and RFC 3339 timestamps: serde_yaml has no failure mode for these.
	let yaml = serde_yaml::to_string(fm).expect("frontmatter is plain data");
	format!("{OPEN}{yaml}{DELIMITER}\n")
}

/// Split `content` into its header and the text following it.
///
/// Fails with [`ParseError::MalformedHeader`] when the opening delimiter is missing,
/// the closing delimiter is not found after it, or the YAML does not decode.
pub fn parse<'a>(content: &'a str, ctx: &ParseContext) -> Result<(Frontmatter, &'a str), ParseError> {
	if !content.starts_with(OPEN) {
		return Err(ctx.malformed_header(ctx.line_span(1), "file does not start with '---'"));
	}

	// Search from the newline ending the opening delimiter, so an empty header (`---\n---\n`) is found too.
	let search_from = OPEN.len() - 1;
	let (yaml_end, rest_start) = match content[search_from..].find(CLOSE) {
		Some(i) => (search_from + i, search_from + i + CLOSE.len()),
		None if content.ends_with("\n---") && content.len() > OPEN.len() => (content.len() - CLOSE.len() + 1, content.len()),
		None => return Err(ctx.malformed_header(ctx.line_span(1), "header is not closed with '---'")),
	};

	let yaml = if yaml_end <= OPEN.len() { "" } else { &content[OPEN.len()..yaml_end] };
	let rest = &content[rest_start..];

	if yaml.trim().is_empty() {
		return Ok((Frontmatter::default(), rest));
	}

	let fm: Frontmatter = serde_yaml::from_str(yaml).map_err(|e| {
		let span = match e.location() {
			Some(loc) => ctx.span_at(OPEN.len() + loc.index(), 1),
			None => ctx.span_at(OPEN.len(), yaml.len()),
		};
		ctx.malformed_header(span, format!("invalid YAML: {e}"))
	})?;

	tracing::debug!("[parse] header for {}/{}#{}", fm.owner, fm.repo, fm.number);
	Ok((fm, rest))
}
