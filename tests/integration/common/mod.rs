//! Shared fixtures: a temporary mirror root plus a seeded [`MockRemote`].

use std::path::{Path, PathBuf};

use gh_md::{
	Comment, Document, ItemKind,
	document::{DiscussionMeta, ItemMeta, PullRequestMeta, ReviewComment, ReviewThread},
	remote::mock::MockRemote,
	sync,
};
use jiff::Timestamp;
use tempfile::TempDir;

pub const OWNER: &str = "owner";
pub const REPO: &str = "repo";

pub fn ts(s: &str) -> Timestamp {
	s.parse().unwrap()
}

pub struct TestContext {
	pub dir: TempDir,
	pub remote: MockRemote,
}

impl TestContext {
	pub fn new() -> Self {
		Self {
			dir: tempfile::tempdir().unwrap(),
			remote: MockRemote::new("me"),
		}
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	pub async fn pull(&self, kind: ItemKind, number: u64) -> PathBuf {
		sync::pull(&self.remote, self.root(), kind, OWNER, REPO, number).await.unwrap()
	}

	pub fn read(&self, path: &Path) -> String {
		std::fs::read_to_string(path).unwrap()
	}

	/// Replace exactly one occurrence of `from` in the file at `path`.
	pub fn edit(&self, path: &Path, from: &str, to: &str) {
		let content = self.read(path);
		assert_eq!(content.matches(from).count(), 1, "expected exactly one {from:?} in:\n{content}");
		std::fs::write(path, content.replacen(from, to, 1)).unwrap();
	}

	pub fn remote_item(&self, kind: ItemKind, number: u64) -> Document {
		self.remote.item(kind, OWNER, REPO, number).unwrap()
	}
}

fn base(id: &str, number: u64, meta: ItemMeta) -> Document {
	Document {
		id: id.into(),
		owner: OWNER.into(),
		repo: REPO.into(),
		number,
		title: "Remote title".into(),
		body: "Remote body.".into(),
		state: "open".into(),
		author: "alice".into(),
		created: Some(ts("2026-01-10T09:00:00Z")),
		updated: Some(ts("2026-01-15T10:00:00Z")),
		meta,
		..Default::default()
	}
}

pub fn comment(id: &str, author: &str, body: &str, parent: Option<&str>) -> Comment {
	Comment {
		id: Some(id.into()),
		author: author.into(),
		body: body.into(),
		parent_id: parent.map(str::to_string),
		created: Some(ts("2026-01-12T08:00:00Z")),
	}
}

pub fn issue(number: u64) -> Document {
	Document {
		comments: vec![comment(&format!("IC_{number}"), "bob", "original comment", None)],
		..base(&format!("I_{number}"), number, ItemMeta::for_kind(Some(ItemKind::Issue)))
	}
}

pub fn pull_request(number: u64, state: &str) -> Document {
	let meta = PullRequestMeta {
		head_ref: "feature".into(),
		base_ref: "main".into(),
		review_threads: vec![ReviewThread {
			id: "PRRT_1".into(),
			path: "src/lib.rs".into(),
			line: Some(42),
			comments: vec![ReviewComment {
				id: "PRRC_1".into(),
				author: "carol".into(),
				body: "Could this be a const?".into(),
				created: Some(ts("2026-01-12T08:00:00Z")),
			}],
			..Default::default()
		}],
		..Default::default()
	};
	Document {
		state: state.into(),
		..base(&format!("PR_{number}"), number, ItemMeta::PullRequest(meta))
	}
}

pub fn discussion(number: u64) -> Document {
	Document {
		comments: vec![
			comment("DC_1", "bob", "How do I configure this?", None),
			comment("DC_2", "alice", "See the README.", Some("DC_1")),
		],
		..base(
			&format!("D_{number}"),
			number,
			ItemMeta::Discussion(DiscussionMeta {
				category: "Q&A".into(),
				..Default::default()
			}),
		)
	}
}
