//! Local mirror on disk.
//!
//! Layout: `<root>/<owner>/<repo>/<issues|pulls|discussions>/<number>.md`.

use std::{
	fmt, fs, io,
	path::{Path, PathBuf},
};

use color_eyre::eyre::{Result, bail, eyre};
use url::Url;
use walkdir::WalkDir;

use crate::document::{Document, ItemKind, ParseError};

const EXTENSION: &str = "md";

/// Coordinates of one item.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ItemAddress {
	pub kind: ItemKind,
	pub owner: String,
	pub repo: String,
	pub number: u64,
}

impl ItemAddress {
	pub fn of(doc: &Document) -> Option<Self> {
		Some(Self {
			kind: doc.kind()?,
			owner: doc.owner.clone(),
			repo: doc.repo.clone(),
			number: doc.number,
		})
	}

	/// Parse `https://github.com/o/r/issues/1`, `o/r/pull/2` or `o/r/issues/1.md`.
	pub fn parse(input: &str) -> Option<Self> {
		let input = input.trim();
		let path = match Url::parse(input) {
			Ok(url) => {
				if url.host_str() != Some("github.com") {
					return None;
				}
				url.path().trim_matches('/').to_string()
			}
			Err(_) => input.trim_matches('/').to_string(),
		};

		let parts: Vec<&str> = path.split('/').collect();
		let [owner, repo, kind, number] = parts.as_slice() else {
			return None;
		};
		let number = number.strip_suffix(".md").unwrap_or(*number).parse().ok()?;
		if owner.is_empty() || repo.is_empty() {
			return None;
		}

		Some(Self {
			kind: ItemKind::from_dir_name(kind)?,
			owner: owner.to_string(),
			repo: repo.to_string(),
			number,
		})
	}

	pub fn path(&self, root: &Path) -> PathBuf {
		item_path(root, self.kind, &self.owner, &self.repo, self.number)
	}
}

impl fmt::Display for ItemAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}/{}#{}", self.kind, self.owner, self.repo, self.number)
	}
}

pub fn item_path(root: &Path, kind: ItemKind, owner: &str, repo: &str, number: u64) -> PathBuf {
	root.join(owner).join(repo).join(kind.dir_name()).join(format!("{number}.{EXTENSION}"))
}

/// Write through a sibling temp file and rename, so readers never see a half-written document.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	let file_name = path
		.file_name()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("not a file path: {}", path.display())))?;
	let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
	fs::write(&tmp, contents)?;
	fs::rename(&tmp, path)
}

/// Serialize `doc` to `path`.
pub fn save(path: &Path, doc: &Document) -> Result<()> {
	write_atomic(path, &doc.to_markdown()).map_err(|e| eyre!("failed to write {}: {e}", path.display()))?;
	tracing::debug!("[store] wrote {}", path.display());
	Ok(())
}

/// Serialize `doc` to its conventional location under `root`.
pub fn write_document(root: &Path, doc: &Document) -> Result<PathBuf> {
	let Some(address) = ItemAddress::of(doc) else {
		bail!("cannot store {}: unknown item kind", doc.reference());
	};
	let path = address.path(root);
	save(&path, doc)?;
	Ok(path)
}

/// Map user input to a document file.
///
/// Accepts an existing file path, a github.com URL, `owner/repo/<kind>/<number>`, or the same with `.md`.
pub fn resolve_input(root: &Path, input: &str) -> Result<PathBuf> {
	let as_path = Path::new(input);
	if as_path.is_file() {
		return Ok(as_path.to_path_buf());
	}
	match ItemAddress::parse(input) {
		Some(address) => Ok(address.path(root)),
		None => bail!("cannot resolve {input:?}: expected a file path, a github.com URL or owner/repo/<issues|pull|discussions>/<number>"),
	}
}

/// Result of walking the mirror. Files that fail to parse are reported, not fatal.
#[derive(Debug, Default)]
pub struct ScanReport {
	pub documents: Vec<(PathBuf, Document)>,
	pub failures: Vec<(PathBuf, ParseError)>,
}

/// Parse every document under `root`, optionally only for one `owner/repo`.
pub fn scan(root: &Path, repo_filter: Option<&str>) -> ScanReport {
	let mut report = ScanReport::default();
	let base = match repo_filter {
		Some(repo) => root.join(repo),
		None => root.to_path_buf(),
	};
	if !base.exists() {
		tracing::debug!("[store] nothing to scan at {}", base.display());
		return report;
	}

	for entry in WalkDir::new(&base).sort_by_file_name() {
		let entry = match entry {
			Ok(e) => e,
			Err(e) => {
				let path = e.path().unwrap_or(base.as_path()).to_path_buf();
				tracing::warn!("[store] skipping {}: {e}", path.display());
				report.failures.push((path.clone(), ParseError::Io { path, source: e.into() }));
				continue;
			}
		};
		let path = entry.path();
		if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
			continue;
		}

		match Document::parse_file(path) {
			Ok(doc) => report.documents.push((path.to_path_buf(), doc)),
			Err(e) => {
				tracing::warn!("[store] skipping {}: {e}", path.display());
				report.failures.push((path.to_path_buf(), e));
			}
		}
	}

	tracing::debug!("[store] scanned {}: {} ok, {} failed", base.display(), report.documents.len(), report.failures.len());
	report
}
