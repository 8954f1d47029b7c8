//! Whole-document composition: header, content region, comment sections.

use std::path::Path;

use super::{
	comments, content,
	error::{ParseContext, ParseError},
	frontmatter::{self, Frontmatter},
	types::{Document, ItemKind, ItemMeta},
};

impl Document {
	/// Parse a document. `path` is used for the item kind (its parent directory name) and for diagnostics;
	/// it is not read.
	///
	/// A missing content region is not fatal: title and body come back empty.
	pub fn parse(content: &str, path: &Path) -> Result<Document, ParseError> {
		let content = content.replace("\r\n", "\n");
		let ctx = ParseContext::new(content.clone(), path.display().to_string());
		let (fm, rest) = frontmatter::parse(&content, &ctx)?;

		let kind = ItemKind::from_path(path);
		if kind.is_none() {
			tracing::debug!("[parse] no item kind for {}", path.display());
		}
		let mut doc = fm.into_document(kind);

		let tail = match content::extract(rest) {
			Some(region) => {
				doc.title = region.title;
				doc.body = region.body;
				&rest[region.span.end..]
			}
			None => {
				tracing::warn!("[parse] {}: content region missing, treating title and body as empty", path.display());
				doc.title.clear();
				doc.body.clear();
				rest
			}
		};

		doc.comments = comments::parse(tail);
		if let ItemMeta::PullRequest(pr) = &mut doc.meta {
			pr.review_threads = comments::parse_review_threads(tail);
		}

		Ok(doc)
	}

	/// Read and parse a document file.
	pub fn parse_file(path: &Path) -> Result<Document, ParseError> {
		let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io { path: path.to_path_buf(), source })?;
		Self::parse(&content, path)
	}

	/// Serialize to the on-disk format.
	pub fn to_markdown(&self) -> String {
		let mut out = frontmatter::serialize(&Frontmatter::from_document(self));
		out.push('\n');
		out.push_str(&content::embed(&self.title, &self.body));
		out.push_str(&comments::render(self));
		out
	}
}
