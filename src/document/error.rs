//! Error types for parsing document files.
//!
//! Uses miette for rich diagnostics with source code spans.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};

/// Error type for document parsing. Any of these is fatal for the file it came from.
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ParseError {
	#[error("failed to read {}", path.display())]
	#[diagnostic(code(gh_md::parse::io))]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed header: {detail}")]
	#[diagnostic(code(gh_md::parse::malformed_header), help("the file must start with a YAML header between two '---' lines"))]
	MalformedHeader {
		#[source_code]
		src: NamedSource<String>,
		#[label("{detail}")]
		span: SourceSpan,
		detail: String,
	},
}

/// Holds source content and filename for error reporting.
#[derive(Clone, Debug)]
pub struct ParseContext {
	pub content: String,
	pub filename: String,
}

impl ParseContext {
	pub fn new(content: String, filename: impl Into<String>) -> Self {
		Self { content, filename: filename.into() }
	}

	/// Create a NamedSource for miette diagnostics.
	pub fn named_source(&self) -> NamedSource<String> {
		NamedSource::new(&self.filename, self.content.clone())
	}

	/// Get span for an entire line (1-indexed line number).
	pub fn line_span(&self, line_num: usize) -> SourceSpan {
		let offset: usize = self.content.lines().take(line_num.saturating_sub(1)).map(|l| l.len() + 1).sum();
		let len = self.content.lines().nth(line_num.saturating_sub(1)).map(|l| l.len()).unwrap_or(0);
		(offset, len).into()
	}

	/// Span starting at a byte offset, clamped to the content.
	pub fn span_at(&self, offset: usize, len: usize) -> SourceSpan {
		let offset = offset.min(self.content.len());
		let len = len.min(self.content.len() - offset);
		(offset, len).into()
	}

	pub fn malformed_header(&self, span: SourceSpan, detail: impl Into<String>) -> ParseError {
		ParseError::MalformedHeader {
			src: self.named_source(),
			span,
			detail: detail.into(),
		}
	}
}
