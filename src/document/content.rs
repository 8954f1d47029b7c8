//! Editable title and body region.
//!
//! The region is delimited by its own sentinels, so header-like lines inside the body never
//! collide with the YAML header.

use std::ops::Range;

pub const START: &str = "<!-- gh-md:content -->";
pub const END: &str = "<!-- /gh-md:content -->";

/// Title and body recovered from the content region.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContentRegion {
	pub title: String,
	pub body: String,
	/// Byte range of the whole region, sentinels included.
	pub span: Range<usize>,
}

/// Extract the content region from `text`.
///
/// Returns `None` if either sentinel is missing or the end sentinel does not come after the start one.
/// If the first non-blank line of the region is a level-1 heading it becomes the title, and the
/// trimmed remainder the body. Otherwise the title is empty and the whole region is the body.
pub fn extract(text: &str) -> Option<ContentRegion> {
	let start = text.find(START)?;
	let end = text.find(END)?;
	if end <= start {
		return None;
	}

	let inner = text[start + START.len()..end].trim();
	let (title, body) = split_title(inner);

	Some(ContentRegion {
		title: title.to_string(),
		body: body.to_string(),
		span: start..end + END.len(),
	})
}

fn split_title(inner: &str) -> (&str, &str) {
	let Some(heading) = inner.strip_prefix("# ") else {
		return ("", inner);
	};
	match heading.split_once('\n') {
		Some((title, body)) => (title.trim(), body.trim()),
		None => (heading.trim(), ""),
	}
}

/// Render the content region, trailing newline included.
pub fn embed(title: &str, body: &str) -> String {
	let mut out = String::new();
	out.push_str(START);
	out.push('\n');
	if !title.is_empty() {
		out.push_str(&format!("# {title}\n\n"));
	}
	let body = body.trim();
	if !body.is_empty() {
		out.push_str(body);
		out.push('\n');
	}
	out.push_str(END);
	out.push('\n');
	out
}
