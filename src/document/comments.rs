//! Comment section codec.
//!
//! Existing comments are written as metadata blocks followed by a `### @author (date)` heading
//! and the body. Discussion replies are indented two spaces per level. Every place a user can
//! add a comment gets a new-comment placeholder, optionally tagged with the id it replies to.
//!
//! Parsing recovers three things from the linear text:
//! - existing comments, from `<!-- gh-md:comment` blocks (the newline after the tag keeps the
//!   plural `<!-- gh-md:comments -->` section wrapper from matching);
//! - new comments, from non-empty `<!-- gh-md:new-comment -->` placeholders;
//! - the reply hierarchy, from explicit `parent:`/`reply_to:` attributes, else from indentation.

use std::collections::HashSet;

use jiff::Timestamp;

use super::types::{Comment, Document, ItemKind, ReviewComment, ReviewThread};

pub const SECTION_START: &str = "<!-- gh-md:comments -->";
pub const SECTION_END: &str = "<!-- /gh-md:comments -->";
pub const COMMENT_OPEN: &str = "<!-- gh-md:comment";
pub const COMMENT_END: &str = "<!-- /gh-md:comment -->";
pub const NEW_COMMENT_OPEN: &str = "<!-- gh-md:new-comment";
pub const NEW_COMMENT_END: &str = "<!-- /gh-md:new-comment -->";
pub const THREAD_OPEN: &str = "<!-- gh-md:review-thread";
pub const THREAD_END: &str = "<!-- /gh-md:review-thread -->";
pub const REVIEW_COMMENT_OPEN: &str = "<!-- gh-md:review-comment";
pub const REVIEW_COMMENT_END: &str = "<!-- /gh-md:review-comment -->";
pub const REVIEW_THREADS_HEADING: &str = "## Review Threads";

const MARKER_CLOSE: &str = "-->";
const REPLY_TO: &str = "reply_to:";
const INDENT: &str = "  ";
const SEPARATOR: &str = "\n---\n\n";

//==============================================================================
// Scanning
//==============================================================================

/// A delimited block found in the text. Offsets are relative to the scanned text.
#[derive(Debug)]
struct Block<'a> {
	/// Offset of the opening marker.
	start: usize,
	/// Text between the opening tag and its `-->`.
	meta: &'a str,
	/// Text between the opening tag's `-->` and the closing marker.
	inner: &'a str,
}

fn is_newline(b: u8) -> bool {
	b == b'\n'
}

fn is_whitespace(b: u8) -> bool {
	b.is_ascii_whitespace()
}

/// Find `prefix` at or after `from`, requiring the byte right after it to satisfy `accept`.
/// A plain prefix match is not enough: `<!-- gh-md:comment` is also a prefix of `<!-- gh-md:comments -->`.
fn find_open(text: &str, from: usize, prefix: &str, accept: fn(u8) -> bool) -> Option<usize> {
	let mut pos = from;
	while let Some(i) = text[pos..].find(prefix) {
		let at = pos + i;
		match text.as_bytes().get(at + prefix.len()) {
			Some(&b) if accept(b) => return Some(at),
			_ => pos = at + prefix.len(),
		}
	}
	None
}

/// Collect every `open ... --> ... close` block. An unterminated block ends the scan.
fn scan_blocks<'a>(text: &'a str, open: &str, close: &str, accept: fn(u8) -> bool) -> Vec<Block<'a>> {
	let mut blocks = Vec::new();
	let mut pos = 0;

	while let Some(start) = find_open(text, pos, open, accept) {
		let meta_start = start + open.len();
		let Some(meta_len) = text[meta_start..].find(MARKER_CLOSE) else {
			break;
		};
		let inner_start = meta_start + meta_len + MARKER_CLOSE.len();
		let Some(inner_len) = text[inner_start..].find(close) else {
			tracing::warn!("[parse] unterminated block at offset {start}, expected {close:?}; it and everything after it is ignored");
			break;
		};

		blocks.push(Block {
			start,
			meta: &text[meta_start..meta_start + meta_len],
			inner: &text[inner_start..inner_start + inner_len],
		});
		pos = inner_start + inner_len + close.len();
	}

	blocks
}

/// Leading whitespace of the line containing `pos`, up to `pos`.
fn line_indent(text: &str, pos: usize) -> &str {
	let line_start = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
	let prefix = &text[line_start..pos];
	let rest = prefix.trim_start_matches([' ', '\t']);
	&prefix[..prefix.len() - rest.len()]
}

/// Two spaces per level; a tab counts as two spaces.
fn depth_of(indent: &str) -> usize {
	indent.chars().map(|c| if c == '\t' { 2 } else { 1 }).sum::<usize>() / 2
}

fn dedent(text: &str, indent: &str) -> String {
	if indent.is_empty() {
		return text.to_string();
	}
	text.lines().map(|line| line.strip_prefix(indent).unwrap_or_else(|| line.trim_start())).collect::<Vec<_>>().join("\n")
}

/// Value of a `key: value` line inside a block's metadata.
fn meta_field<'a>(meta: &'a str, key: &str) -> Option<&'a str> {
	meta.lines()
		.filter_map(|line| line.trim().strip_prefix(key)?.strip_prefix(':'))
		.map(str::trim)
		.find(|v| !v.is_empty())
}

fn is_author_heading(line: &str) -> bool {
	let line = line.trim_start();
	let hashes = line.chars().take_while(|&c| c == '#').count();
	hashes >= 3 && line[hashes..].starts_with(" @")
}

/// Trim the body and drop the `### @author (date)` heading the serializer put in front of it.
fn strip_heading(body: &str) -> String {
	let body = body.trim();
	match body.split_once('\n') {
		Some((first, rest)) if is_author_heading(first) => rest.trim().to_string(),
		None if is_author_heading(body) => String::new(),
		_ => body.to_string(),
	}
}

//==============================================================================
// Parsing
//==============================================================================

/// A parsed comment with its position in the stream and its indentation depth.
#[derive(Debug)]
struct Located {
	comment: Comment,
	depth: usize,
	position: usize,
}

/// Parse all comments (existing and new) out of the text following the content region.
pub fn parse(text: &str) -> Vec<Comment> {
	let mut located = parse_existing(text);
	located.extend(parse_new(text));
	tracing::debug!("[parse] found {} comment(s)", located.len());
	resolve_hierarchy(located)
}

fn parse_existing(text: &str) -> Vec<Located> {
	scan_blocks(text, COMMENT_OPEN, COMMENT_END, is_newline)
		.into_iter()
		.map(|block| {
			let indent = line_indent(text, block.start);
			let comment = Comment {
				id: meta_field(block.meta, "id").map(str::to_string),
				author: meta_field(block.meta, "author").unwrap_or_default().to_string(),
				body: strip_heading(&dedent(block.inner, indent)),
				parent_id: meta_field(block.meta, "parent").map(str::to_string),
				created: meta_field(block.meta, "created").and_then(|v| v.parse::<Timestamp>().ok()),
			};
			Located {
				comment,
				depth: depth_of(indent),
				position: block.start,
			}
		})
		.collect()
}

fn parse_new(text: &str) -> Vec<Located> {
	scan_blocks(text, NEW_COMMENT_OPEN, NEW_COMMENT_END, is_whitespace)
		.into_iter()
		.filter_map(|block| {
			let indent = line_indent(text, block.start);
			let body = dedent(block.inner, indent).trim().to_string();
			if body.is_empty() {
				return None;
			}
			let reply_to = block
				.meta
				.find(REPLY_TO)
				.and_then(|i| block.meta[i + REPLY_TO.len()..].split_whitespace().next())
				.map(str::to_string);
			Some(Located {
				comment: Comment::new_local(body, reply_to),
				depth: depth_of(indent),
				position: block.start,
			})
		})
		.collect()
}

/// Fill in `parent_id` for comments without an explicit one, in stream order.
///
/// `latest[d]` is the id of the most recent existing comment seen at depth `d`. A comment at depth
/// `d` adopts the nearest recorded id at a shallower depth. Recording an id truncates deeper slots.
/// New comments have no id, so they never become implicit parents.
fn resolve_hierarchy(mut located: Vec<Located>) -> Vec<Comment> {
	located.sort_by_key(|l| l.position);

	let mut latest: Vec<Option<String>> = Vec::new();
	let mut result = Vec::with_capacity(located.len());

	for Located { mut comment, depth, .. } in located {
		if depth > 0 && comment.parent_id.is_none() {
			comment.parent_id = latest.iter().take(depth).rev().find_map(|slot| slot.clone());
		}

		if let Some(id) = &comment.id {
			if latest.len() <= depth {
				latest.resize(depth + 1, None);
			}
			latest[depth] = Some(id.clone());
			latest.truncate(depth + 1);
		}

		result.push(comment);
	}

	result
}

/// Parse review threads. Their comments are read-only; replies come back through [`parse`]
/// as new comments whose `parent_id` is the thread id.
pub fn parse_review_threads(text: &str) -> Vec<ReviewThread> {
	scan_blocks(text, THREAD_OPEN, THREAD_END, is_newline)
		.into_iter()
		.map(|block| {
			let comments = scan_blocks(block.inner, REVIEW_COMMENT_OPEN, REVIEW_COMMENT_END, is_newline)
				.into_iter()
				.map(|rc| ReviewComment {
					id: meta_field(rc.meta, "id").unwrap_or_default().to_string(),
					author: meta_field(rc.meta, "author").unwrap_or_default().to_string(),
					body: strip_heading(&dedent(rc.inner, line_indent(block.inner, rc.start))),
					created: meta_field(rc.meta, "created").and_then(|v| v.parse::<Timestamp>().ok()),
				})
				.collect();

			ReviewThread {
				id: meta_field(block.meta, "id").unwrap_or_default().to_string(),
				path: meta_field(block.meta, "path").unwrap_or_default().to_string(),
				line: meta_field(block.meta, "line").and_then(|v| v.parse().ok()),
				resolved: meta_field(block.meta, "resolved") == Some("true"),
				outdated: meta_field(block.meta, "outdated") == Some("true"),
				comments,
			}
		})
		.collect()
}

//==============================================================================
// Serialization
//==============================================================================

fn push_indented(out: &mut String, indent: &str, text: &str) {
	for line in text.lines() {
		if !line.is_empty() {
			out.push_str(indent);
			out.push_str(line);
		}
		out.push('\n');
	}
}

fn author_heading(level: usize, author: &str, created: Option<Timestamp>) -> String {
	let hashes = "#".repeat(level.min(6));
	match created {
		Some(ts) => format!("{hashes} @{author} ({})", ts.strftime("%Y-%m-%d")),
		None => format!("{hashes} @{author}"),
	}
}

/// Render one existing comment block at `depth`.
pub fn render_comment(out: &mut String, comment: &Comment, depth: usize) {
	let indent = INDENT.repeat(depth);

	let mut meta = format!("{COMMENT_OPEN}\n");
	if let Some(id) = &comment.id {
		meta.push_str(&format!("id: {id}\n"));
	}
	meta.push_str(&format!("author: {}\n", comment.author));
	if let Some(created) = comment.created {
		meta.push_str(&format!("created: {created}\n"));
	}
	if let Some(parent) = &comment.parent_id {
		meta.push_str(&format!("parent: {parent}\n"));
	}
	meta.push_str(MARKER_CLOSE);
	meta.push('\n');
	meta.push_str(&author_heading(3 + depth.min(1), &comment.author, comment.created));
	meta.push_str("\n\n");

	push_indented(out, &indent, &meta);
	push_indented(out, &indent, comment.body.trim());
	push_indented(out, &indent, COMMENT_END);
	out.push('\n');
}

/// Render a new-comment placeholder. `body` is empty for a fresh placeholder.
pub fn render_placeholder(out: &mut String, reply_to: Option<&str>, body: &str, depth: usize) {
	let indent = INDENT.repeat(depth);
	let open = match reply_to {
		Some(id) => format!("{NEW_COMMENT_OPEN} {REPLY_TO} {id} {MARKER_CLOSE}"),
		None => format!("{NEW_COMMENT_OPEN} {MARKER_CLOSE}"),
	};
	push_indented(out, &indent, &open);
	push_indented(out, &indent, body.trim());
	push_indented(out, &indent, NEW_COMMENT_END);
	out.push('\n');
}

/// Pending new comments for one target, or a single empty placeholder if there are none.
fn render_placeholders(out: &mut String, reply_to: Option<&str>, pending: &[&Comment], depth: usize) {
	if pending.is_empty() {
		render_placeholder(out, reply_to, "", depth);
		return;
	}
	for comment in pending {
		render_placeholder(out, comment.parent_id.as_deref().or(reply_to), &comment.body, depth);
	}
}

fn render_thread(out: &mut String, thread: &ReviewThread, pending: &[&Comment]) {
	out.push_str(&format!("{THREAD_OPEN}\nid: {}\npath: {}\n", thread.id, thread.path));
	if let Some(line) = thread.line {
		out.push_str(&format!("line: {line}\n"));
	}
	if thread.resolved {
		out.push_str("resolved: true\n");
	}
	if thread.outdated {
		out.push_str("outdated: true\n");
	}
	out.push_str(MARKER_CLOSE);
	out.push('\n');
	match thread.line {
		Some(line) => out.push_str(&format!("### `{}:{line}`\n\n", thread.path)),
		None => out.push_str(&format!("### `{}`\n\n", thread.path)),
	}

	for rc in &thread.comments {
		out.push_str(&format!("{REVIEW_COMMENT_OPEN}\nid: {}\nauthor: {}\n", rc.id, rc.author));
		if let Some(created) = rc.created {
			out.push_str(&format!("created: {created}\n"));
		}
		out.push_str(MARKER_CLOSE);
		out.push('\n');
		out.push_str(&author_heading(4, &rc.author, rc.created));
		out.push_str("\n\n");
		push_indented(out, "", rc.body.trim());
		out.push_str(REVIEW_COMMENT_END);
		out.push_str("\n\n");
	}

	render_placeholders(out, Some(thread.id.as_str()), pending, 0);
	out.push_str(THREAD_END);
	out.push_str("\n\n");
}

/// Discussion roots: no parent, or a parent that isn't among the existing comments.
fn is_root(comment: &Comment, existing_ids: &HashSet<&str>) -> bool {
	comment.parent_id.as_deref().is_none_or(|p| !existing_ids.contains(p))
}

fn pending_for<'a>(doc: &'a Document, target: &str) -> Vec<&'a Comment> {
	doc.new_comments().filter(|c| c.parent_id.as_deref() == Some(target)).collect()
}

/// Follow parent links among the existing comments up to the root.
fn root_of<'a>(existing: &[&'a Comment], id: &'a str) -> &'a str {
	let mut current = id;
	for _ in 0..existing.len() {
		match existing.iter().copied().find(|c| c.id.as_deref() == Some(current)).and_then(|c| c.parent_id.as_deref()) {
			Some(parent) if existing.iter().any(|c| c.id.as_deref() == Some(parent)) => current = parent,
			_ => break,
		}
	}
	current
}

fn render_discussion_subtree(out: &mut String, existing: &[&Comment], comment: &Comment, depth: usize) {
	render_comment(out, comment, depth);
	let Some(id) = comment.id.as_deref() else { return };
	for reply in existing.iter().filter(|c| c.parent_id.as_deref() == Some(id)) {
		render_discussion_subtree(out, existing, reply, depth + 1);
	}
}

/// A root discussion comment, its replies, then the one placeholder for replying to it.
/// Discussions nest one level, so pending replies to any comment of the thread render here.
fn render_discussion_thread(out: &mut String, doc: &Document, existing: &[&Comment], root: &Comment) {
	render_discussion_subtree(out, existing, root, 0);
	let Some(id) = root.id.as_deref() else { return };
	let pending: Vec<&Comment> = doc
		.new_comments()
		.filter(|c| c.parent_id.as_deref().is_some_and(|p| existing.iter().any(|e| e.id.as_deref() == Some(p)) && root_of(existing, p) == id))
		.collect();
	render_placeholders(out, Some(id), &pending, 1);
}

/// Render everything that follows the content region: comment section, review threads
/// (pull requests only) and the trailing placeholder for top-level comments.
pub fn render(doc: &Document) -> String {
	let kind = doc.kind();
	let existing: Vec<&Comment> = doc.existing_comments().collect();
	let existing_ids: HashSet<&str> = existing.iter().filter_map(|c| c.id.as_deref()).collect();
	let threads = doc.review_threads();
	let thread_ids: HashSet<&str> = threads.iter().map(|t| t.id.as_str()).collect();

	let is_discussion = kind == Some(ItemKind::Discussion);

	// Route unpushed comments back to the placeholder they were written in.
	let trailing: Vec<&Comment> = doc
		.new_comments()
		.filter(|c| match c.parent_id.as_deref() {
			Some(p) => !thread_ids.contains(p) && !(is_discussion && existing_ids.contains(p)),
			None => true,
		})
		.collect();

	let mut out = String::new();

	if !existing.is_empty() {
		out.push_str(SEPARATOR);
		out.push_str(SECTION_START);
		out.push_str("\n\n");

		if is_discussion {
			for root in existing.iter().filter(|c| is_root(c, &existing_ids)) {
				render_discussion_thread(&mut out, doc, &existing, root);
			}
		} else {
			// Flat lists can't nest, so these placeholders add top-level comments too
			for comment in &existing {
				render_comment(&mut out, comment, 0);
				render_placeholder(&mut out, None, "", 0);
			}
		}

		out.push_str(SECTION_END);
		out.push('\n');
	}

	if !threads.is_empty() {
		out.push_str(SEPARATOR);
		out.push_str(REVIEW_THREADS_HEADING);
		out.push_str("\n\n");
		for thread in threads {
			render_thread(&mut out, thread, &pending_for(doc, &thread.id));
		}
	}

	out.push_str(SEPARATOR);
	render_placeholders(&mut out, None, &trailing, 0);
	out
}
