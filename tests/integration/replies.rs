use gh_md::{Document, ItemKind, config::PushOptions, sync};

use crate::common::{TestContext, discussion, pull_request};

fn mutations(log: Vec<String>) -> Vec<String> {
	log.into_iter().filter(|c| c.starts_with("add_")).collect()
}

#[tokio::test]
async fn test_discussion_reply_and_top_level_comment() {
	let ctx = TestContext::new();
	ctx.remote.add_item(discussion(3));
	let path = ctx.pull(ItemKind::Discussion, 3).await;

	let content = ctx.read(&path);
	assert!(content.contains("  <!-- gh-md:comment\n  id: DC_2\n"), "reply should be nested under its parent:\n{content}");

	ctx.edit(&path, "  <!-- gh-md:new-comment reply_to: DC_1 -->\n", "  <!-- gh-md:new-comment reply_to: DC_1 -->\n  Thanks, that worked.\n");
	ctx.edit(&path, "<!-- gh-md:new-comment -->\n", "<!-- gh-md:new-comment -->\nMarking this as answered.\n");

	sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap();
	assert_eq!(mutations(ctx.remote.get_call_log()), vec!["add_reply DC_1", "add_comment D_3"]);

	let remote = ctx.remote_item(ItemKind::Discussion, 3);
	assert_eq!(remote.comments.len(), 4);
	assert_eq!(remote.comments[2].body, "Thanks, that worked.");
	assert_eq!(remote.comments[2].parent_id.as_deref(), Some("DC_1"));
	assert_eq!(remote.comments[3].body, "Marking this as answered.");
	assert_eq!(remote.comments[3].parent_id, None);

	let local = Document::parse_file(&path).unwrap();
	assert_eq!(local.new_comments().count(), 0);
	let replies: Vec<&str> = local.comments.iter().filter(|c| c.parent_id.as_deref() == Some("DC_1")).filter_map(|c| c.id.as_deref()).collect();
	assert_eq!(replies, vec!["DC_2", "MC_1"]);
}

#[tokio::test]
async fn test_review_thread_reply() {
	let ctx = TestContext::new();
	ctx.remote.add_item(pull_request(2, "open"));
	let path = ctx.pull(ItemKind::PullRequest, 2).await;

	let content = ctx.read(&path);
	assert!(content.contains("## Review Threads\n"));
	assert!(content.contains("### `src/lib.rs:42`\n"));

	ctx.edit(&path, "<!-- gh-md:new-comment reply_to: PRRT_1 -->\n", "<!-- gh-md:new-comment reply_to: PRRT_1 -->\nDone, made it a const.\n");

	sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap();
	assert_eq!(mutations(ctx.remote.get_call_log()), vec!["add_review_thread_reply PRRT_1"]);

	let local = Document::parse_file(&path).unwrap();
	let thread = &local.review_threads()[0];
	let bodies: Vec<&str> = thread.comments.iter().map(|c| c.body.as_str()).collect();
	assert_eq!(bodies, vec!["Could this be a const?", "Done, made it a const."]);
	assert!(local.comments.is_empty());
}
