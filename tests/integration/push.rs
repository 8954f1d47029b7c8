use gh_md::{
	Document, ItemKind,
	config::PushOptions,
	remote::RemoteSource,
	sync::{self, PlanStep, PushOutcome, SyncError},
};

use crate::common::{TestContext, issue, pull_request, ts};

const FORCE: PushOptions = PushOptions { force: true, dry_run: false };

#[tokio::test]
async fn test_pull_edit_push() {
	let ctx = TestContext::new();
	ctx.remote.add_item(issue(1));
	let path = ctx.pull(ItemKind::Issue, 1).await;
	assert!(path.ends_with("owner/repo/issues/1.md"));

	ctx.edit(&path, "# Remote title\n", "# Local title\n");
	ctx.edit(&path, "state: open\n", "state: closed\n");
	ctx.edit(&path, "original comment", "edited comment");
	ctx.edit(&path, "---\n\n<!-- gh-md:new-comment -->\n", "---\n\n<!-- gh-md:new-comment -->\nThanks for the report.\n");
	ctx.remote.clear_call_log();

	let outcome = sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap();
	let PushOutcome::Pushed { plan, refreshed, .. } = outcome else {
		panic!("expected a push");
	};
	assert_eq!(plan.edited_comments.len(), 1);
	assert_eq!(plan.new_comments.len(), 1);
	assert!(refreshed.is_some());
	assert_eq!(
		ctx.remote.get_call_log(),
		vec![
			"fetch_remote_state owner/repo#1",
			"fetch_comments owner/repo#1",
			"update_item I_1",
			"close_item I_1",
			"update_comment IC_1",
			"add_comment I_1",
			"fetch_item owner/repo#1",
		]
	);

	let remote = ctx.remote_item(ItemKind::Issue, 1);
	assert_eq!(remote.title, "Local title");
	assert_eq!(remote.state, "closed");
	let bodies: Vec<&str> = remote.comments.iter().map(|c| c.body.as_str()).collect();
	assert_eq!(bodies, vec!["edited comment", "Thanks for the report."]);
	assert_eq!(remote.comments[1].author, "me");

	// The local copy is replaced by the refreshed one: the new comment now has an id and the placeholder is empty again
	let local = Document::parse_file(&path).unwrap();
	assert_eq!(local.updated, remote.updated);
	assert_eq!(local.comments.len(), 2);
	assert_eq!(local.new_comments().count(), 0);
	assert_eq!(local.comments[1].id.as_deref(), Some("MC_1"));
	assert!(ctx.read(&path).contains("<!-- gh-md:new-comment -->\n<!-- /gh-md:new-comment -->\n"));

	// Pushing again only re-sends title and body
	let PushOutcome::Pushed { plan, .. } = sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap() else {
		panic!("expected a push");
	};
	assert!(plan.title_body_changed);
	assert_eq!(plan.state_change, None);
	assert!(plan.edited_comments.is_empty());
	assert!(plan.new_comments.is_empty());
}

#[tokio::test]
async fn test_conflict_then_force() {
	let ctx = TestContext::new();
	ctx.remote.add_item(issue(1));
	let path = ctx.pull(ItemKind::Issue, 1).await;

	// Someone else edits the item after our pull
	ctx.remote.update_item(ItemKind::Issue, "I_1", "Changed elsewhere", "Other body.").await.unwrap();
	ctx.edit(&path, "# Remote title\n", "# Local title\n");
	let before = ctx.read(&path);
	ctx.remote.clear_call_log();

	let err = sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap_err();
	let Some(SyncError::Conflict(conflict)) = err.downcast_ref::<SyncError>() else {
		panic!("expected a conflict, got {err:?}");
	};
	assert_eq!(conflict.reference, "owner/repo#1");
	assert_eq!(conflict.local, Some(ts("2026-01-15T10:00:00Z")));
	assert_eq!(conflict.remote, ts("2026-01-15T10:01:00Z"));
	assert_eq!(ctx.read(&path), before);
	assert!(!ctx.remote.get_call_log().iter().any(|c| c.starts_with("update_item")));

	let outcome = sync::push_file(&ctx.remote, &path, &FORCE).await.unwrap();
	let PushOutcome::Pushed { plan, .. } = outcome else {
		panic!("expected a push");
	};
	assert!(plan.conflict_overridden);

	let remote = ctx.remote_item(ItemKind::Issue, 1);
	assert_eq!(remote.title, "Local title");
	assert_eq!(remote.body, "Remote body.");
	let local = Document::parse_file(&path).unwrap();
	assert_eq!(local.updated, remote.updated);
	assert_eq!(local.updated, Some(ts("2026-01-15T10:02:00Z")));
}

#[tokio::test]
async fn test_dry_run_leaves_everything_alone() {
	let ctx = TestContext::new();
	ctx.remote.add_item(issue(1));
	let path = ctx.pull(ItemKind::Issue, 1).await;
	ctx.edit(&path, "state: open\n", "state: closed\n");
	let before = ctx.read(&path);

	let opts = PushOptions { dry_run: true, ..Default::default() };
	let outcome = sync::push_file(&ctx.remote, &path, &opts).await.unwrap();
	assert!(matches!(outcome, PushOutcome::DryRun(_)));
	assert_eq!(ctx.read(&path), before);
	assert_eq!(ctx.remote_item(ItemKind::Issue, 1).state, "open");
}

#[tokio::test]
async fn test_merged_pull_request_is_never_reopened() {
	let ctx = TestContext::new();
	ctx.remote.add_item(pull_request(5, "merged"));
	let path = ctx.pull(ItemKind::PullRequest, 5).await;
	ctx.edit(&path, "state: merged\n", "state: open\n");
	ctx.remote.clear_call_log();

	let outcome = sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap();
	let PushOutcome::Pushed { plan, .. } = outcome else {
		panic!("expected a push");
	};
	assert_eq!(plan.state_change, None);
	assert!(!ctx.remote.get_call_log().iter().any(|c| c.starts_with("reopen_item")));
	assert_eq!(ctx.remote_item(ItemKind::PullRequest, 5).state, "merged");

	// The refreshed copy carries the remote state again
	assert!(ctx.read(&path).contains("state: merged\n"));
}

#[tokio::test]
async fn test_closing_merged_pull_request_is_reported() {
	let ctx = TestContext::new();
	ctx.remote.add_item(pull_request(5, "merged"));
	let path = ctx.pull(ItemKind::PullRequest, 5).await;
	ctx.edit(&path, "state: merged\n", "state: closed\n");

	let err = sync::push_file(&ctx.remote, &path, &PushOptions::default()).await.unwrap_err();
	let Some(SyncError::PartialPlanFailure { failures, .. }) = err.downcast_ref::<SyncError>() else {
		panic!("expected a partial failure, got {err:?}");
	};
	assert_eq!(failures.len(), 1);
	assert_eq!(failures[0].step, PlanStep::Close);
	// Not refreshed, so the local edit survives
	assert!(ctx.read(&path).contains("state: closed\n"));
}
