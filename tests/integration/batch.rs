use gh_md::{Document, ItemKind, config::PushOptions, store, sync};

use crate::common::{OWNER, REPO, TestContext, discussion, issue, ts};

#[tokio::test]
async fn test_push_all_continues_past_failures() {
	let ctx = TestContext::new();
	for n in 1..=3 {
		ctx.remote.add_item(issue(n));
	}
	let pulled = sync::pull_repo(&ctx.remote, ctx.root(), OWNER, REPO, None).await.unwrap();
	assert_eq!(pulled.len(), 3);

	let first = store::item_path(ctx.root(), ItemKind::Issue, OWNER, REPO, 1);
	ctx.edit(&first, "# Remote title\n", "# Local title\n");
	// Known locally but not on the remote
	store::write_document(ctx.root(), &issue(9)).unwrap();
	// Not a document at all
	std::fs::write(store::item_path(ctx.root(), ItemKind::Issue, OWNER, REPO, 10), "just some notes\n").unwrap();

	let report = sync::push_all(&ctx.remote, ctx.root(), None, &PushOptions::default()).await;

	let pushed: Vec<u64> = report.pushed.iter().map(|p| Document::parse_file(p).unwrap().number).collect();
	assert_eq!(pushed, vec![1, 2, 3]);
	assert_eq!(report.failure_count(), 2);
	assert!(report.failures[0].path.ends_with("issues/10.md"));
	assert!(report.failures[1].path.ends_with("issues/9.md"));
	assert!(report.failures[1].error.to_string().contains("fetch_remote_state"));

	assert_eq!(ctx.remote_item(ItemKind::Issue, 1).title, "Local title");
	let refreshed = Document::parse_file(&first).unwrap();
	assert_eq!(refreshed.updated, ctx.remote_item(ItemKind::Issue, 1).updated);
}

#[tokio::test]
async fn test_push_all_repo_filter() {
	let ctx = TestContext::new();
	ctx.remote.add_item(issue(1));
	ctx.pull(ItemKind::Issue, 1).await;

	let report = sync::push_all(&ctx.remote, ctx.root(), Some("someone/else"), &PushOptions::default()).await;
	assert!(report.pushed.is_empty());
	assert_eq!(report.failure_count(), 0);
	assert!(ctx.remote.get_call_log().iter().all(|c| !c.starts_with("update_item")));
}

#[tokio::test]
async fn test_pull_repo_since() {
	let ctx = TestContext::new();
	ctx.remote.add_item(issue(1));
	ctx.remote.add_item(Document {
		updated: Some(ts("2026-02-01T00:00:00Z")),
		..issue(2)
	});
	ctx.remote.add_item(Document {
		updated: Some(ts("2026-02-01T00:00:00Z")),
		..discussion(3)
	});

	let paths = sync::pull_repo(&ctx.remote, ctx.root(), OWNER, REPO, Some(ts("2026-01-20T00:00:00Z"))).await.unwrap();
	assert_eq!(paths.len(), 2);
	assert!(paths[0].ends_with("owner/repo/issues/2.md"));
	assert!(paths[1].ends_with("owner/repo/discussions/3.md"));
	assert!(!store::item_path(ctx.root(), ItemKind::Issue, OWNER, REPO, 1).exists());

	let scan = store::scan(ctx.root(), Some("owner/repo"));
	assert_eq!(scan.documents.len(), 2);
	assert!(scan.documents.iter().all(|(_, d)| d.last_pulled.is_some()));
}
