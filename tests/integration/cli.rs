//! Runs the built binary against a remote snapshot file.

use std::{
	path::{Path, PathBuf},
	process::{Command, Output},
};

use gh_md::{ItemKind, remote::mock::MockRemote};
use insta::assert_snapshot;

use crate::common::{TestContext, issue};

struct Cli {
	ctx: TestContext,
	snapshot: PathBuf,
}

impl Cli {
	fn new() -> Self {
		let ctx = TestContext::new();
		ctx.remote.add_item(issue(1));
		let snapshot = ctx.root().join("remote.json");
		std::fs::write(&snapshot, ctx.remote.state_json().unwrap()).unwrap();
		Self { ctx, snapshot }
	}

	fn mirror(&self) -> PathBuf {
		self.ctx.root().join("mirror")
	}

	fn run(&self, args: &[&str]) -> Output {
		let root = self.mirror();
		let config = self.ctx.root().join("absent.toml");
		Command::new(env!("CARGO_BIN_EXE_gh-md"))
			.arg("--root")
			.arg(&root)
			.arg("--config")
			.arg(&config)
			.args(args)
			.env_remove("RUST_LOG")
			.env_remove("GH_MD_ROOT")
			.output()
			.unwrap()
	}

	fn run_with_remote(&self, args: &[&str]) -> Output {
		let mut full: Vec<&str> = args.to_vec();
		full.push("--remote-state");
		full.push(self.snapshot.to_str().unwrap());
		self.run(&full)
	}

	fn remote(&self) -> MockRemote {
		MockRemote::load_state_json(&std::fs::read_to_string(&self.snapshot).unwrap()).unwrap()
	}
}

fn stdout(out: &Output) -> String {
	assert!(out.status.success(), "command failed:\nstdout: {}\nstderr: {}", String::from_utf8_lossy(&out.stdout), String::from_utf8_lossy(&out.stderr));
	String::from_utf8_lossy(&out.stdout).into_owned()
}

fn item_file(root: &Path) -> PathBuf {
	root.join("owner/repo/issues/1.md")
}

#[test]
fn test_cli_pull_plan_push() {
	let cli = Cli::new();

	let out = stdout(&cli.run_with_remote(&["pull", "https://github.com/owner/repo/issues/1"]));
	assert!(out.starts_with("Pulled issue owner/repo#1 to "));
	let file = item_file(&cli.mirror());
	assert!(file.is_file());

	cli.ctx.edit(&file, "# Remote title\n", "# Local title\n");
	cli.ctx.edit(&file, "---\n\n<!-- gh-md:new-comment -->\n", "---\n\n<!-- gh-md:new-comment -->\nLooks good to me.\n");

	let plan = stdout(&cli.run_with_remote(&["plan", "owner/repo/issues/1"]));
	assert_snapshot!(plan, @r"
	Would push issue #1:
	  Title: Local title
	  Body:  12 characters
	  New comments: 1
	    1. Looks good to me.
	");
	// Planning doesn't touch the snapshot
	assert_eq!(cli.remote().item(ItemKind::Issue, "owner", "repo", 1).unwrap().title, "Remote title");

	let out = stdout(&cli.run_with_remote(&["push", file.to_str().unwrap()]));
	assert_eq!(out.trim(), "Pushed owner/repo#1");

	let remote = cli.remote().item(ItemKind::Issue, "owner", "repo", 1).unwrap();
	assert_eq!(remote.title, "Local title");
	assert_eq!(remote.comments.last().map(|c| c.body.as_str()), Some("Looks good to me."));
}

#[test]
fn test_cli_show_and_list() {
	let cli = Cli::new();
	stdout(&cli.run_with_remote(&["pull", "owner/repo"]));

	let shown: serde_json::Value = serde_json::from_str(&stdout(&cli.run(&["show", "owner/repo/issues/1"]))).unwrap();
	assert_eq!(shown["title"], "Remote title");
	assert_eq!(shown["meta"]["kind"], "issue");
	assert_eq!(shown["comments"][0]["id"], "IC_1");

	let listed = stdout(&cli.run(&["list"]));
	assert!(listed.starts_with("issue "));
	assert!(listed.contains("owner/repo#1"));
	assert!(listed.trim_end().ends_with("Remote title"));
}

#[test]
fn test_cli_list_reports_broken_files() {
	let cli = Cli::new();
	stdout(&cli.run_with_remote(&["pull", "owner/repo/issues/1"]));
	std::fs::write(cli.mirror().join("owner/repo/issues/2.md"), "no header\n").unwrap();

	let out = cli.run(&["list"]);
	assert!(!out.status.success());
	assert!(String::from_utf8_lossy(&out.stdout).contains("owner/repo#1"));
	assert!(String::from_utf8_lossy(&out.stderr).contains("skipped"));
}

#[test]
fn test_cli_conflict_fails_without_force() {
	let cli = Cli::new();
	stdout(&cli.run_with_remote(&["pull", "owner/repo/issues/1"]));

	// Advance the remote past the pulled copy
	let remote = cli.remote();
	let mut item = remote.item(ItemKind::Issue, "owner", "repo", 1).unwrap();
	item.updated = Some(crate::common::ts("2026-03-01T00:00:00Z"));
	remote.add_item(item);
	std::fs::write(&cli.snapshot, remote.state_json().unwrap()).unwrap();

	let out = cli.run_with_remote(&["push", "owner/repo/issues/1"]);
	assert!(!out.status.success());
	assert!(String::from_utf8_lossy(&out.stderr).contains("was updated remotely"), "{}", String::from_utf8_lossy(&out.stderr));

	stdout(&cli.run_with_remote(&["push", "owner/repo/issues/1", "--force"]));
}
