//! Applying change plans and moving documents between the remote and the local mirror.
//!
//! ## Step order
//!
//! 1. title/body update
//! 2. state transition
//! 3. edited comments
//! 4. new comments
//!
//! State changes and new comments depend on the item content being in its final state, so they are
//! skipped when the title/body update fails. Comment edits are independent and always attempted.
//! Every failure is collected; nothing aborts the remaining steps.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use std::{
	fmt,
	path::{Path, PathBuf},
};

use color_eyre::eyre::{Report, Result};
use jiff::Timestamp;
use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::{
	config::PushOptions,
	document::{Document, ItemKind},
	plan::{ChangePlan, ConflictError, ReplyTarget, StateChange},
	remote::RemoteSource,
	store,
};

//==============================================================================
// Errors
//==============================================================================

#[derive(Debug, Diagnostic, Error)]
pub enum SyncError {
	#[error(transparent)]
	#[diagnostic(transparent)]
	Conflict(#[from] ConflictError),

	#[error("cannot determine item kind for {reference}")]
	#[diagnostic(code(gh_md::sync::unknown_kind), help("documents must live under an issues/, pulls/ or discussions/ directory"))]
	UnknownItemKind { reference: String },

	#[error("{reference} has no remote id")]
	#[diagnostic(code(gh_md::sync::missing_identity), help("pull the item to get a complete header"))]
	MissingIdentity { reference: String },

	#[error("{operation} failed: {message}")]
	#[diagnostic(code(gh_md::sync::remote))]
	Remote { operation: String, message: String },

	#[error("{} planned step(s) failed for {reference}: {}", .failures.len(), describe_failures(.failures))]
	#[diagnostic(code(gh_md::sync::partial_failure), help("completed steps are already applied remotely; fix the cause and push again"))]
	PartialPlanFailure { reference: String, failures: Vec<StepFailure> },
}

fn describe_failures(failures: &[StepFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SyncError {
	fn remote(operation: &str, err: Report) -> Self {
		SyncError::Remote {
			operation: operation.to_string(),
			message: err.to_string(),
		}
	}
}

//==============================================================================
// Execution
//==============================================================================

/// One remote mutation from a plan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanStep {
	UpdateTitleBody,
	Close,
	Reopen,
	UpdateComment(String),
	AddComment,
	AddReply(String),
	AddReviewThreadReply(String),
}

impl fmt::Display for PlanStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlanStep::UpdateTitleBody => write!(f, "update title/body"),
			PlanStep::Close => write!(f, "close"),
			PlanStep::Reopen => write!(f, "reopen"),
			PlanStep::UpdateComment(id) => write!(f, "update comment {id}"),
			PlanStep::AddComment => write!(f, "add comment"),
			PlanStep::AddReply(parent) => write!(f, "reply to {parent}"),
			PlanStep::AddReviewThreadReply(thread) => write!(f, "reply to review thread {thread}"),
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepFailure {
	pub step: PlanStep,
	pub message: String,
}

impl fmt::Display for StepFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.step, self.message)
	}
}

#[derive(Clone, Debug, Default)]
pub struct ExecutionReport {
	pub completed: Vec<PlanStep>,
	pub failures: Vec<StepFailure>,
	/// Steps not attempted because an earlier step they depend on failed.
	pub skipped: Vec<PlanStep>,
}

impl ExecutionReport {
	pub fn is_success(&self) -> bool {
		self.failures.is_empty() && self.skipped.is_empty()
	}

	fn record(&mut self, step: PlanStep, result: Result<()>) -> bool {
		match result {
			Ok(()) => {
				tracing::debug!("[sync] {step}: ok");
				self.completed.push(step);
				true
			}
			Err(e) => {
				tracing::warn!("[sync] {step} failed: {e}");
				self.failures.push(StepFailure { step, message: e.to_string() });
				false
			}
		}
	}

	fn skip(&mut self, step: PlanStep) {
		tracing::warn!("[sync] skipping {step}: title/body update failed");
		self.skipped.push(step);
	}
}

/// Apply `plan` against the remote in the fixed step order.
#[instrument(skip_all, fields(item = %plan.reference))]
pub async fn execute(remote: &dyn RemoteSource, plan: &ChangePlan) -> ExecutionReport {
	let mut report = ExecutionReport::default();
	let kind = plan.kind;
	let item_id = plan.item_id.as_str();

	let mut content_ok = true;
	if plan.title_body_changed {
		content_ok = report.record(PlanStep::UpdateTitleBody, remote.update_item(kind, item_id, &plan.title, &plan.body).await);
	}

	if let Some(change) = plan.state_change {
		let step = match change {
			StateChange::Close => PlanStep::Close,
			StateChange::Reopen => PlanStep::Reopen,
		};
		if content_ok {
			let result = match change {
				StateChange::Close => remote.close_item(kind, item_id).await,
				StateChange::Reopen => remote.reopen_item(kind, item_id).await,
			};
			report.record(step, result);
		} else {
			report.skip(step);
		}
	}

	for edit in &plan.edited_comments {
		report.record(PlanStep::UpdateComment(edit.id.clone()), remote.update_comment(kind, &edit.id, &edit.body).await);
	}

	for new in &plan.new_comments {
		let step = match &new.target {
			ReplyTarget::Item => PlanStep::AddComment,
			ReplyTarget::Comment(parent) => PlanStep::AddReply(parent.clone()),
			ReplyTarget::ReviewThread(thread) => PlanStep::AddReviewThreadReply(thread.clone()),
		};
		if !content_ok {
			report.skip(step);
			continue;
		}
		let result = match &new.target {
			ReplyTarget::Item => remote.add_comment(kind, item_id, &new.body).await,
			ReplyTarget::Comment(parent) => remote.add_reply(item_id, parent, &new.body).await,
			ReplyTarget::ReviewThread(thread) => remote.add_review_thread_reply(thread, &new.body).await,
		};
		report.record(step, result);
	}

	report
}

//==============================================================================
// Push
//==============================================================================

#[derive(Debug)]
pub enum PushOutcome {
	/// Nothing to push.
	NoChanges,
	/// `dry_run` was set; the plan was built but not executed.
	DryRun(ChangePlan),
	Pushed {
		plan: ChangePlan,
		report: ExecutionReport,
		/// Fresh copy fetched after the push. `None` if the re-fetch failed.
		refreshed: Option<Document>,
	},
}

/// Fetch an item and stamp `last_pulled`.
pub async fn fetch(remote: &dyn RemoteSource, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<Document> {
	let mut doc = remote.fetch_item(kind, owner, repo, number).await?;
	doc.last_pulled = Some(Timestamp::now());
	Ok(doc)
}

/// Push one parsed document: conflict check, plan, execute, re-fetch.
#[instrument(skip_all, fields(item = %doc.reference()))]
pub async fn push(remote: &dyn RemoteSource, doc: &Document, opts: &PushOptions) -> Result<PushOutcome, SyncError> {
	let reference = doc.reference();
	let kind = doc.kind().ok_or_else(|| SyncError::UnknownItemKind { reference: reference.clone() })?;
	if doc.id.is_empty() {
		return Err(SyncError::MissingIdentity { reference });
	}

	let remote_state = remote
		.fetch_remote_state(kind, &doc.owner, &doc.repo, doc.number)
		.await
		.map_err(|e| SyncError::remote("fetch_remote_state", e))?;
	let remote_comments = remote
		.fetch_comments(kind, &doc.owner, &doc.repo, doc.number)
		.await
		.map_err(|e| SyncError::remote("fetch_comments", e))?;

	let plan = ChangePlan::build(doc, kind, &remote_state, &remote_comments, opts)?;

	if opts.dry_run {
		return Ok(PushOutcome::DryRun(plan));
	}
	if !plan.has_changes() {
		tracing::debug!("[sync] {reference}: no changes");
		return Ok(PushOutcome::NoChanges);
	}

	let report = execute(remote, &plan).await;
	if !report.is_success() {
		// No re-fetch: it would overwrite local comments that never made it to the remote.
		let mut failures = report.failures;
		failures.extend(report.skipped.into_iter().map(|step| StepFailure {
			step,
			message: "skipped".to_string(),
		}));
		return Err(SyncError::PartialPlanFailure { reference, failures });
	}

	let refreshed = match fetch(remote, kind, &doc.owner, &doc.repo, doc.number).await {
		Ok(fresh) => Some(fresh),
		Err(e) => {
			tracing::warn!("[sync] {reference}: pushed, but re-fetch failed: {e}");
			None
		}
	};

	Ok(PushOutcome::Pushed { plan, report, refreshed })
}

/// Parse `path`, push it, and write the refreshed copy back to `path`.
pub async fn push_file(remote: &dyn RemoteSource, path: &Path, opts: &PushOptions) -> Result<PushOutcome> {
	let doc = Document::parse_file(path)?;
	let outcome = push(remote, &doc, opts).await?;
	if let PushOutcome::Pushed { refreshed: Some(fresh), .. } = &outcome {
		store::save(path, fresh)?;
	}
	Ok(outcome)
}

//==============================================================================
// Pull
//==============================================================================

/// Fetch one item and write it under `root`.
#[instrument(skip(remote, root))]
pub async fn pull(remote: &dyn RemoteSource, root: &Path, kind: ItemKind, owner: &str, repo: &str, number: u64) -> Result<PathBuf> {
	let doc = fetch(remote, kind, owner, repo, number).await?;
	store::write_document(root, &doc)
}

/// Fetch every item of every kind in a repository (optionally only those updated since `since`) and write them under `root`.
#[instrument(skip(remote, root))]
pub async fn pull_repo(remote: &dyn RemoteSource, root: &Path, owner: &str, repo: &str, since: Option<Timestamp>) -> Result<Vec<PathBuf>> {
	let pulled_at = Timestamp::now();
	let mut paths = Vec::new();
	for kind in ItemKind::ALL {
		for mut doc in remote.fetch_items(kind, owner, repo, since).await? {
			doc.last_pulled = Some(pulled_at);
			paths.push(store::write_document(root, &doc)?);
		}
	}
	tracing::debug!("[sync] pulled {} item(s) from {owner}/{repo}", paths.len());
	Ok(paths)
}

//==============================================================================
// Batch
//==============================================================================

#[derive(Debug)]
pub struct BatchFailure {
	pub path: PathBuf,
	pub error: Report,
}

/// Outcome of pushing many documents. Failures don't stop the batch.
#[derive(Debug, Default)]
pub struct BatchReport {
	pub pushed: Vec<PathBuf>,
	pub unchanged: Vec<PathBuf>,
	pub failures: Vec<BatchFailure>,
}

impl BatchReport {
	pub fn failure_count(&self) -> usize {
		self.failures.len()
	}
}

/// Push every document under `root` (optionally one `owner/repo`), one at a time.
#[instrument(skip(remote, root, opts))]
pub async fn push_all(remote: &dyn RemoteSource, root: &Path, repo_filter: Option<&str>, opts: &PushOptions) -> BatchReport {
	let scan = store::scan(root, repo_filter);
	let mut report = BatchReport::default();

	for (path, error) in scan.failures {
		report.failures.push(BatchFailure { path, error: error.into() });
	}

	for (path, doc) in scan.documents {
		let result = match push(remote, &doc, opts).await {
			Ok(PushOutcome::Pushed { refreshed: Some(fresh), .. }) => store::save(&path, &fresh).map(|()| true),
			Ok(PushOutcome::Pushed { refreshed: None, .. }) => Ok(true),
			Ok(PushOutcome::NoChanges | PushOutcome::DryRun(_)) => Ok(false),
			Err(e) => Err(e.into()),
		};
		match result {
			Ok(true) => report.pushed.push(path),
			Ok(false) => report.unchanged.push(path),
			Err(error) => {
				tracing::warn!("[sync] {}: {error}", path.display());
				report.failures.push(BatchFailure { path, error });
			}
		}
	}

	tracing::debug!("[sync] batch: {} pushed, {} unchanged, {} failed", report.pushed.len(), report.unchanged.len(), report.failures.len());
	report
}
