use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail, eyre};
use gh_md::{
	Document,
	config::{AppConfig, PushOptions},
	remote::mock::MockRemote,
	store::{self, ItemAddress},
	sync::{self, PushOutcome},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
	/// Config file (default: $XDG_CONFIG_HOME/gh-md/config.toml)
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// Root of the local mirror; overrides the config
	#[arg(long, global = true)]
	root: Option<PathBuf>,
	/// Log as JSON
	#[arg(long, global = true)]
	json_logs: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Parse a local document and print it as JSON
	Show { input: String },
	/// List documents in the mirror
	List {
		/// Only this owner/repo
		#[arg(long)]
		repo: Option<String>,
	},
	/// Fetch an item (owner/repo/<kind>/<number> or URL), or every item of an owner/repo, into the mirror
	Pull {
		target: String,
		#[clap(flatten)]
		remote: RemoteArgs,
		/// With owner/repo: only items updated at or after this time (RFC 3339)
		#[arg(long)]
		since: Option<jiff::Timestamp>,
	},
	/// Show what a push would do
	Plan {
		input: String,
		#[clap(flatten)]
		remote: RemoteArgs,
		#[arg(long)]
		force: bool,
	},
	/// Push local edits and refresh the local copy
	Push {
		input: String,
		#[clap(flatten)]
		remote: RemoteArgs,
		#[arg(long)]
		force: bool,
	},
	/// Push every document in the mirror, continuing past failures
	PushAll {
		#[arg(long)]
		repo: Option<String>,
		#[clap(flatten)]
		remote: RemoteArgs,
		#[arg(long)]
		force: bool,
	},
}

#[derive(Args, Debug)]
struct RemoteArgs {
	/// JSON snapshot used as the remote; updated in place after mutations
	#[arg(long)]
	remote_state: PathBuf,
}

impl RemoteArgs {
	fn load(&self) -> Result<MockRemote> {
		let content = std::fs::read_to_string(&self.remote_state).map_err(|e| eyre!("failed to read {}: {e}", self.remote_state.display()))?;
		MockRemote::load_state_json(&content)
	}

	fn save(&self, remote: &MockRemote) -> Result<()> {
		store::write_atomic(&self.remote_state, &remote.state_json()?)?;
		Ok(())
	}
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
	if json {
		builder.json().init();
	} else {
		builder.init();
	}
}

/// Parse with the full miette diagnostic in the error message.
fn load_document(path: &Path) -> Result<Document> {
	Document::parse_file(path).map_err(|e| eyre!("{:?}", miette::Report::new(e)))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	let cli = Cli::parse();
	init_tracing(cli.json_logs);

	let mut config = AppConfig::load(cli.config.as_deref())?;
	if let Some(root) = cli.root {
		config.root = root;
	}

	match cli.command {
		Commands::Show { input } => {
			let path = store::resolve_input(&config.root, &input)?;
			let doc = load_document(&path)?;
			println!("{}", serde_json::to_string_pretty(&doc)?);
		}
		Commands::List { repo } => {
			let scan = store::scan(&config.root, repo.as_deref());
			for (_, doc) in &scan.documents {
				let kind = doc.kind().map(|k| k.label()).unwrap_or("?");
				println!("{kind:<10} {:<30} {}", doc.reference(), doc.title);
			}
			for (path, err) in &scan.failures {
				eprintln!("skipped {}: {err}", path.display());
			}
			if !scan.failures.is_empty() {
				bail!("{} file(s) could not be parsed", scan.failures.len());
			}
		}
		Commands::Pull { target, remote, since } => {
			let mock = remote.load()?;
			match ItemAddress::parse(&target) {
				Some(a) => {
					let path = sync::pull(&mock, &config.root, a.kind, &a.owner, &a.repo, a.number).await?;
					println!("Pulled {a} to {}", path.display());
				}
				None => {
					let Some((owner, repo)) = target.split_once('/') else {
						bail!("expected owner/repo or an item reference, got {target:?}");
					};
					let paths = sync::pull_repo(&mock, &config.root, owner, repo, since).await?;
					println!("Pulled {} item(s) from {owner}/{repo}", paths.len());
				}
			}
		}
		Commands::Plan { input, remote, force } => {
			let mock = remote.load()?;
			let path = store::resolve_input(&config.root, &input)?;
			let doc = load_document(&path)?;
			let opts = PushOptions { force, dry_run: true };
			match sync::push(&mock, &doc, &opts).await.map_err(|e| eyre!("{:?}", miette::Report::new(e)))? {
				PushOutcome::DryRun(plan) => print!("{}", plan.summary()),
				other => bail!("unexpected outcome for a dry run: {other:?}"),
			}
		}
		Commands::Push { input, remote, force } => {
			let mock = remote.load()?;
			let path = store::resolve_input(&config.root, &input)?;
			let opts = PushOptions { force, dry_run: false };
			let outcome = sync::push_file(&mock, &path, &opts).await;
			// Mutations that did go through are kept even when the push as a whole failed
			remote.save(&mock)?;
			match outcome? {
				PushOutcome::NoChanges => println!("No changes to push for {}", path.display()),
				PushOutcome::DryRun(plan) => print!("{}", plan.summary()),
				PushOutcome::Pushed { plan, refreshed, .. } => {
					println!("Pushed {}", plan.reference);
					if refreshed.is_none() {
						eprintln!("Warning: failed to refresh the local copy; pull it to sync manually");
					}
				}
			}
		}
		Commands::PushAll { repo, remote, force } => {
			let mock = remote.load()?;
			let opts = PushOptions { force, dry_run: false };
			let report = sync::push_all(&mock, &config.root, repo.as_deref(), &opts).await;
			remote.save(&mock)?;
			println!("Pushed {}, unchanged {}, failed {}", report.pushed.len(), report.unchanged.len(), report.failure_count());
			for failure in &report.failures {
				eprintln!("  {}: {}", failure.path.display(), failure.error);
			}
			if report.failure_count() > 0 {
				bail!("{} document(s) failed to push", report.failure_count());
			}
		}
	}

	Ok(())
}
