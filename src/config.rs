//! Application configuration.
//!
//! Settings come from an optional TOML file, overridden by `GH_MD_*` environment variables.
//! Per-invocation switches live in [`PushOptions`] and are passed explicitly.

use std::path::{Path, PathBuf};

use color_eyre::eyre::Result;
use serde::Deserialize;
use smart_default::SmartDefault;

pub const ENV_PREFIX: &str = "GH_MD";

#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct AppConfig {
	/// Root of the local mirror: `<root>/<owner>/<repo>/<kind>/<number>.md`.
	#[default(default_root())]
	pub root: PathBuf,
}

fn home_dir() -> PathBuf {
	std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

fn default_root() -> PathBuf {
	home_dir().join(".gh-md")
}

/// `$XDG_CONFIG_HOME/gh-md/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> PathBuf {
	let base = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from).unwrap_or_else(|| home_dir().join(".config"));
	base.join("gh-md").join("config.toml")
}

impl AppConfig {
	/// Load from `path` (or the default location) layered under the environment. A missing file is fine.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
		let settings = config::Config::builder()
			.add_source(config::File::from(path.as_path()).required(false))
			.add_source(config::Environment::with_prefix(ENV_PREFIX))
			.build()?;
		let app: AppConfig = settings.try_deserialize()?;
		tracing::debug!("[config] root = {}", app.root.display());
		Ok(app)
	}
}

/// Switches for a single push.
#[derive(Clone, Copy, Debug, Default)]
pub struct PushOptions {
	/// Push even if the remote changed since the last pull.
	pub force: bool,
	/// Build the plan but don't execute it.
	pub dry_run: bool,
}
