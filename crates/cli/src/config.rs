//! Serve configuration: CLI flags layered over an optional JSON file.
//!
//! Precedence is flag > file > built-in default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::ServeArgs;

/// Schema version written to and accepted from config files.
pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9222;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("invalid config file {}", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("config file {} has schema {found}, this build understands up to {SCHEMA_VERSION}", path.display())]
	Schema { path: PathBuf, found: u32 },
}

/// Target seeded into the in-memory provider at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetSeed {
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
}

impl TargetSeed {
	pub fn page(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			title: None,
			kind: None,
		}
	}
}

/// On-disk config. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
	#[serde(default)]
	pub schema: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auto_reply: Option<bool>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub targets: Vec<TargetSeed>,
}

impl FileConfig {
	/// Creates an empty config with the current [`SCHEMA_VERSION`].
	pub fn new() -> Self {
		Self {
			schema: SCHEMA_VERSION,
			..Default::default()
		}
	}

	/// Reads and validates a config file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		if config.schema > SCHEMA_VERSION {
			return Err(ConfigError::Schema {
				path: path.to_path_buf(),
				found: config.schema,
			});
		}
		Ok(config)
	}

	/// Like [`load`](Self::load), but a missing file is `None`.
	pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
		match Self::load(path) {
			Ok(config) => Ok(Some(config)),
			Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err),
		}
	}
}

/// `<config dir>/cdpmux/config.json`, when the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("cdpmux").join("config.json"))
}

/// Effective settings for `cdpmux serve`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
	pub host: String,
	pub port: u16,
	pub auto_reply: bool,
	pub targets: Vec<TargetSeed>,
}

impl ServeConfig {
	/// Loads the config file named by `--config`, or the default file if it
	/// exists, and layers the flags over it.
	pub fn resolve(args: &ServeArgs) -> Result<Self, ConfigError> {
		let file = match &args.config {
			Some(path) => FileConfig::load(path)?,
			None => match default_path() {
				Some(path) => FileConfig::load_optional(&path)?.unwrap_or_default(),
				None => FileConfig::default(),
			},
		};
		Ok(Self::merge(args, file))
	}

	pub fn merge(args: &ServeArgs, file: FileConfig) -> Self {
		let targets = if args.targets.is_empty() {
			file.targets
		} else {
			args.targets.iter().map(TargetSeed::page).collect()
		};
		Self {
			host: args.host.clone().or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_owned()),
			port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
			auto_reply: !args.no_auto_reply && file.auto_reply.unwrap_or(true),
			targets,
		}
	}
}
