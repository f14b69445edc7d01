
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Root CLI for cdpmux.
#[derive(Parser, Debug)]
#[command(name = "cdpmux")]
#[command(about = "Serve multiplexed Chrome DevTools Protocol sessions over WebSocket")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Start the DevTools HTTP/WebSocket endpoint.
	Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
	/// Address to listen on [default: 127.0.0.1]
	#[arg(long, value_name = "HOST")]
	pub host: Option<String>,

	/// Port to listen on [default: 9222]
	#[arg(short, long, value_name = "PORT")]
	pub port: Option<u16>,

	/// Config file (defaults to <config dir>/cdpmux/config.json when present).
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Seed a page target showing URL. Repeatable; replaces targets from the config file.
	#[arg(long = "target", value_name = "URL")]
	pub targets: Vec<String>,

	/// Queue commands sent to targets instead of answering them with `{}`.
	#[arg(long)]
	pub no_auto_reply: bool,
}
