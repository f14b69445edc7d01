use cdpmux_cli::cli::{Cli, Commands};
use cdpmux_cli::{logging, server};
use clap::Parser;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let result = match cli.command {
		Commands::Serve(args) => server::run_serve(args).await,
	};

	if let Err(err) = result {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
