use anyhow::{Context, Result};
use clap::Parser;
use fdr_cli::{Cli, Commands, RunConfig};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    // logs go to stderr so stdout stays clean for tables and TOML
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: could not install log subscriber: {err}");
    }

    if let Err(err) = run(&cli) {
        report(&err);
        std::process::exit(2);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RunConfig::default(),
    };

    match &cli.command {
        Commands::Run(args) => commands::run::handle(config, args),
        Commands::Profile(args) => commands::profile::handle(config, args),
        Commands::Case { feeder, solve } => commands::case::handle(&config, feeder.as_deref(), *solve),
        Commands::Config => commands::config::handle(&config),
    }
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {err}");
    let mut shown = err.to_string();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        // step errors already print their source inline
        if !shown.contains(&text) {
            eprintln!("  caused by: {text}");
        }
        shown = text;
    }
}
