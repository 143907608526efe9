use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use anstream::{ColorChoice, eprintln};
use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use grove_logging::GroveFormat;

use crate::resolve::{ResolveArgs, resolve};

mod resolve;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show timestamps, log targets and spans on every log line.
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the dependencies of a package from a JSON index.
    Resolve(ResolveArgs),
}

#[instrument(skip_all)] // Anchor span to check for overhead
async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve(args) => resolve(args).await?,
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Show `INFO` messages from the grove crates, but allow `RUST_LOG` to override.
    let default_directive = match Directive::from_str("grove=info") {
        Ok(directive) => directive,
        Err(err) => unreachable!("Invalid default directive: {err}"),
    };
    let filter = match EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env()
    {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("{}: Invalid RUST_LOG directives: {err}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let format = if cli.verbose {
        GroveFormat::verbose()
    } else {
        GroveFormat::default()
    };
    let ansi = match anstream::Stderr::choice(&std::io::stderr()) {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => true,
        ColorChoice::Never => false,
        // We just asked anstream for a choice, that can't be auto
        ColorChoice::Auto => unreachable!(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_filter(filter),
        )
        .init();

    let start = Instant::now();
    let result = run(cli).await;
    debug!("Took {}ms", start.elapsed().as_millis());
    if let Err(err) = result {
        eprintln!("{}", "grove-dev failed".red().bold());
        for err in err.chain() {
            eprintln!("  {}: {}", "Caused by".red().bold(), err);
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn resolve_defaults() {
        let cli = Cli::try_parse_from(["grove-dev", "resolve", "app", "--index", "index.json"])
            .unwrap();
        let Commands::Resolve(args) = cli.command;
        assert_eq!(args.root.as_str(), "app");
        assert_eq!(args.root_version.to_string(), "1.0.0");
        assert_eq!(args.prefetch, 16);
        assert!(!args.collapse);
        assert!(!cli.verbose);
    }

    #[test]
    fn invalid_root_name() {
        assert!(
            Cli::try_parse_from(["grove-dev", "resolve", "two words", "--index", "index.json"])
                .is_err()
        );
    }
}
