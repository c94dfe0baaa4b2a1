//! Kustwrap CLI - Apply declarative customizations to kustomize applications

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod display;
mod error;
mod exit_codes;

use commands::BuildArgs;
use config::KustwrapConfig;

#[derive(Parser)]
#[command(name = "kustwrap")]
#[command(author = "Kustwrap Contributors")]
#[command(version)]
#[command(about = "Apply declarative customizations to kustomize applications and build them", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.config/kustwrap/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a customization spec and run `kustomize build`
    Build(BuildArgs),

    /// Build and list the container images of the generated objects
    Images(BuildArgs),

    /// Show the detected kustomize version
    Version {
        /// kustomize binary
        #[arg(long, env = "KUSTWRAP_KUSTOMIZE")]
        kustomize: Option<String>,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    let config = KustwrapConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(args) => commands::build::run(&args, &config),

        Commands::Images(args) => commands::images::run(&args, &config),

        Commands::Version { kustomize } => {
            let binary = kustomize
                .or(config.binary_path)
                .unwrap_or_else(|| kustwrap_engine::version::DEFAULT_BINARY.to_string());
            commands::version::run(&binary)
        }
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
