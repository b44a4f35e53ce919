use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tidybox::cli::{OrganizeCommand, run_cli_with_config, run_shell};
use tidybox::output::OutputFormatter;

/// Sort the files of a directory into category folders.
#[derive(Parser, Debug)]
#[command(name = "tidybox", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./.tidyboxrc.toml, then ~/.config/tidybox/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move files into Documents, Images, Videos, Audio, Archives and Others
    Organize {
        dir: PathBuf,

        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Show what organize would do (same as organize --dry-run)
    Preview {
        dir: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Move the files of the last organize run back
    Undo { dir: PathBuf },
    /// Show file counts and sizes per category
    Summary {
        dir: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Read commands from stdin, keeping one session
    Shell { dir: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tidybox::init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Organize { dir, dry_run, json } => run_cli_with_config(
            OrganizeCommand::Organize {
                dry_run: *dry_run,
                json: *json,
            },
            dir,
            config,
        ),
        Commands::Preview { dir, json } => run_cli_with_config(
            OrganizeCommand::Organize {
                dry_run: true,
                json: *json,
            },
            dir,
            config,
        ),
        Commands::Undo { dir } => run_cli_with_config(OrganizeCommand::Undo, dir, config),
        Commands::Summary { dir, json } => {
            run_cli_with_config(OrganizeCommand::Summary { json: *json }, dir, config)
        }
        Commands::Shell { dir } => run_shell(dir, config, io::stdin().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
