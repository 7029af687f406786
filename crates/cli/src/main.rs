mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use amr_oracle_core::RootPolicy;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Root choice for alignment sets without a unique subgraph root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TieBreak {
    Strict,
    LowestId,
}

impl From<TieBreak> for RootPolicy {
    fn from(t: TieBreak) -> Self {
        match t {
            TieBreak::Strict => RootPolicy::Strict,
            TieBreak::LowestId => RootPolicy::LowestId,
        }
    }
}

/// Transition oracle for aligned AMR corpora.
#[derive(Parser)]
#[command(
    name = "amr-oracle",
    version,
    about = "Transition oracle for aligned AMR corpora"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive action traces for every sentence of a JAMR corpus
    Derive(commands::derive::DeriveArgs),

    /// Rebuild graphs from a recorded oracle trace file
    Replay {
        /// Oracle trace file written by `derive --out-oracle`
        #[arg(long)]
        in_oracle: PathBuf,
        /// Write rebuilt graphs here instead of stdout
        #[arg(long)]
        out_amr: Option<PathBuf>,
        /// Keep entity heads unexpanded
        #[arg(long)]
        no_entity_rules: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Commands::Derive(args) => {
            commands::derive::cmd_derive(&args, cli.output, cli.quiet);
        }
        Commands::Replay {
            in_oracle,
            out_amr,
            no_entity_rules,
        } => {
            commands::replay::cmd_replay(
                &in_oracle,
                out_amr.as_deref(),
                !no_entity_rules,
                cli.output,
                cli.quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{{\"error\": \"{}\"}}", msg.replace('"', "\\\""));
        }
    }
}
