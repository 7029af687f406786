use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::Args;
use serde::Serialize;

use amr_oracle_core::corpus::SentenceFailure;
use amr_oracle_core::entity_rules::summary_lines;
use amr_oracle_core::oracle::REPORTED_KINDS;
use amr_oracle_core::{read_corpus_file, run_corpus, writer, OracleConfig, OracleStats};

use super::write_chunks;
use crate::{report_error, OutputFormat, TieBreak};

#[derive(Debug, Args)]
pub(crate) struct DeriveArgs {
    /// JAMR corpus with gold alignments
    #[arg(long)]
    in_amr: PathBuf,
    /// Oracle trace blocks (tokens line, actions line)
    #[arg(long)]
    out_oracle: Option<PathBuf>,
    /// Predicted graphs, JAMR metadata and PENMAN
    #[arg(long)]
    out_amr: Option<PathBuf>,
    /// One sentence per line
    #[arg(long)]
    out_sentences: Option<PathBuf>,
    /// One action sequence per line
    #[arg(long)]
    out_actions: Option<PathBuf>,
    /// Oracle settings (TOML); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append this many <unaligned> placeholder tokens per sentence
    #[arg(long)]
    add_unaligned: Option<usize>,
    /// Keep entity heads unexpanded at CLOSE
    #[arg(long)]
    no_entity_rules: bool,
    /// Root choice when an alignment has no unique subgraph root
    #[arg(long, value_enum)]
    root_tie_break: Option<TieBreak>,
    /// Worker threads (default: one per core)
    #[arg(long)]
    threads: Option<usize>,
    /// Descriptors listed per action in the text report
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Serialize)]
struct Report<'a> {
    derived: usize,
    failed: Vec<&'a SentenceFailure>,
    skipped: &'a BTreeMap<String, usize>,
    stats: &'a OracleStats,
}

pub(crate) fn cmd_derive(args: &DeriveArgs, output: OutputFormat, quiet: bool) {
    let config = match load_config(args) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let corpus = match read_corpus_file(&args.in_amr) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("read error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let run = match run_corpus(corpus.amrs, &config) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let derivations: Vec<_> = run.derivations().collect();
    let outputs: [(&Option<PathBuf>, Vec<String>); 4] = [
        (
            &args.out_oracle,
            derivations
                .iter()
                .map(|d| writer::oracle_block(&d.tokens, &d.actions))
                .collect(),
        ),
        (
            &args.out_amr,
            derivations.iter().map(|d| writer::amr_to_jamr(&d.predicted)).collect(),
        ),
        (
            &args.out_sentences,
            derivations.iter().map(|d| writer::sentence_line(&d.tokens)).collect(),
        ),
        (
            &args.out_actions,
            derivations.iter().map(|d| writer::actions_line(&d.actions)).collect(),
        ),
    ];
    for (path, chunks) in outputs {
        let Some(path) = path else {
            continue;
        };
        if let Err(e) = write_chunks(path, chunks) {
            report_error(
                &format!("could not write '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    }

    if quiet {
        return;
    }
    let report = Report {
        derived: derivations.len(),
        failed: run.failures().collect(),
        skipped: &corpus.skipped,
        stats: &run.stats,
    };
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => print_text(&report, args.top),
    }
}

fn load_config(args: &DeriveArgs) -> Result<OracleConfig, String> {
    let mut config = match &args.config {
        Some(path) => OracleConfig::from_toml_file(path).map_err(|e| e.to_string())?,
        None => OracleConfig::default(),
    };
    if let Some(n) = args.add_unaligned {
        config.add_unaligned = n;
    }
    if args.no_entity_rules {
        config.use_entity_rules = false;
    }
    if let Some(t) = args.root_tie_break {
        config.root_tie_break = t.into();
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    Ok(config)
}

fn print_text(report: &Report<'_>, top: usize) {
    let stats = report.stats;
    let skipped: usize = report.skipped.values().sum();
    println!("Oracle Report");
    println!("=============");
    println!();
    println!(
        "  Sentences: {} derived, {} failed, {} skipped",
        report.derived,
        report.failed.len(),
        skipped
    );
    if !report.failed.is_empty() {
        println!("  Failed sentences are omitted from every output file; lines no longer match input order.");
    }
    println!("  Steps: {}", stats.steps);
    println!("  Alignment repairs: {}", stats.alignment_repairs);
    println!("  Unaligned concepts bound: {}", stats.unaligned_bound);

    if !stats.anomalies.is_empty() {
        println!();
        println!("  Anomalies:");
        for (anomaly, n) in &stats.anomalies {
            println!("    {}: {}", anomaly.name(), n);
        }
    }
    for failure in &report.failed {
        println!(
            "    sentence {} ({}): {}",
            failure.index,
            failure.id.as_deref().unwrap_or("no id"),
            failure.message
        );
    }
    for (reason, n) in report.skipped {
        println!("    skipped {}: {}", reason, n);
    }

    for kind in REPORTED_KINDS {
        let Some(counter) = stats.actions.get(&kind) else {
            continue;
        };
        println!();
        println!("  {} ({})", kind, counter.total());
        for (descriptor, n) in counter.most_common(top) {
            println!("    {:>6}  {}", n, descriptor);
        }
    }

    let lines = summary_lines(&stats.entity_rules);
    if !lines.is_empty() {
        println!();
        println!("  Entity rules:");
        for line in lines {
            println!("    {}", line);
        }
        for (fail, n) in stats.entity_rules.fails.most_common(top) {
            println!("    failed {:>4}  {}", n, fail);
        }
    }
}

