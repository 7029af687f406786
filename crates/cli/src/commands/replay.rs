use std::path::Path;
use std::process;

use amr_oracle_core::{read_oracle_file, replay, writer};

use super::write_chunks;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_replay(
    in_oracle: &Path,
    out_amr: Option<&Path>,
    use_entity_rules: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let blocks = match read_oracle_file(in_oracle) {
        Ok(b) => b,
        Err(e) => {
            report_error(&format!("read error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let mut graphs = Vec::new();
    let mut failed = 0usize;
    for (i, result) in replay(&blocks, use_entity_rules).into_iter().enumerate() {
        match result {
            Ok(amr) => graphs.push(writer::amr_to_jamr(&amr)),
            Err(e) => {
                report_error(&format!("trace {}: {}", i + 1, e), output, quiet);
                failed += 1;
            }
        }
    }

    match out_amr {
        Some(path) => {
            if let Err(e) = write_chunks(path, graphs) {
                report_error(
                    &format!("could not write '{}': {}", path.display(), e),
                    output,
                    quiet,
                );
                process::exit(1);
            }
        }
        None => {
            for graph in &graphs {
                print!("{}", graph);
            }
        }
    }

    if failed > 0 {
        process::exit(1);
    }
}
