pub(crate) mod derive;
pub(crate) mod replay;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

/// Write `chunks` to `path`, one after another.
pub(crate) fn write_chunks<I>(path: &Path, chunks: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = String>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let mut written = 0usize;
    for chunk in chunks {
        out.write_all(chunk.as_bytes())?;
        written += 1;
    }
    out.flush()?;
    info!("wrote {} record(s) to {}", written, path.display());
    Ok(())
}
