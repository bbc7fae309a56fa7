/// Collection of utilities to save results to a file/folder
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::methods::gsea::GSEAOutput;
use crate::Result;

/// Writes `output` as pretty-printed JSON.
pub fn save_gsea(path: impl AsRef<Path>, output: &GSEAOutput) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, output)?;
    writer.flush()?;
    Ok(())
}
