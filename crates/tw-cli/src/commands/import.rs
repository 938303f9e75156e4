//! Import command replacing all stored data with a bundle.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tw_core::{Bundle, ImportSummary};
use tw_db::Database;

/// Reads a bundle from `source` (`-` means stdin) and imports it.
pub fn run(db: &mut Database, source: &Path) -> Result<ImportSummary> {
    let text = if source == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read bundle from stdin")?;
        text
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("failed to read {}", source.display()))?
    };
    import_text(db, &text)
}

fn import_text(db: &mut Database, text: &str) -> Result<ImportSummary> {
    let bundle = Bundle::from_json(text)?;
    let summary = db.import_bundle(&bundle).context("bundle rejected")?;
    Ok(summary)
}
