//! Input discovery: turn CLI paths into the `(identifier, text)` pairs the
//! parser consumes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{bail, Context, Result};
use walkdir::WalkDir;

fn walk(dir: &Path, suffix: &str, found: &mut BTreeSet<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to search directory {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(|n| n.ends_with(suffix))
        {
            found.insert(entry.into_path());
        }
    }
    Ok(())
}

/// Expand `inputs` into report files.
///
/// Files are taken as given; directories are searched recursively for
/// names ending in `suffix`. The result is de-duplicated and sorted.
pub fn discover_inputs(inputs: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            walk(input, suffix, &mut found)?;
        } else if input.is_file() {
            found.insert(input.clone());
        } else {
            bail!("Input path does not exist: {}", input.display());
        }
    }
    log::info!("Found {} report files", found.len());
    Ok(found.into_iter().collect())
}

/// Read every file into memory. Invalid UTF-8 is replaced, not rejected.
pub fn read_inputs(paths: &[PathBuf]) -> Result<Vec<(String, String)>> {
    paths
        .iter()
        .map(|path| {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read report {}", path.display()))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok((path.display().to_string(), text))
        })
        .collect()
}
