use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::objects::Object;
use crate::store::{ApplyResult, FileStore};
use crate::ui;

pub fn run(ctx: &Context, files: &[PathBuf]) -> Result<()> {
    let (_settings, store) = super::open(ctx)?;

    let mut paths = Vec::new();
    for path in files {
        paths.extend(expand(path)?);
    }
    if paths.is_empty() {
        bail!("No TOML files found");
    }

    let mut failed = 0;
    for path in &paths {
        match apply_file(&store, path) {
            Ok((object, result)) => {
                if !ctx.quiet || result != ApplyResult::Unchanged {
                    let mark = match result {
                        ApplyResult::Unchanged => "·".dimmed(),
                        _ => "✓".green(),
                    };
                    println!("  {mark} {object} {}", result.as_str());
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("{}: {e:#}", path.display()));
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} objects could not be applied", paths.len());
    }
    Ok(())
}

fn apply_file(store: &FileStore, path: &Path) -> Result<(String, ApplyResult)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let object = Object::parse(&content)?;
    let name = object.to_string();
    let result = store.apply(object)?;
    Ok((name, result))
}

/// A file as-is, or the `*.toml` files of a directory in name order
fn expand(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("Could not read {}", path.display()))? {
        let file = entry?.path();
        if file.is_file() && file.extension().is_some_and(|ext| ext == "toml") {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}
