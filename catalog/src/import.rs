use anyhow::{bail, Context, Result};
use materials_core::{next_id, MaterialId, MaterialRecord, NewMaterial};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect `.json`/`.jsonl` files under `input` (or `input` itself), sorted for a stable id order.
pub fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_jsonl(file: &Path, out: &mut Vec<NewMaterial>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: NewMaterial = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        out.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<NewMaterial>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                out.push(serde_json::from_value(v).with_context(|| format!("in {}", file.display()))?);
            }
        }
        serde_json::Value::Object(_) => {
            out.push(serde_json::from_value(json).with_context(|| format!("in {}", file.display()))?);
        }
        _ => tracing::warn!(file = %file.display(), "skipping file without material objects"),
    }
    Ok(())
}

pub fn read_drafts(files: &[PathBuf]) -> Result<Vec<NewMaterial>> {
    let mut drafts = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut drafts)?;
        } else {
            read_json(file, &mut drafts)?;
        }
    }
    Ok(drafts)
}

/// Validate drafts and assign ids. Explicit ids are kept and must be unique;
/// the rest are numbered after the largest explicit id, in input order.
pub fn into_records(drafts: Vec<NewMaterial>) -> Result<Vec<MaterialRecord>> {
    let mut seen: HashSet<MaterialId> = HashSet::new();
    for id in drafts.iter().filter_map(|d| d.id) {
        if !seen.insert(id) {
            bail!("duplicate material id {id}");
        }
    }
    let mut next = next_id(seen.iter().copied());

    let mut records = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let id = match draft.id {
            Some(id) => id,
            None => {
                let Some(id) = next else {
                    bail!("no material ids left after {}", MaterialId::MAX);
                };
                next = id.checked_add(1);
                id
            }
        };
        let name = draft.name.clone();
        records.push(draft.into_record(id).with_context(|| format!("material {id} ({name})"))?);
    }
    Ok(records)
}
