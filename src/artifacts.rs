use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::{Chapter, ExerciseRecord};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::Extraction;

/// Summary written alongside the per-chapter exercise files.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_chapters: usize,
    pub total_exercises: usize,
    pub duplicates_dropped: usize,
    pub exercises_by_chapter: BTreeMap<String, usize>,
    pub chapters: Vec<Chapter>,
}

/// Write the extraction to `dir`: one `chapitre_N_exercices.json` per
/// non-empty chapter, the chapter list, and a run summary.
pub fn save_extraction(dir: &Path, grade: &str, extraction: &Extraction) -> Result<ExtractionSummary> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {:?}", dir))?;

    let chapters: Vec<Chapter> = extraction
        .per_chapter
        .iter()
        .map(|c| c.chapter.clone())
        .collect();
    write_json(&dir.join(format!("chapitres_{}.json", grade)), &chapters)?;

    let mut by_chapter = BTreeMap::new();
    for entry in &extraction.per_chapter {
        let key = format!("chapitre_{}", entry.chapter.number);
        by_chapter.insert(key.clone(), entry.records.len());
        if entry.records.is_empty() {
            continue;
        }
        write_json(&dir.join(format!("{}_exercices.json", key)), &entry.records)?;
    }

    let summary = ExtractionSummary {
        total_chapters: chapters.len(),
        total_exercises: extraction.total_records(),
        duplicates_dropped: extraction.duplicates_dropped,
        exercises_by_chapter: by_chapter,
        chapters,
    };
    write_json(&dir.join("resume_extraction.json"), &summary)?;
    Ok(summary)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

/// Load one exercise file. A single object where an array was expected is
/// tolerated and wrapped.
pub fn load_exercises(path: &Path) -> Result<Vec<ExerciseRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("file not found: {:?}", path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("JSON parse error in {:?}", path))?;
    let records = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(records)
}

/// Expand each input into exercise files: a file stands for itself, a
/// directory for its `*_exercices.json` members (sorted for stable order).
pub fn resolve_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut members: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("cannot read directory {:?}", input))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with("_exercices.json"))
                })
                .collect();
            members.sort();
            files.extend(members);
        } else {
            files.push(input.clone());
        }
    }
    anyhow::ensure!(!files.is_empty(), "no exercise files found in the given inputs");
    Ok(files)
}

/// Load several files with cross-file deduplication, reporting per file.
pub fn load_all(files: &[PathBuf]) -> Result<Vec<ExerciseRecord>> {
    let mut dedup = Deduplicator::new();
    let mut all = Vec::new();
    for file in files {
        match load_exercises(file) {
            Ok(records) => {
                let before = dedup.dropped();
                let kept: Vec<ExerciseRecord> =
                    records.into_iter().filter(|r| dedup.keep(r)).collect();
                println!(
                    "  {}: {} exercises ({} duplicates skipped)",
                    file.display(),
                    kept.len(),
                    dedup.dropped() - before
                );
                all.extend(kept);
            }
            Err(err) => {
                // Unreadable member of a batch is fatal only when nothing loads at all.
                warn!(file = ?file, error = %err, "skipping unreadable input");
            }
        }
    }
    anyhow::ensure!(!all.is_empty(), "no exercises loaded");
    println!(
        "Loaded {} unique exercises ({} duplicates dropped)\n",
        all.len(),
        dedup.dropped()
    );
    Ok(all)
}
