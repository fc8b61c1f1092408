use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

/// Text pulled out of a PDF, with the original page count.
pub struct PdfText {
    pub text: String,
    pub pages: usize,
}

/// Extract the text layer of a PDF (no OCR; image-only documents come back
/// empty). Pages are split on form feeds and rejoined with page markers so
/// downstream heuristics can report positions that mean something to a
/// human leafing through the manual.
pub fn extract(path: &Path) -> Result<PdfText> {
    let raw = pdf_extract::extract_text(path)
        .with_context(|| format!("failed to extract text from {:?}", path))?;

    if raw.trim().is_empty() {
        warn!(path = ?path, "PDF has no extractable text layer");
    }

    let pages: Vec<&str> = raw.split('\x0C').collect();
    let mut text = String::with_capacity(raw.len() + pages.len() * 16);
    for (i, page) in pages.iter().enumerate() {
        let trimmed = page.trim();
        if trimmed.is_empty() {
            continue;
        }
        text.push_str(&format!("\n--- PAGE {} ---\n{}\n", i + 1, trimmed));
    }

    Ok(PdfText {
        text,
        pages: pages.len(),
    })
}
