pub mod chapters;
pub mod clean;
pub mod dedup;
pub mod exercises;
pub mod format;

use crate::model::{Chapter, ExerciseRecord};
use self::chapters::ChapterPatternSet;
use self::dedup::Deduplicator;

/// Knobs shared by every extraction variant.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub clean_accents: bool,
    pub chapter_patterns: ChapterPatternSet,
    pub min_block_len: usize,
    pub grade: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            clean_accents: true,
            chapter_patterns: ChapterPatternSet::default(),
            min_block_len: 20,
            grade: "6eme".to_string(),
        }
    }
}

pub struct ChapterExtraction {
    pub chapter: Chapter,
    pub records: Vec<ExerciseRecord>,
}

pub struct Extraction {
    pub per_chapter: Vec<ChapterExtraction>,
    pub duplicates_dropped: usize,
}

impl Extraction {
    pub fn chapters(&self) -> Vec<&Chapter> {
        self.per_chapter.iter().map(|c| &c.chapter).collect()
    }

    pub fn total_records(&self) -> usize {
        self.per_chapter.iter().map(|c| c.records.len()).sum()
    }

    pub fn all_records(&self) -> impl Iterator<Item = &ExerciseRecord> {
        self.per_chapter.iter().flat_map(|c| c.records.iter())
    }
}

/// Four-pass pipeline: cleaned text → chapters → raw blocks → records,
/// deduplicated across the whole document.
pub fn run(raw_text: &str, opts: &PipelineOptions) -> Extraction {
    let text = if opts.clean_accents {
        clean::fold_accents(raw_text)
    } else {
        raw_text.to_string()
    };

    let chapter_list = chapters::segment(&text, opts.chapter_patterns);
    let mut dedup = Deduplicator::new();
    let mut per_chapter = Vec::with_capacity(chapter_list.len());

    for idx in 0..chapter_list.len() {
        let chapter = &chapter_list[idx];
        let span = chapters::chapter_span(&text, &chapter_list, idx);
        let records: Vec<ExerciseRecord> = exercises::segment(span, opts.min_block_len)
            .iter()
            .filter_map(|block| format::format_block(block, chapter, &opts.grade))
            .filter(|record| dedup.keep(record))
            .collect();
        per_chapter.push(ChapterExtraction {
            chapter: chapter.clone(),
            records,
        });
    }

    Extraction {
        per_chapter,
        duplicates_dropped: dedup.dropped(),
    }
}
