use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::clean::collapse_whitespace;
use crate::model::Chapter;

// Heading patterns, most specific first. The generic pattern is line-anchored
// so exercise headers ("Exercice 3: ...") inside a chapter body do not
// register as chapters of their own.
static HEADED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chapitre\s+(\d{1,3})[:.\s]+([^\n]+)").unwrap());
static GENERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d{1,2})[:.]\s+([^\n]+)").unwrap());
static TITLE_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s\-]").unwrap());

/// Which heading patterns the segmenter tries, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChapterPatternSet {
    /// Only "Chapitre N: Titre" headings.
    Headed,
    /// "Chapitre N: Titre" first, then bare "N: Titre" line starts.
    #[default]
    Extended,
}

impl ChapterPatternSet {
    fn patterns(&self) -> Vec<&'static Regex> {
        match self {
            ChapterPatternSet::Headed => vec![&HEADED_RE],
            ChapterPatternSet::Extended => vec![&HEADED_RE, &GENERIC_RE],
        }
    }
}

impl FromStr for ChapterPatternSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "headed" => Ok(ChapterPatternSet::Headed),
            "extended" => Ok(ChapterPatternSet::Extended),
            other => anyhow::bail!("unknown chapter pattern set: {}", other),
        }
    }
}

/// Scan the whole document for chapter headings. Always returns at least one
/// chapter: when nothing survives filtering, the fixed grade-6 curriculum
/// list stands in with synthetic offsets.
pub fn segment(text: &str, set: ChapterPatternSet) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();

    for re in set.patterns() {
        for caps in re.captures_iter(text) {
            let number: u32 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let title = clean_title(&caps[2]);
            if title.len() <= 3 {
                continue;
            }
            if chapters.iter().any(|c| c.title == title) {
                continue;
            }
            chapters.push(Chapter {
                number,
                title,
                position: caps.get(0).unwrap().start(),
            });
        }
    }

    // Offset order drives slicing, not numeric chapter order.
    chapters.sort_by_key(|c| c.position);

    if chapters.is_empty() {
        return fallback_chapters();
    }
    chapters
}

fn clean_title(raw: &str) -> String {
    let stripped = TITLE_NOISE_RE.replace_all(raw, "");
    collapse_whitespace(&stripped)
}

/// Fixed grade-6 curriculum topics used when no heading is detected.
/// Synthetic evenly-spaced offsets keep the exercise segmenter working.
pub fn fallback_chapters() -> Vec<Chapter> {
    const THEMES: &[&str] = &[
        "Nombres entiers et decimaux",
        "Operations sur les nombres",
        "Fractions",
        "Proportionnalite",
        "Geometrie - Droites et angles",
        "Geometrie - Triangles et quadrilateres",
        "Perimetres et aires",
        "Statistiques et probabilites",
    ];
    THEMES
        .iter()
        .enumerate()
        .map(|(i, title)| Chapter {
            number: (i + 1) as u32,
            title: (*title).to_string(),
            position: (i + 1) * 1000,
        })
        .collect()
}

/// Text span owned by `chapters[idx]`: from its offset to the next chapter's
/// offset, or the end of the document. Offsets are clamped to char
/// boundaries since synthetic fallback positions can land anywhere.
pub fn chapter_span<'a>(text: &'a str, chapters: &[Chapter], idx: usize) -> &'a str {
    let start = chapters[idx].position.min(text.len());
    let end = chapters
        .get(idx + 1)
        .map(|c| c.position)
        .unwrap_or(text.len())
        .min(text.len());
    if start >= end {
        return "";
    }
    &text[floor_boundary(text, start)..floor_boundary(text, end)]
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headed_chapters_detected_and_sorted() {
        let text = "Chapitre 2: Nombres decimaux\nblabla\nChapitre 1: Nombres entiers\n";
        let chapters = segment(text, ChapterPatternSet::Headed);
        assert_eq!(chapters.len(), 2);
        // Sorted by offset, so chapter 2 (earlier in text) comes first.
        assert_eq!(chapters[0].number, 2);
        assert_eq!(chapters[0].title, "Nombres decimaux");
        assert_eq!(chapters[1].title, "Nombres entiers");
        assert!(chapters[0].position < chapters[1].position);
    }

    #[test]
    fn titles_are_cleaned_and_deduplicated() {
        let text = "Chapitre 1 : Les fractions !!!\nChapitre 4: Les fractions\n";
        let chapters = segment(text, ChapterPatternSet::Headed);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Les fractions");
    }

    #[test]
    fn short_titles_rejected() {
        let text = "Chapitre 1: Ab\nChapitre 2: Geometrie plane\n";
        let chapters = segment(text, ChapterPatternSet::Headed);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Geometrie plane");
    }

    #[test]
    fn generic_pattern_only_matches_line_starts() {
        let text = "Intro. Exercice 12: Calculer 5+5\n3: Proportionnalite et pourcentages\n";
        let chapters = segment(text, ChapterPatternSet::Extended);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 3);
    }

    #[test]
    fn fallback_when_nothing_matches() {
        // A long document with no heading-shaped line anywhere.
        let text = "du texte sans aucune structure reconnaissable\n".repeat(400);
        let chapters = segment(&text, ChapterPatternSet::Extended);
        assert_eq!(chapters.len(), 8);
        for (i, chapter) in chapters.iter().enumerate() {
            assert_eq!(chapter.number, (i + 1) as u32);
            assert_eq!(chapter.position, (i + 1) * 1000);
        }
    }

    #[test]
    fn spans_partition_the_text() {
        let text = "Chapitre 1: Nombres entiers\nAAAA\nChapitre 2: Fractions simples\nBBBB\n";
        let chapters = segment(text, ChapterPatternSet::Headed);
        let first = chapter_span(text, &chapters, 0);
        let second = chapter_span(text, &chapters, 1);
        assert!(first.contains("AAAA"));
        assert!(!first.contains("BBBB"));
        assert!(second.contains("BBBB"));
    }

    #[test]
    fn span_offsets_clamped_to_char_boundaries() {
        // Three-byte chars put the synthetic 1000/2000 offsets mid-codepoint;
        // slicing must clamp instead of panicking.
        let text = "€".repeat(2000);
        let chapters = fallback_chapters();
        for idx in 0..chapters.len() {
            let _ = chapter_span(&text, &chapters, idx);
        }
    }
}
