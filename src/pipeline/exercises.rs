use std::sync::LazyLock;

use regex::Regex;

// Header patterns, tried as independent passes in this order. Passes can
// slice overlapping blocks out of the same span; the deduplicator settles
// that later.
static EXERCICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)exercice\s+(\d{1,3})\s*[:.]?").unwrap());
static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d{1,3})[.)]\s+").unwrap());
static QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)question\s+(\d{1,3})\s*[:.]?").unwrap());

/// Raw exercise text sliced out of a chapter span, before classification.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub number: String,
    pub content: String,
}

/// Find exercise blocks within one chapter span. Each header match owns the
/// text up to the next header of the same pattern (or the end of the span).
/// Blocks at or under `min_len` characters are dropped as noise. Returns an
/// empty vec when nothing matches.
pub fn segment(span: &str, min_len: usize) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    for re in [&*EXERCICE_RE, &*BARE_RE, &*QUESTION_RE] {
        collect_pass(re, span, min_len, &mut blocks);
    }
    blocks
}

fn collect_pass(re: &Regex, span: &str, min_len: usize, out: &mut Vec<RawBlock>) {
    let headers: Vec<(usize, usize, String)> = re
        .captures_iter(span)
        .map(|caps| {
            let m = caps.get(0).unwrap();
            (m.start(), m.end(), caps[1].to_string())
        })
        .collect();

    for (i, (_, end, number)) in headers.iter().enumerate() {
        let content_end = headers.get(i + 1).map(|h| h.0).unwrap_or(span.len());
        let content = span[*end..content_end].trim();
        if content.chars().count() <= min_len {
            continue;
        }
        out.push(RawBlock {
            number: number.clone(),
            content: content.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_exercise_headers() {
        let span = "Exercice 1: Calculer la somme de 12 et 15.\n\
                    Exercice 2: Poser la multiplication 23 x 4 puis verifier.";
        let blocks = segment(span, 20);
        let numbered: Vec<&str> = blocks.iter().map(|b| b.number.as_str()).collect();
        assert!(numbered.contains(&"1"));
        assert!(numbered.contains(&"2"));
        let first = blocks.iter().find(|b| b.number == "1").unwrap();
        assert!(first.content.starts_with("Calculer la somme"));
        assert!(!first.content.contains("Exercice 2"));
    }

    #[test]
    fn short_blocks_discarded() {
        let span = "Exercice 1: 2+2=4\nExercice 2: Tracer un segment de 5 cm puis mesurer sa moitie.";
        let blocks = segment(span, 20);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].number, "2");
    }

    #[test]
    fn question_headers_recognized() {
        let span = "Question 4: Quel est le perimetre d'un carre de cote 3 cm ?";
        let blocks = segment(span, 20);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].number, "4");
    }

    #[test]
    fn overlapping_passes_may_duplicate() {
        // "Exercice N" and a bare "N." list both match; duplicates are
        // accepted here and resolved by the deduplicator downstream.
        let span = "Exercice 7: Entourer les multiples de 3 dans la liste suivante.\n\
                    7. Entourer les multiples de 3 dans la liste suivante.";
        let blocks = segment(span, 20);
        assert!(blocks.len() >= 2);
    }

    #[test]
    fn no_headers_no_blocks() {
        assert!(segment("rien d'interessant ici", 20).is_empty());
    }
}
