use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::clean::collapse_whitespace;
use super::exercises::RawBlock;
use crate::model::{Chapter, Difficulty, ExerciseRecord, ExerciseType, ANSWER_PLACEHOLDER};

/// Bodies shorter than this are rejected outright.
const MIN_BODY_LEN: usize = 10;

struct TypeRule {
    kind: ExerciseType,
    markers: &'static [&'static str],
}

// Priority-ordered: the first rule with a marker hit wins, everything else
// falls through to `libre`.
const TYPE_RULES: &[TypeRule] = &[
    TypeRule {
        kind: ExerciseType::Qcm,
        markers: &["a)", "b)", "c)", "d)", "choisir", "selectionner"],
    },
    TypeRule {
        kind: ExerciseType::VraiFaux,
        markers: &["vrai", "faux", "correct", "incorrect"],
    },
    TypeRule {
        kind: ExerciseType::Calcul,
        markers: &["calculer", "resoudre", "trouver", "determiner"],
    },
];

const EASY_MARKERS: &[&str] = &["simple", "facile", "basique", "direct"];
const HARD_MARKERS: &[&str] = &["complexe", "difficile", "complique", "demonstration"];

/// One labeled answer pattern; matchers are tried in declaration order and
/// the first that matches anywhere in the block wins.
pub struct AnswerMatcher {
    pub label: &'static str,
    re: Regex,
}

static ANSWER_MATCHERS: LazyLock<Vec<AnswerMatcher>> = LazyLock::new(|| {
    [
        ("reponse", r"(?i)reponse[:\s]+([^\n]+)"),
        ("solution", r"(?i)solution[:\s]+([^\n]+)"),
        ("resultat", r"(?i)resultat[:\s]+([^\n]+)"),
        ("equals", r"=\s*([^\n]+)"),
    ]
    .into_iter()
    .map(|(label, pattern)| AnswerMatcher {
        label,
        re: Regex::new(pattern).unwrap(),
    })
    .collect()
});

static OPTION_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-D])\)\s*").unwrap());

pub fn detect_type(text: &str) -> ExerciseType {
    let lower = text.to_lowercase();
    for rule in TYPE_RULES {
        if rule.markers.iter().any(|m| lower.contains(m)) {
            return rule.kind;
        }
    }
    ExerciseType::Libre
}

/// Result of splitting a block into question body and extracted answer.
pub struct AnswerSplit {
    pub body: String,
    pub answer: Option<String>,
}

/// Try the labeled matchers in order; on the first hit, the capture becomes
/// the answer and everything before the match start becomes the body. No hit
/// leaves the whole block as the body.
pub fn split_answer(text: &str) -> AnswerSplit {
    for matcher in ANSWER_MATCHERS.iter() {
        if let Some(caps) = matcher.re.captures(text) {
            let m = caps.get(0).unwrap();
            tracing::debug!(matcher = matcher.label, "answer pattern matched");
            return AnswerSplit {
                body: text[..m.start()].trim().to_string(),
                answer: Some(caps[1].trim().to_string()),
            };
        }
    }
    AnswerSplit {
        body: text.trim().to_string(),
        answer: None,
    }
}

/// Extract "A) ..." lettered options from the question body. Each option's
/// text runs to the next letter marker. Empty values are dropped; an empty
/// map disqualifies the block from being qcm-shaped, so None is returned.
pub fn extract_options(body: &str) -> Option<BTreeMap<String, String>> {
    let markers: Vec<(usize, usize, String)> = OPTION_LETTER_RE
        .captures_iter(body)
        .map(|caps| {
            let m = caps.get(0).unwrap();
            (m.start(), m.end(), caps[1].to_string())
        })
        .collect();

    let mut options = BTreeMap::new();
    for (i, (_, end, letter)) in markers.iter().enumerate() {
        let value_end = markers.get(i + 1).map(|m| m.0).unwrap_or(body.len());
        let value = body[*end..value_end].trim();
        if !value.is_empty() {
            options.insert(letter.clone(), value.to_string());
        }
    }

    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

pub fn estimate_difficulty(text: &str) -> Difficulty {
    let lower = text.to_lowercase();
    if EASY_MARKERS.iter().any(|m| lower.contains(m)) {
        Difficulty::Facile
    } else if HARD_MARKERS.iter().any(|m| lower.contains(m)) {
        Difficulty::Difficile
    } else {
        Difficulty::Moyen
    }
}

/// Turn one raw block into a normalized record, or None when the body is too
/// short to be a usable exercise.
pub fn format_block(block: &RawBlock, chapter: &Chapter, grade: &str) -> Option<ExerciseRecord> {
    let content = collapse_whitespace(&block.content);

    let kind = detect_type(&content);
    let split = split_answer(&content);

    if split.body.len() < MIN_BODY_LEN {
        return None;
    }

    let options = if kind == ExerciseType::Qcm {
        extract_options(&split.body)
    } else {
        None
    };

    Some(ExerciseRecord {
        kind,
        answer: split.answer.unwrap_or_else(|| ANSWER_PLACEHOLDER.to_string()),
        difficulty: estimate_difficulty(&content),
        tags: vec![
            grade.to_string(),
            format!("chapitre_{}", chapter.number),
            chapter.title.to_lowercase().replace(' ', "_"),
            kind.as_str().to_string(),
        ],
        options,
        body: split.body,
        explanation: None,
        chapter_number: chapter.number,
        chapter_title: chapter.title.clone(),
        exercise_number: block.number.clone(),
        hints: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter() -> Chapter {
        Chapter {
            number: 3,
            title: "Operations sur les nombres".to_string(),
            position: 0,
        }
    }

    fn block(content: &str) -> RawBlock {
        RawBlock {
            number: "3".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn calcul_scenario() {
        let rec = format_block(
            &block("Exercice 3: Calculer 2+3. Reponse: 5"),
            &chapter(),
            "6eme",
        )
        .unwrap();
        assert_eq!(rec.kind, ExerciseType::Calcul);
        assert_eq!(rec.body, "Exercice 3: Calculer 2+3.");
        assert_eq!(rec.answer, "5");
        assert!(rec.options.is_none());
    }

    #[test]
    fn qcm_scenario() {
        let rec = format_block(
            &block("A) 4 B) 5 C) 6 D) 7 Reponse: B"),
            &chapter(),
            "6eme",
        )
        .unwrap();
        assert_eq!(rec.kind, ExerciseType::Qcm);
        assert_eq!(rec.answer, "B");
        let options = rec.options.unwrap();
        assert_eq!(options.get("A").map(String::as_str), Some("4"));
        assert_eq!(options.get("B").map(String::as_str), Some("5"));
        assert_eq!(options.get("C").map(String::as_str), Some("6"));
        assert_eq!(options.get("D").map(String::as_str), Some("7"));
        for value in options.values() {
            assert!(!value.trim().is_empty());
            assert_eq!(value, value.trim());
        }
    }

    #[test]
    fn type_priority_is_qcm_first() {
        // Contains both a qcm marker and a calculation verb.
        assert_eq!(
            detect_type("Calculer puis choisir: a) 10 b) 12"),
            ExerciseType::Qcm
        );
        assert_eq!(
            detect_type("Vrai ou faux: trouver l'intrus"),
            ExerciseType::VraiFaux
        );
    }

    #[test]
    fn answer_matchers_in_order() {
        // "Reponse" wins over "=" even though "=" appears earlier in the text.
        let split = split_answer("Calculer 4 = 2+2. Reponse: 4");
        assert_eq!(split.answer.as_deref(), Some("4"));
        assert_eq!(split.body, "Calculer 4 = 2+2.");
    }

    #[test]
    fn placeholder_when_no_answer() {
        let rec = format_block(
            &block("Expliquer pourquoi un carre est aussi un losange."),
            &chapter(),
            "6eme",
        )
        .unwrap();
        assert_eq!(rec.answer, ANSWER_PLACEHOLDER);
    }

    #[test]
    fn short_body_rejected() {
        assert!(format_block(&block("Reponse: 5"), &chapter(), "6eme").is_none());
        assert!(format_block(&block("abc"), &chapter(), "6eme").is_none());
    }

    #[test]
    fn difficulty_markers() {
        assert_eq!(
            estimate_difficulty("Un calcul simple pour commencer"),
            Difficulty::Facile
        );
        assert_eq!(
            estimate_difficulty("Demonstration complete exigee"),
            Difficulty::Difficile
        );
        assert_eq!(estimate_difficulty("Calculer 12 x 3"), Difficulty::Moyen);
    }

    #[test]
    fn tags_carry_grade_chapter_and_type() {
        let rec = format_block(
            &block("Calculer le produit de 12 par 11. Reponse: 132"),
            &chapter(),
            "6eme",
        )
        .unwrap();
        assert_eq!(
            rec.tags,
            vec![
                "6eme".to_string(),
                "chapitre_3".to_string(),
                "operations_sur_les_nombres".to_string(),
                "calcul".to_string(),
            ]
        );
    }
}
