use std::collections::BTreeMap;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

use crate::model::{ExerciseRecord, ExerciseType};
use crate::pipeline::clean::collapse_whitespace;

static MATH_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d+\-*/=()]").unwrap());

const MATH_VERBS: &[&str] = &["calculer", "resoudre", "trouver", "determiner", "evaluer"];
const QCM_KEYS: &[&str] = &["A", "B", "C", "D"];

/// Outcome of checking one record: blocking errors and quality warnings.
#[derive(Debug, Default)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_record(record: &ExerciseRecord) -> Validation {
    let mut v = Validation::default();

    if record.body.trim().is_empty() {
        v.errors.push("exercise body is required".to_string());
    }
    if record.answer.trim().is_empty() {
        v.errors.push("answer is required".to_string());
    }

    match record.kind {
        ExerciseType::Qcm => validate_qcm(record, &mut v),
        ExerciseType::VraiFaux => validate_true_false(record, &mut v),
        ExerciseType::Calcul => validate_calculation(record, &mut v),
        ExerciseType::Libre => {}
    }

    quality_warnings(record, &mut v);
    v
}

fn validate_qcm(record: &ExerciseRecord, v: &mut Validation) {
    let Some(options) = &record.options else {
        v.errors.push("options are required for a qcm exercise".to_string());
        return;
    };

    let missing: Vec<&str> = QCM_KEYS
        .iter()
        .filter(|k| !options.contains_key(**k))
        .copied()
        .collect();
    if !missing.is_empty() {
        v.errors
            .push(format!("missing qcm options: {}", missing.join(", ")));
    }

    let answer = record.answer.trim().to_uppercase();
    if !options.contains_key(&answer) {
        v.errors
            .push(format!("answer '{}' does not name an option", record.answer));
    }

    for (key, value) in options {
        if value.trim().is_empty() {
            v.errors.push(format!("option {} is empty", key));
        }
    }
}

fn validate_true_false(record: &ExerciseRecord, v: &mut Validation) {
    let answer = record.answer.trim().to_lowercase();
    if !matches!(answer.as_str(), "vrai" | "faux" | "true" | "false") {
        v.errors
            .push("answer must be 'Vrai' or 'Faux'".to_string());
    }
}

fn validate_calculation(record: &ExerciseRecord, v: &mut Validation) {
    let body = record.body.to_lowercase();
    if !MATH_VERBS.iter().any(|verb| body.contains(verb)) {
        v.errors
            .push("a calculation body needs a math action verb".to_string());
    }
    if !MATH_CHARS_RE.is_match(&record.answer) {
        v.errors
            .push("a calculation answer needs mathematical content".to_string());
    }
}

fn quality_warnings(record: &ExerciseRecord, v: &mut Validation) {
    if record.body.len() < 10 {
        v.warnings.push("body looks too short".to_string());
    } else if record.body.len() > 500 {
        v.warnings.push("body looks very long".to_string());
    }
    match &record.explanation {
        None => v.warnings.push("no explanation provided".to_string()),
        Some(e) if e.len() < 10 => v.warnings.push("explanation looks too short".to_string()),
        _ => {}
    }
    if record.tags.is_empty() {
        v.warnings.push("no tags to categorize the exercise".to_string());
    }
}

pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub warnings: usize,
    pub issues: Vec<(usize, Validation)>,
    pub by_type: Vec<(String, usize)>,
    pub by_difficulty: Vec<(String, usize)>,
}

pub fn validate_all(records: &[ExerciseRecord]) -> ValidationReport {
    let mut valid = 0;
    let mut warnings = 0;
    let mut issues = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let v = validate_record(record);
        if v.is_valid() {
            valid += 1;
        }
        warnings += v.warnings.len();
        if !v.errors.is_empty() || !v.warnings.is_empty() {
            issues.push((i, v));
        }
    }

    let counted = |counts: BTreeMap<String, usize>| -> Vec<(String, usize)> {
        counts
            .into_iter()
            .sorted_by_key(|(_, n)| std::cmp::Reverse(*n))
            .collect()
    };
    let by_type = counted(
        records
            .iter()
            .map(|r| r.kind.as_str().to_string())
            .counts()
            .into_iter()
            .collect(),
    );
    let by_difficulty = counted(
        records
            .iter()
            .map(|r| r.difficulty.as_str().to_string())
            .counts()
            .into_iter()
            .collect(),
    );

    ValidationReport {
        total: records.len(),
        valid,
        invalid: records.len() - valid,
        warnings,
        issues,
        by_type,
        by_difficulty,
    }
}

pub fn render_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str("## Validation report\n");
    out.push_str(&format!(
        "- exercises: {} ({} valid, {} invalid)\n- warnings: {}\n",
        report.total, report.valid, report.invalid, report.warnings
    ));

    out.push_str("\n### By type\n");
    for (label, count) in &report.by_type {
        out.push_str(&format!("- {}: {}\n", label, count));
    }
    out.push_str("\n### By difficulty\n");
    for (label, count) in &report.by_difficulty {
        out.push_str(&format!("- {}: {}\n", label, count));
    }

    let with_errors: Vec<_> = report
        .issues
        .iter()
        .filter(|(_, v)| !v.errors.is_empty())
        .collect();
    if !with_errors.is_empty() {
        out.push_str("\n### Errors\n");
        for (idx, v) in with_errors {
            for error in &v.errors {
                out.push_str(&format!("- exercise #{}: {}\n", idx + 1, error));
            }
        }
    }
    out
}

/// Best-effort cleanup of recurring import problems: stray whitespace,
/// unnormalized vrai-faux answers, missing tags.
pub fn fix_common_issues(records: Vec<ExerciseRecord>) -> Vec<ExerciseRecord> {
    records
        .into_iter()
        .map(|mut record| {
            record.body = collapse_whitespace(&record.body);
            record.answer = collapse_whitespace(&record.answer);
            if let Some(explanation) = record.explanation.take() {
                let cleaned = collapse_whitespace(&explanation);
                record.explanation = (!cleaned.is_empty()).then_some(cleaned);
            }

            if record.kind == ExerciseType::VraiFaux {
                let lower = record.answer.to_lowercase();
                if lower.contains("vrai") || lower.contains("true") {
                    record.answer = "Vrai".to_string();
                } else if lower.contains("faux") || lower.contains("false") {
                    record.answer = "Faux".to_string();
                }
            }

            if record.tags.is_empty() {
                record.tags = vec!["imported".to_string()];
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use std::collections::BTreeMap;

    fn base() -> ExerciseRecord {
        ExerciseRecord {
            kind: ExerciseType::Calcul,
            body: "Calculer la somme de 125 et 78.".to_string(),
            answer: "203".to_string(),
            explanation: Some("On pose l'addition en colonnes.".to_string()),
            difficulty: Difficulty::Moyen,
            tags: vec!["6eme".to_string()],
            options: None,
            chapter_number: 1,
            chapter_title: "Nombres entiers".to_string(),
            exercise_number: "2".to_string(),
            hints: Vec::new(),
        }
    }

    #[test]
    fn valid_calculation_passes() {
        let v = validate_record(&base());
        assert!(v.is_valid(), "{:?}", v.errors);
    }

    #[test]
    fn qcm_answer_must_name_an_option() {
        let mut record = base();
        record.kind = ExerciseType::Qcm;
        record.answer = "E".to_string();
        record.options = Some(BTreeMap::from([
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
            ("C".to_string(), "3".to_string()),
            ("D".to_string(), "4".to_string()),
        ]));
        let v = validate_record(&record);
        assert!(v.errors.iter().any(|e| e.contains("does not name an option")));
    }

    #[test]
    fn qcm_without_options_is_invalid() {
        let mut record = base();
        record.kind = ExerciseType::Qcm;
        let v = validate_record(&record);
        assert!(!v.is_valid());
    }

    #[test]
    fn true_false_answer_normalized_by_fix() {
        let mut record = base();
        record.kind = ExerciseType::VraiFaux;
        record.answer = "  c'est VRAI  ".to_string();
        let fixed = fix_common_issues(vec![record]);
        assert_eq!(fixed[0].answer, "Vrai");
        assert!(validate_record(&fixed[0]).is_valid());
    }

    #[test]
    fn calculation_without_verb_flagged() {
        let mut record = base();
        record.body = "Quel beau dessin de triangle.".to_string();
        let v = validate_record(&record);
        assert!(v.errors.iter().any(|e| e.contains("math action verb")));
    }

    #[test]
    fn report_counts_types() {
        let mut qcm = base();
        qcm.kind = ExerciseType::Qcm;
        qcm.options = Some(BTreeMap::from([
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
            ("C".to_string(), "3".to_string()),
            ("D".to_string(), "4".to_string()),
        ]));
        qcm.answer = "A".to_string();
        let report = validate_all(&[base(), base(), qcm]);
        assert_eq!(report.total, 3);
        assert_eq!(report.invalid, 0);
        assert_eq!(report.by_type[0], ("calcul".to_string(), 2));
    }
}
