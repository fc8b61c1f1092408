use std::collections::HashSet;

use crate::model::ExerciseRecord;

/// Near-duplicate filter keyed on a truncated content signature. Collisions
/// between genuinely different records are possible and accepted.
pub struct Deduplicator {
    seen: HashSet<String>,
    dropped: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Deduplicator {
            seen: HashSet::new(),
            dropped: 0,
        }
    }

    /// True when the record is new and should be kept.
    pub fn keep(&mut self, record: &ExerciseRecord) -> bool {
        if self.seen.insert(signature(record)) {
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// First 100 chars of the body plus first 50 chars of the answer.
pub fn signature(record: &ExerciseRecord) -> String {
    format!(
        "{}_{}",
        char_prefix(&record.body, 100),
        char_prefix(&record.answer, 50)
    )
}

fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ExerciseType};

    fn record(body: &str, answer: &str) -> ExerciseRecord {
        ExerciseRecord {
            kind: ExerciseType::Calcul,
            body: body.to_string(),
            answer: answer.to_string(),
            explanation: None,
            difficulty: Difficulty::Moyen,
            tags: Vec::new(),
            options: None,
            chapter_number: 1,
            chapter_title: "Nombres entiers".to_string(),
            exercise_number: "1".to_string(),
            hints: Vec::new(),
        }
    }

    #[test]
    fn same_prefix_different_tail_is_dropped() {
        let prefix = "x".repeat(100);
        let a = record(&format!("{}AAAA", prefix), "42");
        let b = record(&format!("{}BBBB", prefix), "42");
        let mut dedup = Deduplicator::new();
        assert!(dedup.keep(&a));
        assert!(!dedup.keep(&b));
        assert_eq!(dedup.dropped(), 1);
    }

    #[test]
    fn different_answers_distinguish_records() {
        let a = record("Calculer 2+3.", "5");
        let b = record("Calculer 2+3.", "6");
        let mut dedup = Deduplicator::new();
        assert!(dedup.keep(&a));
        assert!(dedup.keep(&b));
    }

    #[test]
    fn idempotent_over_own_output() {
        let records = vec![
            record("Calculer 2+3.", "5"),
            record("Calculer 2+3.", "5"),
            record("Calculer 7-4.", "3"),
        ];
        let mut first = Deduplicator::new();
        let unique: Vec<ExerciseRecord> = records
            .into_iter()
            .filter(|r| first.keep(r))
            .collect();
        assert_eq!(first.dropped(), 1);

        let mut second = Deduplicator::new();
        let again: Vec<&ExerciseRecord> = unique.iter().filter(|r| second.keep(r)).collect();
        assert_eq!(second.dropped(), 0);
        assert_eq!(again.len(), unique.len());
    }

    #[test]
    fn prefix_is_char_based() {
        // 100 multi-byte chars must not split a codepoint.
        let body = "é".repeat(150);
        let sig = signature(&record(&body, ""));
        assert!(sig.starts_with(&"é".repeat(100)));
    }
}
