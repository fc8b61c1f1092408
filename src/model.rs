use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Answer placeholder used when nothing extractable was found.
pub const ANSWER_PLACEHOLDER: &str = "A completer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExerciseType {
    #[serde(rename = "qcm")]
    Qcm,
    #[default]
    #[serde(rename = "libre")]
    Libre,
    #[serde(rename = "vrai-faux")]
    VraiFaux,
    #[serde(rename = "calcul")]
    Calcul,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Qcm => "qcm",
            ExerciseType::Libre => "libre",
            ExerciseType::VraiFaux => "vrai-faux",
            ExerciseType::Calcul => "calcul",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Facile,
    #[default]
    Moyen,
    Difficile,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Facile => "facile",
            Difficulty::Moyen => "moyen",
            Difficulty::Difficile => "difficile",
        }
    }

    /// Points awarded in the app, derived from difficulty.
    pub fn points(&self) -> i64 {
        match self {
            Difficulty::Facile => 10,
            Difficulty::Moyen => 15,
            Difficulty::Difficile => 20,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A curriculum unit detected in (or assigned to) the source document.
/// `position` is a character offset into the cleaned text, used only to
/// slice the document into per-chapter spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub position: usize,
}

/// One normalized exercise, immutable once formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    #[serde(rename = "type", default)]
    pub kind: ExerciseType,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Present and non-empty only for qcm records.
    #[serde(default)]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default = "default_chapter_number")]
    pub chapter_number: u32,
    #[serde(default)]
    pub chapter_title: String,
    #[serde(default)]
    pub exercise_number: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

fn default_chapter_number() -> u32 {
    1
}

/// One app course per curriculum chapter, created idempotently
/// (looked up by title + grade before insert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub title: String,
    pub grade: String,
    pub chapter_label: String,
    pub description: String,
    pub order_num: u32,
}

impl Course {
    pub fn for_chapter(number: u32, title: &str, grade: &str) -> Course {
        Course {
            title: title.to_string(),
            grade: grade.to_string(),
            chapter_label: format!("Chapitre {}", number),
            description: format!(
                "Chapitre {} du manuel de mathematiques {}",
                number, grade
            ),
            order_num: number,
        }
    }
}
