pub mod rest;
pub mod sqlfile;
pub mod sqlite;

use std::collections::BTreeMap;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::warn;

use crate::model::{Course, ExerciseRecord};

/// Sink failures fall into two classes with different blast radius: an
/// unavailable backend kills the run, a rejected record only dents the
/// summary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("record rejected: {0}")]
    Rejected(String),
}

/// A destination for courses and exercises. The pipeline never cares which
/// one it talks to; direct DB writes, generated SQL and REST calls are
/// interchangeable.
pub trait ExerciseSink {
    fn name(&self) -> &'static str;

    /// Look the course up (by title + grade) and create it if missing.
    /// Returns the backend's identifier for it.
    fn ensure_course(&mut self, course: &Course) -> Result<String, SinkError>;

    fn insert_exercise(
        &mut self,
        course_id: &str,
        record: &ExerciseRecord,
    ) -> Result<(), SinkError>;

    /// Final write-out for buffered sinks; a no-op elsewhere.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub struct ImportSummary {
    pub courses: usize,
    pub imported: usize,
    pub errors: usize,
}

impl ImportSummary {
    pub fn print(&self) {
        println!("\nImport finished:");
        println!("  courses:   {}", self.courses);
        println!("  exercises: {}", self.imported);
        println!("  errors:    {}", self.errors);
        let attempted = self.imported + self.errors;
        if attempted > 0 {
            println!(
                "  success:   {:.1}%",
                self.imported as f64 / attempted as f64 * 100.0
            );
        }
    }
}

/// Push every record through the sink. Courses are created first, one per
/// distinct chapter seen in the batch. Rejected records are counted and the
/// batch keeps going; an unavailable backend aborts.
pub fn import_records(
    sink: &mut dyn ExerciseSink,
    records: &[ExerciseRecord],
    grade: &str,
) -> Result<ImportSummary> {
    let mut course_ids: BTreeMap<u32, String> = BTreeMap::new();
    for record in records {
        if course_ids.contains_key(&record.chapter_number) {
            continue;
        }
        let course = Course::for_chapter(record.chapter_number, &record.chapter_title, grade);
        let id = match sink.ensure_course(&course) {
            Ok(id) => id,
            Err(SinkError::Rejected(msg)) => {
                warn!(chapter = record.chapter_number, error = %msg, "course not created");
                continue;
            }
            Err(fatal) => return Err(fatal.into()),
        };
        course_ids.insert(record.chapter_number, id);
    }

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut imported = 0usize;
    let mut errors = 0usize;
    for record in records {
        pb.inc(1);
        let Some(course_id) = course_ids.get(&record.chapter_number) else {
            errors += 1;
            continue;
        };
        match sink.insert_exercise(course_id, record) {
            Ok(()) => imported += 1,
            Err(SinkError::Rejected(msg)) => {
                errors += 1;
                if errors <= 5 {
                    warn!(exercise = %record.exercise_number, error = %msg, "record rejected");
                }
            }
            Err(fatal) => {
                pb.finish_and_clear();
                return Err(fatal.into());
            }
        }
    }
    pb.finish_and_clear();

    sink.finish().map_err(anyhow::Error::from)?;

    Ok(ImportSummary {
        courses: course_ids.len(),
        imported,
        errors,
    })
}
