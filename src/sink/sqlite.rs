use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{Course, ExerciseRecord};
use crate::sink::{ExerciseSink, SinkError};

/// Direct writes into the local SQLite database.
pub struct SqliteSink {
    conn: Connection,
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
    }
    let conn = Connection::open(path).with_context(|| format!("failed to open {:?}", path))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            grade TEXT NOT NULL,
            chapter TEXT,
            description TEXT,
            order_num INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(title, grade)
        );
        CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            body TEXT NOT NULL,
            options TEXT,
            answer TEXT NOT NULL,
            explanation TEXT,
            difficulty TEXT NOT NULL,
            points INTEGER NOT NULL,
            tags TEXT,
            hints TEXT,
            exercise_number TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_exercises_course ON exercises (course_id);
        CREATE INDEX IF NOT EXISTS idx_exercises_difficulty ON exercises (difficulty);",
    )?;
    Ok(())
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<SqliteSink> {
        let conn = connect(path)?;
        create_tables(&conn)?;
        Ok(SqliteSink { conn })
    }

    #[cfg(test)]
    fn in_memory() -> SqliteSink {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        SqliteSink { conn }
    }
}

impl ExerciseSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_course(&mut self, course: &Course) -> Result<String, SinkError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM courses WHERE title = ?1 AND grade = ?2",
                params![course.title, course.grade],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        if let Some(id) = existing {
            return Ok(id.to_string());
        }

        self.conn
            .execute(
                "INSERT INTO courses (title, grade, chapter, description, order_num)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    course.title,
                    course.grade,
                    course.chapter_label,
                    course.description,
                    course.order_num,
                ],
            )
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        Ok(self.conn.last_insert_rowid().to_string())
    }

    fn insert_exercise(
        &mut self,
        course_id: &str,
        record: &ExerciseRecord,
    ) -> Result<(), SinkError> {
        let course_id: i64 = course_id
            .parse()
            .map_err(|_| SinkError::Rejected(format!("bad course id {}", course_id)))?;
        let options = record
            .options
            .as_ref()
            .map(|o| serde_json::to_string(o).unwrap_or_default());
        let tags = serde_json::to_string(&record.tags).unwrap_or_default();
        let hints = serde_json::to_string(&record.hints).unwrap_or_default();

        self.conn
            .execute(
                "INSERT INTO exercises
                 (course_id, type, body, options, answer, explanation, difficulty, points,
                  tags, hints, exercise_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    course_id,
                    record.kind.as_str(),
                    record.body,
                    options,
                    record.answer,
                    record.explanation,
                    record.difficulty.as_str(),
                    record.difficulty.points(),
                    tags,
                    hints,
                    record.exercise_number,
                ],
            )
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        Ok(())
    }
}

pub struct DbStats {
    pub courses: usize,
    pub exercises: usize,
    pub by_type: Vec<(String, usize)>,
    pub by_difficulty: Vec<(String, usize)>,
    pub by_course: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<DbStats> {
    let courses: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))?;
    let exercises: i64 = conn.query_row("SELECT COUNT(*) FROM exercises", [], |r| r.get(0))?;

    let grouped = |sql: &str| -> Result<Vec<(String, usize)>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    };

    Ok(DbStats {
        courses: courses as usize,
        exercises: exercises as usize,
        by_type: grouped(
            "SELECT type, COUNT(*) FROM exercises GROUP BY type ORDER BY COUNT(*) DESC",
        )?,
        by_difficulty: grouped(
            "SELECT difficulty, COUNT(*) FROM exercises GROUP BY difficulty ORDER BY COUNT(*) DESC",
        )?,
        by_course: grouped(
            "SELECT c.title, COUNT(e.id) FROM courses c
             LEFT JOIN exercises e ON e.course_id = c.id
             GROUP BY c.id ORDER BY c.order_num",
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ExerciseType};

    fn record() -> ExerciseRecord {
        ExerciseRecord {
            kind: ExerciseType::Calcul,
            body: "Calculer la somme de 125 et 78.".to_string(),
            answer: "203".to_string(),
            explanation: None,
            difficulty: Difficulty::Moyen,
            tags: vec!["6eme".to_string(), "chapitre_1".to_string()],
            options: None,
            chapter_number: 1,
            chapter_title: "Nombres entiers".to_string(),
            exercise_number: "2".to_string(),
            hints: Vec::new(),
        }
    }

    #[test]
    fn ensure_course_is_idempotent() {
        let mut sink = SqliteSink::in_memory();
        let course = Course::for_chapter(1, "Nombres entiers", "6eme");
        let first = sink.ensure_course(&course).unwrap();
        let second = sink.ensure_course(&course).unwrap();
        assert_eq!(first, second);
        let count: i64 = sink
            .conn
            .query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn insert_and_read_back_stats() {
        let mut sink = SqliteSink::in_memory();
        let course = Course::for_chapter(1, "Nombres entiers", "6eme");
        let id = sink.ensure_course(&course).unwrap();
        sink.insert_exercise(&id, &record()).unwrap();
        sink.insert_exercise(&id, &record()).unwrap();

        let stats = get_stats(&sink.conn).unwrap();
        assert_eq!(stats.courses, 1);
        assert_eq!(stats.exercises, 2);
        assert_eq!(stats.by_type, vec![("calcul".to_string(), 2)]);
        assert_eq!(stats.by_course, vec![("Nombres entiers".to_string(), 2)]);
    }

    #[test]
    fn bad_course_id_is_rejected_not_fatal() {
        let mut sink = SqliteSink::in_memory();
        let err = sink.insert_exercise("not-a-number", &record()).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
    }
}
