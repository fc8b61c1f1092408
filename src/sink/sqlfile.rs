use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Local;

use crate::config::Settings;
use crate::model::{Course, ExerciseRecord};
use crate::sink::{ExerciseSink, SinkError};

/// Emits Postgres-flavoured SQL instead of touching a database. Course ids
/// handed back to the runner are `(SELECT ...)` subqueries resolved at
/// execution time, so the generated script is self-contained.
pub struct SqlFileSink {
    output: PathBuf,
    split: bool,
    settings: Settings,
    courses_sql: String,
    // chapter order_num -> statements, kept sorted for stable part files
    exercise_sql: BTreeMap<u32, Vec<String>>,
    order_in_course: BTreeMap<u32, usize>,
}

impl SqlFileSink {
    pub fn new(output: PathBuf, split: bool, settings: Settings) -> SqlFileSink {
        SqlFileSink {
            output,
            split,
            settings,
            courses_sql: String::new(),
            exercise_sql: BTreeMap::new(),
            order_in_course: BTreeMap::new(),
        }
    }

    fn write_single(&self) -> std::io::Result<PathBuf> {
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut sql = header("BIBLIOTHEQUE SQL - MATHIA", self.total_statements());
        sql.push_str(&self.courses_sql);
        for statements in self.exercise_sql.values() {
            for stmt in statements {
                sql.push_str(stmt);
            }
        }
        sql.push_str(VERIFICATION_SQL);
        fs::write(&self.output, sql)?;
        Ok(self.output.clone())
    }

    fn write_parts(&self) -> std::io::Result<Vec<PathBuf>> {
        let dir = self
            .output
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;

        let mut written = Vec::new();

        let courses_path = dir.join("01_courses.sql");
        let mut courses = header("COURS - creation idempotente", self.courses_sql.matches("INSERT").count());
        courses.push_str(&self.courses_sql);
        fs::write(&courses_path, courses)?;
        written.push(courses_path);

        for (chapter, statements) in &self.exercise_sql {
            let path = dir.join(format!("02_chapitre_{:02}.sql", chapter));
            let mut sql = header(
                &format!("EXERCICES - CHAPITRE {}", chapter),
                statements.len(),
            );
            for stmt in statements {
                sql.push_str(stmt);
            }
            fs::write(&path, sql)?;
            written.push(path);
        }

        let verification_path = dir.join("99_verification.sql");
        fs::write(&verification_path, format!("{}{}", header("VERIFICATIONS", 0), VERIFICATION_SQL))?;
        written.push(verification_path);

        let instructions = render_instructions(&written, &self.settings);
        fs::write(dir.join("INSTRUCTIONS_IMPORT.md"), instructions)?;

        Ok(written)
    }

    fn total_statements(&self) -> usize {
        self.exercise_sql.values().map(|v| v.len()).sum()
    }
}

impl ExerciseSink for SqlFileSink {
    fn name(&self) -> &'static str {
        "sqlfile"
    }

    fn ensure_course(&mut self, course: &Course) -> Result<String, SinkError> {
        // Idempotent in SQL: insert only when no course with this title and
        // grade exists yet.
        self.courses_sql.push_str(&format!(
            "INSERT INTO public.courses (id, title, description, grade, order_num, is_published)\n\
             SELECT uuid_generate_v4(), {title}, {desc}, {grade}, {order}, true\n\
             WHERE NOT EXISTS (\n\
             \x20   SELECT 1 FROM public.courses WHERE title = {title} AND grade = {grade}\n\
             );\n\n",
            title = escape_sql(&course.title),
            desc = escape_sql(&course.description),
            grade = escape_sql(&course.grade),
            order = course.order_num,
        ));
        Ok(format!(
            "(SELECT id FROM public.courses WHERE order_num = {} LIMIT 1)",
            course.order_num
        ))
    }

    fn insert_exercise(
        &mut self,
        course_id: &str,
        record: &ExerciseRecord,
    ) -> Result<(), SinkError> {
        let counter = self.order_in_course.entry(record.chapter_number).or_insert(0);
        *counter += 1;
        let order = *counter;

        let mut title = format!("Exercice {}", record.exercise_number);
        if !record.chapter_title.is_empty() {
            title.push_str(&format!(" - {}", record.chapter_title));
        }

        let options_sql = match &record.options {
            Some(options) => escape_sql(
                &serde_json::to_string(options)
                    .map_err(|e| SinkError::Rejected(e.to_string()))?,
            ),
            None => "NULL".to_string(),
        };
        let hints_sql = escape_sql(
            &serde_json::to_string(&record.hints).map_err(|e| SinkError::Rejected(e.to_string()))?,
        );

        let stmt = format!(
            "INSERT INTO public.exercises\n\
             \x20   (id, course_id, title, description, question, answer, explanation,\n\
             \x20    difficulty, points, time_limit, type, hints, options, ai_generated,\n\
             \x20    order_num, is_published)\n\
             VALUES (\n\
             \x20   uuid_generate_v4(),\n\
             \x20   {course_id},\n\
             \x20   {title},\n\
             \x20   {desc},\n\
             \x20   {question},\n\
             \x20   {answer},\n\
             \x20   {explanation},\n\
             \x20   '{difficulty}',\n\
             \x20   {points},\n\
             \x20   300,\n\
             \x20   '{kind}',\n\
             \x20   {hints},\n\
             \x20   {options},\n\
             \x20   false,\n\
             \x20   {order},\n\
             \x20   true\n\
             );\n\n",
            course_id = course_id,
            title = escape_sql(&title),
            desc = escape_sql(&format!("Exercice du chapitre {}", record.chapter_number)),
            question = escape_sql(&record.body),
            answer = escape_sql(&record.answer),
            explanation = record
                .explanation
                .as_deref()
                .map(escape_sql)
                .unwrap_or_else(|| "NULL".to_string()),
            difficulty = record.difficulty.as_str(),
            points = record.difficulty.points(),
            kind = record.kind.as_str(),
            hints = hints_sql,
            options = options_sql,
            order = order,
        );

        self.exercise_sql
            .entry(record.chapter_number)
            .or_default()
            .push(stmt);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        let result = if self.split {
            self.write_parts().map(|parts| {
                println!("Generated {} SQL part files + INSTRUCTIONS_IMPORT.md", parts.len());
            })
        } else {
            self.write_single().map(|path| {
                println!("Generated SQL script: {}", path.display());
            })
        };
        result.map_err(|e| SinkError::Unavailable(e.to_string()))
    }
}

/// Single-quote a literal for SQL, doubling embedded quotes. Empty text
/// becomes NULL, matching the column defaults.
pub fn escape_sql(text: &str) -> String {
    if text.is_empty() {
        return "NULL".to_string();
    }
    format!("'{}'", text.replace('\'', "''"))
}

fn header(label: &str, statements: usize) -> String {
    let mut out = String::new();
    out.push_str("-- ============================================\n");
    out.push_str(&format!("-- {}\n", label));
    out.push_str("-- ============================================\n");
    out.push_str(&format!(
        "-- Genere le {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    if statements > 0 {
        out.push_str(&format!("-- Instructions: {}\n", statements));
    }
    out.push_str("-- ============================================\n\n");
    out
}

const VERIFICATION_SQL: &str = "\
-- ============================================
-- VERIFICATIONS
-- ============================================

SELECT 'Total exercices' AS type, COUNT(*) AS nombre FROM public.exercises;

SELECT c.title AS chapitre, COUNT(e.id) AS exercices
FROM public.courses c
LEFT JOIN public.exercises e ON c.id = e.course_id
GROUP BY c.id, c.title
ORDER BY c.order_num;

SELECT difficulty, COUNT(*) AS nombre
FROM public.exercises
GROUP BY difficulty
ORDER BY difficulty;
";

fn render_instructions(parts: &[PathBuf], settings: &Settings) -> String {
    let mut md = String::new();
    md.push_str("# Instructions d'import SQL\n\n");
    md.push_str("Les exercices sont repartis en plusieurs fichiers pour eviter les limites de taille de l'editeur SQL.\n\n");
    md.push_str("## Ordre d'execution\n\n");
    for (i, part) in parts.iter().enumerate() {
        let name = part
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        md.push_str(&format!("{}. Executer `{}`\n", i + 1, name));
    }
    md.push_str("\nChaque fichier peut etre colle tel quel dans le SQL Editor (Supabase) ");
    md.push_str("ou passe a psql.\n");
    if let Some(hint) = settings.psql_hint() {
        md.push_str(&format!("\n```sh\n{} -f <fichier.sql>\n```\n", hint));
    }
    md.push_str("\nLe dernier fichier ne modifie rien: il affiche les totaux attendus par chapitre et par difficulte.\n");
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ExerciseType};

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(escape_sql("l'aire d'un carre"), "'l''aire d''un carre'");
        assert_eq!(escape_sql(""), "NULL");
    }

    #[test]
    fn course_id_is_a_subquery() {
        let mut sink = SqlFileSink::new(PathBuf::from("out.sql"), false, Settings::default());
        let id = sink
            .ensure_course(&Course::for_chapter(4, "Fractions", "6eme"))
            .unwrap();
        assert_eq!(
            id,
            "(SELECT id FROM public.courses WHERE order_num = 4 LIMIT 1)"
        );
        assert!(sink.courses_sql.contains("WHERE NOT EXISTS"));
        assert!(sink.courses_sql.contains("'Fractions'"));
    }

    #[test]
    fn exercise_statement_shape() {
        let mut sink = SqlFileSink::new(PathBuf::from("out.sql"), false, Settings::default());
        let course = Course::for_chapter(1, "Nombres entiers", "6eme");
        let id = sink.ensure_course(&course).unwrap();
        let record = ExerciseRecord {
            kind: ExerciseType::Calcul,
            body: "Calculer l'ecart entre 12 et 7.".to_string(),
            answer: "5".to_string(),
            explanation: None,
            difficulty: Difficulty::Facile,
            tags: Vec::new(),
            options: None,
            chapter_number: 1,
            chapter_title: "Nombres entiers".to_string(),
            exercise_number: "3".to_string(),
            hints: Vec::new(),
        };
        sink.insert_exercise(&id, &record).unwrap();

        let stmt = &sink.exercise_sql[&1][0];
        assert!(stmt.contains("'Calculer l''ecart entre 12 et 7.'"));
        assert!(stmt.contains("'facile'"));
        assert!(stmt.contains("10,"));
        assert!(stmt.contains("'calcul'"));
        assert!(stmt.contains("NULL"));
    }
}
