use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::debug;

use crate::model::{Course, ExerciseRecord};
use crate::sink::{ExerciseSink, SinkError};

const READINESS_ATTEMPTS: usize = 30;
const READINESS_TIMEOUT: Duration = Duration::from_secs(5);
const READINESS_PAUSE: Duration = Duration::from_secs(2);

/// Supabase-style REST sink: `apikey` + bearer auth, `eq.` filter params,
/// one POST per record.
pub struct RestSink {
    client: Client,
    base_url: String,
}

impl RestSink {
    pub fn new(base_url: &str, api_key: &str) -> Result<RestSink, SinkError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(api_key)
            .map_err(|_| SinkError::Unavailable("API key is not a valid header value".to_string()))?;
        headers.insert("apikey", key_value);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SinkError::Unavailable("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        Ok(RestSink {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn courses_url(&self) -> String {
        format!("{}/rest/v1/courses", self.base_url)
    }

    fn exercises_url(&self) -> String {
        format!("{}/rest/v1/exercises", self.base_url)
    }

    /// Poll the API until it answers, with a short per-request timeout.
    /// Only used before an import run, never inside it.
    pub fn wait_until_ready(&self) -> Result<(), SinkError> {
        println!("Waiting for the API...");
        for attempt in 1..=READINESS_ATTEMPTS {
            let response = self
                .client
                .get(self.courses_url())
                .query(&[("limit", "1")])
                .timeout(READINESS_TIMEOUT)
                .send();
            match response {
                Ok(r) if r.status().is_success() => {
                    println!("API reachable.");
                    return Ok(());
                }
                Ok(r) => debug!(status = %r.status(), attempt, "API not ready"),
                Err(e) => debug!(error = %e, attempt, "API not reachable"),
            }
            println!("  attempt {}/{}...", attempt, READINESS_ATTEMPTS);
            thread::sleep(READINESS_PAUSE);
        }
        Err(SinkError::Unavailable(format!(
            "API did not become ready after {} attempts",
            READINESS_ATTEMPTS
        )))
    }

    fn find_course(&self, course: &Course) -> Result<Option<String>, SinkError> {
        let response = self
            .client
            .get(self.courses_url())
            .query(&[
                ("title", format!("eq.{}", course.title)),
                ("grade", format!("eq.{}", course.grade)),
                ("select", "id".to_string()),
            ])
            .send()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Unavailable(format!(
                "course lookup failed: HTTP {}",
                response.status()
            )));
        }
        let rows: Vec<Value> = response
            .json()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        Ok(rows.first().and_then(|row| id_of(row)))
    }
}

fn id_of(row: &Value) -> Option<String> {
    match row.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl ExerciseSink for RestSink {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn ensure_course(&mut self, course: &Course) -> Result<String, SinkError> {
        if let Some(id) = self.find_course(course)? {
            println!("Course exists: {} (id {})", course.title, id);
            return Ok(id);
        }

        let payload = json!({
            "title": course.title,
            "description": course.description,
            "content": format!("Contenu du {}: {}", course.chapter_label.to_lowercase(), course.title),
            "grade": course.grade,
            "order_num": course.order_num,
            "is_published": true,
        });
        let response = self
            .client
            .post(self.courses_url())
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Unavailable(format!(
                "course creation failed for {}: HTTP {}",
                course.title,
                response.status()
            )));
        }
        let rows: Vec<Value> = response
            .json()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let id = rows
            .first()
            .and_then(id_of)
            .ok_or_else(|| SinkError::Unavailable("course creation returned no id".to_string()))?;
        println!("Course created: {} (id {})", course.title, id);
        Ok(id)
    }

    fn insert_exercise(
        &mut self,
        course_id: &str,
        record: &ExerciseRecord,
    ) -> Result<(), SinkError> {
        let payload = json!({
            "course_id": course_id,
            "title": format!("Exercice {} - {}", record.exercise_number, record.chapter_title),
            "description": format!("Exercice du chapitre {}", record.chapter_number),
            "question": record.body,
            "answer": record.answer,
            "explanation": record.explanation,
            "difficulty": record.difficulty.as_str(),
            "points": record.difficulty.points(),
            "time_limit": 300,
            "type": record.kind.as_str(),
            "hints": record.hints,
            "options": record.options,
            "ai_generated": false,
            "is_published": true,
        });
        let response = self
            .client
            .post(self.exercises_url())
            .json(&payload)
            .send()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            // Non-2xx on a single record is a data problem, not an outage.
            Err(SinkError::Rejected(format!("HTTP {}", response.status())))
        }
    }
}
