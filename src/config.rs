use config::Config;
use serde::Deserialize;

/// Process-wide settings, read once from the environment at startup and
/// passed explicitly to whichever sink needs them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<String>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
}

impl Settings {
    pub fn load() -> Settings {
        Config::builder()
            .add_source(config::Environment::default())
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap_or_default()
    }

    /// Path of the local SQLite database. `DATABASE_URL` wins when it points
    /// at a file (with or without the sqlite:// scheme).
    pub fn sqlite_path(&self) -> String {
        match self.database_url.as_deref() {
            Some(url) if url.starts_with("sqlite://") => url["sqlite://".len()..].to_string(),
            Some(url) if !url.contains("://") => url.to_string(),
            _ => "data/mathia.sqlite".to_string(),
        }
    }

    /// A psql invocation for the manual-import instructions, composed from
    /// whatever connection variables are set. None when nothing usable is.
    pub fn psql_hint(&self) -> Option<String> {
        if let Some(url) = self.database_url.as_deref() {
            if url.starts_with("postgres://") || url.starts_with("postgresql://") {
                return Some(format!("psql \"{}\"", url));
            }
        }
        let host = self.db_host.as_deref()?;
        let name = self.db_name.as_deref().unwrap_or("mathia_db");
        let user = self.db_user.as_deref().unwrap_or("postgres");
        let port = self.db_port.as_deref().unwrap_or("5432");
        let cmd = format!("psql -h {} -p {} -U {} -d {}", host, port, user, name);
        // Never inline the password itself; point at the variable instead.
        if self.db_password.is_some() {
            Some(format!("PGPASSWORD=$DB_PASSWORD {}", cmd))
        } else {
            Some(cmd)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_path_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.sqlite_path(), "data/mathia.sqlite");
    }

    #[test]
    fn sqlite_path_strips_scheme() {
        let settings = Settings {
            database_url: Some("sqlite:///tmp/test.sqlite".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.sqlite_path(), "/tmp/test.sqlite");
    }

    #[test]
    fn psql_hint_from_parts() {
        let settings = Settings {
            db_host: Some("localhost".to_string()),
            db_name: Some("mathia".to_string()),
            ..Settings::default()
        };
        assert_eq!(
            settings.psql_hint().unwrap(),
            "psql -h localhost -p 5432 -U postgres -d mathia"
        );
    }

    #[test]
    fn psql_hint_prefers_database_url() {
        let settings = Settings {
            database_url: Some("postgres://u:p@db/mathia".to_string()),
            db_host: Some("ignored".to_string()),
            ..Settings::default()
        };
        assert_eq!(
            settings.psql_hint().unwrap(),
            "psql \"postgres://u:p@db/mathia\""
        );
    }
}
