use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay host; the connection uses implicit TLS
    pub host: String,
    pub port: u16,
    /// Login name, also used as the From address
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    /// Both halves of the credential pair, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the server binds to
    pub bind: String,
    /// Port the server listens on
    pub port: u16,
    /// Parent directory of originals/, drafts/ and pdfs/
    pub upload_root: PathBuf,
    /// JSON file holding the filename -> reviewer email map
    pub reviewer_file: PathBuf,
    pub smtp: SmtpConfig,
    /// Program invoked to turn an original into a PDF
    pub converter_program: String,
    pub converter_timeout: Duration,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bind: env_str("REVIEW_BIND", "0.0.0.0"),
            port: env_parse("REVIEW_PORT", 5000)?,
            upload_root: PathBuf::from(env_str("UPLOAD_ROOT", "uploads")),
            reviewer_file: PathBuf::from(env_str("REVIEWER_FILE", "reviewers.json")),
            smtp: SmtpConfig {
                host: env_str("SMTP_HOST", "smtp.gmail.com"),
                port: env_parse("SMTP_PORT", 465)?,
                username: std::env::var("EMAIL_USER").ok(),
                password: std::env::var("EMAIL_PASS").ok(),
            },
            converter_program: env_str("CONVERTER_PROGRAM", "soffice"),
            converter_timeout: Duration::from_secs(env_parse("CONVERTER_TIMEOUT_SECS", 120)?),
            cors_allowed_origins: env_csv("CORS_ALLOWED_ORIGINS"),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Load the nearest `.env`, searching the current directory and its ancestors.
///
/// Runs before the subscriber exists, so it reports what it did instead of logging.
pub fn load_env_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut current: &Path = &cwd;
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            return dotenvy::from_path(&candidate).ok().map(|_| candidate);
        }
        current = current.parent()?;
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "*")
            .map(ToString::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_both_halves() {
        let mut smtp = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: Some("bot@example.com".to_string()),
            password: None,
        };
        assert!(smtp.credentials().is_none());

        smtp.password = Some("secret".to_string());
        assert_eq!(smtp.credentials(), Some(("bot@example.com", "secret")));

        smtp.username = Some(String::new());
        assert!(smtp.credentials().is_none());
    }
}
