use sentry::types::Dsn;
use std::env::var;
use tracing::{error, warn};

pub const PLACEHOLDER_URL: &str = "https://your-project.supabase.co";
pub const PLACEHOLDER_KEY: &str = "public-anon-key";
/// Log filter used when `RUST_LOG` is unset. Keeps sampler shortfall warnings visible.
pub const DEFAULT_LOG_FILTER: &str = "builder_service=info,exam_utils=warn";

#[derive(Clone, Debug)]
pub struct EnvVars {
    pub environment: Environment,
    pub fetch_page_size: usize,
    pub history_path: String,
    pub import_batch_size: usize,
    pub question_limit: usize,
    pub sentry_dsn: Option<String>,
    pub supabase_key: String,
    pub supabase_url: String,
}

#[derive(Clone, Debug)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                warn!(
                    "ENVIRONMENT value '{}' is not valid. Defaulting to 'production'.",
                    other
                );
                Environment::Production
            }
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(s)
    }
}

impl EnvVars {
    pub fn new() -> Self {
        let Ok(supabase_url) = var("SUPABASE_URL") else {
            error!("SUPABASE_URL not set");
            panic!("SUPABASE_URL required");
        };
        let Ok(supabase_key) = var("SUPABASE_KEY") else {
            error!("SUPABASE_KEY not set");
            panic!("SUPABASE_KEY required");
        };
        assert!(
            valid_credentials(&supabase_url, &supabase_key),
            "Missing Supabase credentials: SUPABASE_URL and SUPABASE_KEY must be set to a real project"
        );

        let sentry_dsn = match var("SENTRY_DSN") {
            Ok(dsn_string) => {
                assert!(
                    valid_sentry_dsn(&dsn_string),
                    "SENTRY_DSN is not valid DSN."
                );
                Some(dsn_string)
            }
            Err(_e) => {
                if cfg!(not(debug_assertions)) {
                    panic!("SENTRY_DSN is not allowed to be unset outside of a debug build");
                }
                warn!("SENTRY_DSN not set.");
                None
            }
        };

        let environment = match var("ENVIRONMENT") {
            Ok(v) => v.into(),
            Err(_e) => {
                warn!("ENVIRONMENT not set. Defaulting to 'production'.");
                Environment::Production
            }
        };

        let history_path = match var("HISTORY_PATH") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                let default_history_path = "exam-builder-history.json".to_string();
                warn!("HISTORY_PATH not set. Defaulting to {default_history_path}");
                default_history_path
            }
        };

        let fetch_page_size = positive_or("FETCH_PAGE_SIZE", 500);
        let import_batch_size = positive_or("IMPORT_BATCH_SIZE", 50);
        let question_limit = positive_or("QUESTION_LIMIT", schema::DEFAULT_QUESTION_LIMIT);

        Self {
            environment,
            fetch_page_size,
            history_path,
            import_batch_size,
            question_limit,
            sentry_dsn,
            supabase_key,
            supabase_url,
        }
    }
}

/// Reads a whole number greater than zero, falling back to `default`.
fn positive_or(name: &str, default: usize) -> usize {
    match var(name) {
        Ok(val) => match val.parse::<usize>() {
            Ok(n) if n > 0 => n,
            Ok(_) => {
                warn!("{name} provided but not > 0; defaulting to {default}");
                default
            }
            Err(e) => {
                warn!("Failed to parse {name} ('{val}'): {e}; defaulting to {default}");
                default
            }
        },
        Err(_) => default,
    }
}

/// Rejects empty values and the placeholders shipped in the sample `.env`.
pub fn valid_credentials(url: &str, key: &str) -> bool {
    let (url, key) = (url.trim(), key.trim());
    !url.is_empty() && !key.is_empty() && url != PLACEHOLDER_URL && key != PLACEHOLDER_KEY
}

fn valid_sentry_dsn(url: &str) -> bool {
    url.parse::<Dsn>().is_ok()
}
