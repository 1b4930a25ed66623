pub mod analysis;
pub mod auth;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod pdf;
pub mod scoring;
pub mod storage;

pub mod config {
    use anyhow::Context;

    const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
    const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";
    const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
    const DEFAULT_REPORT_OUTPUT_DIR: &str = "/tmp/stratify_reports";
    const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 60;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub secret_key: Option<String>,
        pub access_token_expire_minutes: i64,
        pub coingecko_api_key: Option<String>,
        pub fred_api_key: Option<String>,
        pub news_api_key: Option<String>,
        pub ollama_base_url: String,
        pub ollama_model: String,
        pub sentry_dsn: Option<String>,
        pub allowed_origins: Vec<String>,
        pub report_output_dir: String,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let access_token_expire_minutes = match non_empty_var("ACCESS_TOKEN_EXPIRE_MINUTES") {
                Some(v) => v
                    .parse::<i64>()
                    .with_context(|| format!("ACCESS_TOKEN_EXPIRE_MINUTES is not an integer: {v}"))?,
                None => DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            };
            anyhow::ensure!(
                access_token_expire_minutes > 0,
                "ACCESS_TOKEN_EXPIRE_MINUTES must be > 0"
            );

            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                secret_key: non_empty_var("SECRET_KEY"),
                access_token_expire_minutes,
                coingecko_api_key: non_empty_var("COINGECKO_API_KEY"),
                fred_api_key: non_empty_var("FRED_API_KEY"),
                news_api_key: non_empty_var("NEWS_API_KEY"),
                ollama_base_url: non_empty_var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                ollama_model: non_empty_var("OLLAMA_MODEL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                allowed_origins: parse_origins(
                    non_empty_var("ALLOWED_ORIGINS")
                        .as_deref()
                        .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
                ),
                report_output_dir: non_empty_var("REPORT_OUTPUT_DIR")
                    .unwrap_or_else(|| DEFAULT_REPORT_OUTPUT_DIR.to_string()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_secret_key(&self) -> anyhow::Result<&str> {
            self.secret_key.as_deref().context("SECRET_KEY is required")
        }
    }

    // Empty strings count as unset, same as a missing variable.
    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parse_origins_trims_and_drops_empty_entries() {
            let origins = parse_origins(" http://a.test , ,http://b.test,");
            assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
        }
    }
}
