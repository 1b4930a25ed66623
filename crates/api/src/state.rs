use crate::error::ApiError;
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use stratify_core::analysis::AnalysisPipeline;
use stratify_core::auth::TokenIssuer;

#[derive(Clone)]
pub struct AppState {
    /// `None` when the API started without a database.
    pub pool: Option<PgPool>,
    pub tokens: TokenIssuer,
    pub pipeline: Arc<AnalysisPipeline>,
    pub report_dir: PathBuf,
}

impl AppState {
    pub fn db(&self) -> Result<&PgPool, ApiError> {
        self.pool.as_ref().ok_or(ApiError::Unavailable)
    }
}
