use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use anyhow::Context;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratify_core::analysis::{AnalysisOutcome, FactorBreakdown};
use stratify_core::domain::profile::{CustomProfile, ProfileSource, SensitivityProfile};
use stratify_core::domain::report::{ConfidenceLevel, HorizonProbabilities, Narratives, Report, ReportSummary};
use stratify_core::ingest::collector::{MacroReadings, NewsSource};
use stratify_core::ingest::market::MarketSnapshot;
use stratify_core::pdf::{self, RenderContext};
use stratify_core::storage::{profiles, reports};
use uuid::Uuid;

const ASSET_NOT_FOUND: &str = "Asset not found in CoinGecko. Please create a custom profile.";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub asset_name: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Found(Box<AnalysisBody>),
    Missing(MissingAsset),
}

#[derive(Debug, Serialize)]
pub struct MissingAsset {
    pub asset_found: bool,
    pub message: &'static str,
    pub requires_profile: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysisBody {
    pub asset_found: bool,
    pub asset_name: String,
    pub symbol: String,
    pub image: String,
    pub description: String,
    pub market_data: Option<MarketSnapshot>,
    pub profile_source: ProfileSource,
    pub probabilities: HorizonProbabilities,
    pub narratives: Narratives,
    pub most_likely_scenario: String,
    pub confidence_level: ConfidenceLevel,
    pub report_id: Uuid,
    pub macro_events_analyzed: usize,
    pub news_sources: Vec<NewsSource>,
    pub macro_data: MacroReadings,
    pub factor_breakdown: FactorBreakdown,
}

impl AnalysisBody {
    fn new(outcome: AnalysisOutcome, report_id: Uuid) -> Self {
        let factor_breakdown = outcome.factor_breakdown();
        Self {
            asset_found: true,
            probabilities: outcome.probabilities(),
            confidence_level: outcome.confidence(),
            macro_events_analyzed: outcome.events.len(),
            asset_name: outcome.asset.name,
            symbol: outcome.asset.symbol,
            image: outcome.asset.image,
            description: outcome.asset.description,
            market_data: outcome.asset.market_data,
            profile_source: outcome.asset.source,
            narratives: outcome.narratives,
            most_likely_scenario: outcome.most_likely_scenario,
            report_id,
            news_sources: outcome.news_sources,
            macro_data: outcome.readings,
            factor_breakdown,
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let asset_name = body.asset_name.trim();
    if asset_name.is_empty() {
        return Err(ApiError::bad_request("asset_name must not be empty"));
    }
    let pool = state.db()?;

    let custom = profiles::find_profile_for_owner(pool, user.id, asset_name).await?;
    let now = Utc::now();
    let Some(outcome) = state.pipeline.run(asset_name, custom, now).await else {
        tracing::info!(user_id = %user.id, asset = asset_name, "asset not resolvable; profile required");
        return Ok(Json(AnalyzeResponse::Missing(MissingAsset {
            asset_found: false,
            message: ASSET_NOT_FOUND,
            requires_profile: true,
        })));
    };

    let report_id = reports::save_report(pool, &outcome.new_report(user.id), now).await?;
    tracing::info!(
        user_id = %user.id,
        %report_id,
        asset = %outcome.asset.name,
        confidence = %outcome.confidence(),
        "analysis complete"
    );

    Ok(Json(AnalyzeResponse::Found(Box::new(AnalysisBody::new(
        outcome, report_id,
    )))))
}

#[derive(Debug, Serialize)]
pub struct ReportList {
    pub reports: Vec<ReportSummary>,
    pub total: usize,
}

pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ReportList>, ApiError> {
    let reports = reports::list_reports(state.db()?, user.id).await?;
    Ok(Json(ReportList {
        total: reports.len(),
        reports,
    }))
}

pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<Report>, ApiError> {
    reports::get_report(state.db()?, report_id, user.id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Report not found"))
}

/// Renders the report, keeps a copy under the report directory and returns it as a download.
pub async fn generate_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let pool = state.db()?;
    let report = reports::get_report(pool, report_id, user.id)
        .await?
        .ok_or(ApiError::NotFound("Report not found"))?;

    let generated_at = Utc::now();
    let filename = pdf::report_filename(&report.token_name, generated_at);
    let owner_email = user.email.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        pdf::render_report(
            &report,
            RenderContext {
                owner_email: &owner_email,
                macro_summary: pdf::DEFAULT_MACRO_SUMMARY,
                generated_at,
            },
        )
    })
    .await
    .context("pdf render task failed")??;

    let path = pdf::write_report_file(&state.report_dir, &filename, &rendered.bytes).await?;
    reports::set_pdf_path(pool, report_id, &path.to_string_lossy()).await?;
    tracing::info!(%report_id, path = %path.display(), pages = rendered.pages, "pdf generated");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(rendered.bytes))
        .context("failed to build pdf response")
        .map_err(ApiError::from)
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub token_name: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub volatility_level: f64,
    pub liquidity_sensitivity: f64,
    pub regulation_sensitivity: f64,
    pub interest_rate_sensitivity: f64,
    pub geopolitical_sensitivity: f64,
}

impl CreateProfileRequest {
    fn profile(&self) -> Result<SensitivityProfile, ApiError> {
        let weights = [
            ("volatility_level", self.volatility_level),
            ("liquidity_sensitivity", self.liquidity_sensitivity),
            ("regulation_sensitivity", self.regulation_sensitivity),
            ("interest_rate_sensitivity", self.interest_rate_sensitivity),
            ("geopolitical_sensitivity", self.geopolitical_sensitivity),
        ];
        if let Some((name, _)) = weights
            .iter()
            .find(|(_, w)| !(0.0..=1.0).contains(w))
        {
            return Err(ApiError::bad_request(format!("{name} must be between 0 and 1")));
        }
        Ok(SensitivityProfile::new(
            self.volatility_level,
            self.liquidity_sensitivity,
            self.regulation_sensitivity,
            self.interest_rate_sensitivity,
            self.geopolitical_sensitivity,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub id: Uuid,
    pub token_name: String,
    pub token_type: Option<String>,
    pub volatility_level: f64,
    pub liquidity_sensitivity: f64,
    pub regulation_sensitivity: f64,
    pub interest_rate_sensitivity: f64,
    pub geopolitical_sensitivity: f64,
    pub created_at: DateTime<Utc>,
}

impl From<CustomProfile> for ProfileBody {
    fn from(p: CustomProfile) -> Self {
        Self {
            id: p.id,
            token_name: p.token_name,
            token_type: p.token_type,
            volatility_level: p.profile.volatility,
            liquidity_sensitivity: p.profile.liquidity,
            regulation_sensitivity: p.profile.regulation,
            interest_rate_sensitivity: p.profile.interest_rate,
            geopolitical_sensitivity: p.profile.geopolitical,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileList {
    pub profiles: Vec<ProfileBody>,
    pub total: usize,
}

pub async fn create_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<ProfileBody>), ApiError> {
    if body.token_name.trim().is_empty() {
        return Err(ApiError::bad_request("token_name must not be empty"));
    }
    let profile = body.profile()?;

    let created = profiles::create_profile(
        state.db()?,
        user.id,
        &body.token_name,
        body.token_type.as_deref(),
        &profile,
    )
    .await?;
    tracing::info!(user_id = %user.id, profile_id = %created.id, token = %created.token_name, "custom profile created");

    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ProfileList>, ApiError> {
    let profiles: Vec<ProfileBody> = profiles::list_profiles(state.db()?, user.id)
        .await?
        .into_iter()
        .map(ProfileBody::from)
        .collect();
    Ok(Json(ProfileList {
        total: profiles.len(),
        profiles,
    }))
}
