use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stratify_core::analysis::{AnalysisOutcome, AnalysisPipeline};
use stratify_core::config::Settings;
use stratify_core::domain::user::{normalize_email, User};
use stratify_core::pdf::{self, RenderContext};
use stratify_core::storage::{self, profiles, reports, users};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Runs one macro influence analysis from the command line.
#[derive(Debug, Parser)]
#[command(name = "stratify_worker")]
struct Args {
    /// Asset name or ticker, e.g. "bitcoin" or "ETH".
    #[arg(long)]
    asset: String,

    /// Owner of the saved report. Their custom profiles are consulted first.
    #[arg(long)]
    owner_email: Option<String>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Also render the report as a PDF to this path.
    #[arg(long)]
    pdf_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(asset = %args.asset, error = %format!("{err:#}"), "analysis run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let asset = args.asset.trim();
    anyhow::ensure!(!asset.is_empty(), "--asset must not be empty");

    let owner_email = args
        .owner_email
        .as_deref()
        .map(|raw| normalize_email(raw).with_context(|| format!("invalid --owner-email: {raw}")))
        .transpose()?;
    anyhow::ensure!(
        args.dry_run || owner_email.is_some(),
        "--owner-email is required unless --dry-run is set"
    );

    let pool = if args.dry_run {
        None
    } else {
        Some(storage::connect(settings.require_database_url()?).await?)
    };

    let owner = match (&pool, &owner_email) {
        (Some(pool), Some(email)) => Some(
            users::find_user_by_email(pool, email)
                .await?
                .with_context(|| format!("no user registered as {email}"))?,
        ),
        _ => None,
    };

    let custom = match (&pool, &owner) {
        (Some(pool), Some(owner)) => profiles::find_profile_for_owner(pool, owner.id, asset).await?,
        _ => None,
    };

    let pipeline = AnalysisPipeline::from_settings(settings)?;
    let now = chrono::Utc::now();
    let Some(outcome) = pipeline.run(asset, custom, now).await else {
        tracing::warn!(asset, "asset not found; create a custom profile for it first");
        anyhow::bail!("no sensitivity profile available for {asset}");
    };

    println!("{}", serde_json::to_string_pretty(&summary(&outcome))?);

    let owner_id = owner.as_ref().map_or(Uuid::nil(), |o| o.id);
    let new_report = outcome.new_report(owner_id);

    let report_id = match &pool {
        Some(pool) => {
            let id = reports::save_report(pool, &new_report, now).await?;
            tracing::info!(report_id = %id, asset = %new_report.token_name, "report saved");
            Some(id)
        }
        None => {
            tracing::info!(asset = %new_report.token_name, dry_run = true, "report not saved");
            None
        }
    };

    if let Some(out) = &args.pdf_out {
        let report = new_report.into_report(report_id.unwrap_or_else(Uuid::nil), now);
        write_pdf(&report, owner.as_ref(), out).await?;
        if let (Some(pool), Some(id)) = (&pool, report_id) {
            reports::set_pdf_path(pool, id, &out.to_string_lossy()).await?;
        }
    }

    Ok(())
}

fn summary(outcome: &AnalysisOutcome) -> serde_json::Value {
    serde_json::json!({
        "asset_name": outcome.asset.name,
        "symbol": outcome.asset.symbol,
        "profile_source": outcome.asset.source,
        "probabilities": outcome.probabilities(),
        "confidence_level": outcome.confidence(),
        "macro_events_analyzed": outcome.events.len(),
        "narratives": outcome.narratives,
        "most_likely_scenario": outcome.most_likely_scenario,
        "factor_breakdown": outcome.factor_breakdown(),
    })
}

async fn write_pdf(
    report: &stratify_core::domain::report::Report,
    owner: Option<&User>,
    out: &std::path::Path,
) -> anyhow::Result<()> {
    let rendered = pdf::render_report(
        report,
        RenderContext {
            owner_email: owner.map_or("command line", |u| u.email.as_str()),
            macro_summary: pdf::DEFAULT_MACRO_SUMMARY,
            generated_at: report.created_at,
        },
    )?;

    let dir = out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let filename = out
        .file_name()
        .and_then(|f| f.to_str())
        .with_context(|| format!("--pdf-out has no file name: {}", out.display()))?;
    let path = pdf::write_report_file(dir, filename, &rendered.bytes).await?;
    tracing::info!(path = %path.display(), pages = rendered.pages, "pdf written");
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
