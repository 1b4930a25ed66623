use crate::domain::report::{
    ConfidenceLevel, HorizonProbabilities, Narratives, NewReport, Report, ReportSummary,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const REPORT_LIST_LIMIT: i64 = 20;

const REPORT_COLUMNS: &str = "id, owner_id, token_name, short_term_prob, medium_term_prob, long_term_prob, \
     short_term_narrative, medium_term_narrative, long_term_narrative, most_likely_scenario, \
     confidence_level, macro_events_analyzed, pdf_path, created_at";

type ReportRow = (
    Uuid,
    Uuid,
    String,
    f64,
    f64,
    f64,
    String,
    String,
    String,
    String,
    String,
    i32,
    Option<String>,
    DateTime<Utc>,
);

type SummaryRow = (Uuid, String, f64, f64, f64, String, DateTime<Utc>);

fn report_from_row(row: ReportRow) -> anyhow::Result<Report> {
    let (
        id,
        owner_id,
        token_name,
        short_term,
        medium_term,
        long_term,
        short,
        medium,
        long,
        most_likely_scenario,
        confidence,
        macro_events_analyzed,
        pdf_path,
        created_at,
    ) = row;

    Ok(Report {
        id,
        owner_id,
        token_name,
        probabilities: HorizonProbabilities {
            short_term,
            medium_term,
            long_term,
        },
        narratives: Narratives {
            short,
            medium,
            long,
        },
        most_likely_scenario,
        confidence: confidence
            .parse()
            .with_context(|| format!("report {id} has an invalid confidence_level"))?,
        macro_events_analyzed,
        pdf_path,
        created_at,
    })
}

fn summary_from_row(row: SummaryRow) -> anyhow::Result<ReportSummary> {
    let (id, token_name, short_term_prob, medium_term_prob, long_term_prob, confidence, created_at) =
        row;
    Ok(ReportSummary {
        id,
        token_name,
        short_term_prob,
        medium_term_prob,
        long_term_prob,
        confidence_level: confidence
            .parse::<ConfidenceLevel>()
            .with_context(|| format!("report {id} has an invalid confidence_level"))?,
        created_at,
    })
}

pub async fn save_report(
    pool: &sqlx::PgPool,
    report: &NewReport,
    created_at: DateTime<Utc>,
) -> anyhow::Result<Uuid> {
    anyhow::ensure!(
        !report.token_name.trim().is_empty(),
        "report token_name must be non-empty"
    );

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO reports (id, owner_id, token_name, short_term_prob, medium_term_prob, long_term_prob, \
           short_term_narrative, medium_term_narrative, long_term_narrative, most_likely_scenario, \
           confidence_level, macro_events_analyzed, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(report.owner_id)
    .bind(report.token_name.trim())
    .bind(report.probabilities.short_term)
    .bind(report.probabilities.medium_term)
    .bind(report.probabilities.long_term)
    .bind(&report.narratives.short)
    .bind(&report.narratives.medium)
    .bind(&report.narratives.long)
    .bind(&report.most_likely_scenario)
    .bind(report.confidence.as_str())
    .bind(report.macro_events_analyzed)
    .bind(created_at)
    .fetch_one(pool)
    .await
    .context("insert reports failed")?;

    tracing::debug!(report_id = %id, owner_id = %report.owner_id, "report saved");
    Ok(id)
}

/// Newest first, at most [`REPORT_LIST_LIMIT`].
pub async fn list_reports(pool: &sqlx::PgPool, owner_id: Uuid) -> anyhow::Result<Vec<ReportSummary>> {
    let rows: Vec<SummaryRow> = sqlx::query_as(
        "SELECT id, token_name, short_term_prob, medium_term_prob, long_term_prob, confidence_level, created_at \
         FROM reports WHERE owner_id = $1 \
         ORDER BY created_at DESC \
         LIMIT $2",
    )
    .bind(owner_id)
    .bind(REPORT_LIST_LIMIT)
    .fetch_all(pool)
    .await
    .context("select reports failed")?;

    rows.into_iter().map(summary_from_row).collect()
}

/// Only returns the report when `owner_id` owns it.
pub async fn get_report(
    pool: &sqlx::PgPool,
    id: Uuid,
    owner_id: Uuid,
) -> anyhow::Result<Option<Report>> {
    let row: Option<ReportRow> = sqlx::query_as(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 AND owner_id = $2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("select report failed")?;

    row.map(report_from_row).transpose()
}

pub async fn set_pdf_path(pool: &sqlx::PgPool, id: Uuid, pdf_path: &str) -> anyhow::Result<()> {
    let res = sqlx::query("UPDATE reports SET pdf_path = $2 WHERE id = $1")
        .bind(id)
        .bind(pdf_path)
        .execute(pool)
        .await
        .context("update reports.pdf_path failed")?;

    anyhow::ensure!(res.rows_affected() == 1, "report {id} not found");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(confidence: &str) -> ReportRow {
        (
            Uuid::nil(),
            Uuid::nil(),
            "Bitcoin".to_string(),
            0.5110,
            0.5055,
            0.5018,
            "short".to_string(),
            "medium".to_string(),
            "long".to_string(),
            "scenario".to_string(),
            confidence.to_string(),
            5,
            None,
            Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn report_row_maps_every_column() {
        let report = report_from_row(row("Medium")).unwrap();
        assert_eq!(report.token_name, "Bitcoin");
        assert_eq!(report.probabilities.medium_term, 0.5055);
        assert_eq!(report.narratives.long, "long");
        assert_eq!(report.confidence, ConfidenceLevel::Medium);
        assert_eq!(report.macro_events_analyzed, 5);
        assert!(report.pdf_path.is_none());
    }

    #[test]
    fn unknown_confidence_in_row_is_an_error() {
        assert!(report_from_row(row("Certain")).is_err());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL pointing at a Postgres server"]
    async fn report_round_trip(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let owner = crate::storage::users::create_user(&pool, "owner@test.dev", "hash")
            .await?
            .context("user should be created")?;
        let stranger = crate::storage::users::create_user(&pool, "other@test.dev", "hash")
            .await?
            .context("user should be created")?;

        let new = NewReport {
            owner_id: owner.id,
            token_name: "Bitcoin".to_string(),
            probabilities: HorizonProbabilities {
                short_term: 0.511,
                medium_term: 0.5055,
                long_term: 0.5018,
            },
            narratives: Narratives {
                short: "s".to_string(),
                medium: "m".to_string(),
                long: "l".to_string(),
            },
            most_likely_scenario: "scenario".to_string(),
            confidence: ConfidenceLevel::Low,
            macro_events_analyzed: 1,
        };
        let created_at = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let id = save_report(&pool, &new, created_at).await?;

        let got = get_report(&pool, id, owner.id).await?.context("report should exist")?;
        assert_eq!(got.probabilities, new.probabilities);
        assert_eq!(got.narratives, new.narratives);
        assert_eq!(got.confidence, ConfidenceLevel::Low);
        assert_eq!(got.created_at, created_at);

        assert!(get_report(&pool, id, stranger.id).await?.is_none());

        set_pdf_path(&pool, id, "/tmp/r.pdf").await?;
        let got = get_report(&pool, id, owner.id).await?.context("report should exist")?;
        assert_eq!(got.pdf_path.as_deref(), Some("/tmp/r.pdf"));

        let listed = list_reports(&pool, owner.id).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        Ok(())
    }
}
