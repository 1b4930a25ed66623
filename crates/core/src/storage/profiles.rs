use crate::domain::profile::{CustomProfile, SensitivityProfile};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, owner_id, token_name, token_type, volatility_level, liquidity_sensitivity, \
     regulation_sensitivity, interest_rate_sensitivity, geopolitical_sensitivity, created_at";

type ProfileRow = (
    Uuid,
    Uuid,
    String,
    Option<String>,
    f64,
    f64,
    f64,
    f64,
    f64,
    DateTime<Utc>,
);

fn profile_from_row(row: ProfileRow) -> CustomProfile {
    let (id, owner_id, token_name, token_type, vol, liq, reg, rate, geo, created_at) = row;
    CustomProfile {
        id,
        owner_id,
        token_name,
        token_type,
        profile: SensitivityProfile::new(vol, liq, reg, rate, geo),
        created_at,
    }
}

/// Stores a custom profile. Weights are clamped into [0, 1] before insert.
pub async fn create_profile(
    pool: &sqlx::PgPool,
    owner_id: Uuid,
    token_name: &str,
    token_type: Option<&str>,
    profile: &SensitivityProfile,
) -> anyhow::Result<CustomProfile> {
    let token_name = token_name.trim();
    anyhow::ensure!(!token_name.is_empty(), "token_name must be non-empty");
    let p = profile.clamped();

    let row: ProfileRow = sqlx::query_as(&format!(
        "INSERT INTO token_profiles (id, owner_id, token_name, token_type, volatility_level, liquidity_sensitivity, \
           regulation_sensitivity, interest_rate_sensitivity, geopolitical_sensitivity) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(token_name)
    .bind(token_type.map(str::trim).filter(|s| !s.is_empty()))
    .bind(p.volatility)
    .bind(p.liquidity)
    .bind(p.regulation)
    .bind(p.interest_rate)
    .bind(p.geopolitical)
    .fetch_one(pool)
    .await
    .context("insert token_profiles failed")?;

    Ok(profile_from_row(row))
}

/// Case-insensitive name match; the newest profile wins when there are several.
pub async fn find_profile_for_owner(
    pool: &sqlx::PgPool,
    owner_id: Uuid,
    token_name: &str,
) -> anyhow::Result<Option<CustomProfile>> {
    let row: Option<ProfileRow> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM token_profiles \
         WHERE owner_id = $1 AND lower(token_name) = lower($2) \
         ORDER BY created_at DESC \
         LIMIT 1"
    ))
    .bind(owner_id)
    .bind(token_name.trim())
    .fetch_optional(pool)
    .await
    .context("select token_profiles by name failed")?;

    Ok(row.map(profile_from_row))
}

pub async fn list_profiles(pool: &sqlx::PgPool, owner_id: Uuid) -> anyhow::Result<Vec<CustomProfile>> {
    let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS} FROM token_profiles WHERE owner_id = $1 ORDER BY created_at DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("select token_profiles failed")?;

    Ok(rows.into_iter().map(profile_from_row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_weights_are_clamped_on_read() {
        let row: ProfileRow = (
            Uuid::nil(),
            Uuid::nil(),
            "MyToken".to_string(),
            Some("utility".to_string()),
            1.4,
            0.2,
            0.3,
            -0.1,
            0.5,
            Utc::now(),
        );
        let p = profile_from_row(row);
        assert_eq!(p.profile.volatility, 1.0);
        assert_eq!(p.profile.interest_rate, 0.0);
        assert_eq!(p.token_type.as_deref(), Some("utility"));
    }
}
