use crate::domain::user::User;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

type UserRow = (Uuid, String, String, DateTime<Utc>);

fn user_from_row((id, email, hashed_password, created_at): UserRow) -> User {
    User {
        id,
        email,
        hashed_password,
        created_at,
    }
}

/// Inserts a user. Returns `None` when the (already normalised) email is taken.
pub async fn create_user(
    pool: &sqlx::PgPool,
    email: &str,
    hashed_password: &str,
) -> anyhow::Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3) \
         ON CONFLICT (email) DO NOTHING \
         RETURNING id, email, hashed_password, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hashed_password)
    .fetch_optional(pool)
    .await
    .context("insert users failed")?;

    Ok(row.map(user_from_row))
}

pub async fn find_user_by_email(pool: &sqlx::PgPool, email: &str) -> anyhow::Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, hashed_password, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("select users by email failed")?;

    Ok(row.map(user_from_row))
}

pub async fn find_user_by_id(pool: &sqlx::PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, hashed_password, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("select users by id failed")?;

    Ok(row.map(user_from_row))
}
