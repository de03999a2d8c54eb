//! Operator token storage and verification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use vigil_core::{AuthSession, Error, OperatorRole, Result, TokenVerifier};

/// PostgreSQL operator token repository.
pub struct PgTokenRepository {
    pool: Pool<Postgres>,
}

impl PgTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert OperatorRole to string for database.
    fn role_to_str(role: OperatorRole) -> &'static str {
        match role {
            OperatorRole::Clinician => "clinician",
            OperatorRole::Admin => "admin",
            OperatorRole::Patient => "patient",
        }
    }

    /// Convert string from database to OperatorRole.
    fn str_to_role(s: &str) -> OperatorRole {
        match s {
            "clinician" => OperatorRole::Clinician,
            "admin" => OperatorRole::Admin,
            "patient" => OperatorRole::Patient,
            _ => OperatorRole::Clinician, // fallback
        }
    }

    /// Register a bearer token for an operator session.
    ///
    /// `expires_at` of `None` issues a token without expiry.
    pub async fn register(
        &self,
        token: &str,
        session: &AuthSession,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO operator_token (token, operator_id, organization_id, role, expires_at)
             VALUES ($1, $2, $3, $4::operator_role, $5)
             ON CONFLICT (token) DO UPDATE
             SET operator_id = EXCLUDED.operator_id,
                 organization_id = EXCLUDED.organization_id,
                 role = EXCLUDED.role,
                 expires_at = EXCLUDED.expires_at",
        )
        .bind(token)
        .bind(session.operator_id)
        .bind(session.organization_id)
        .bind(Self::role_to_str(session.role))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    /// Revoke a token. Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM operator_token WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for PgTokenRepository {
    async fn resolve(&self, token: &str) -> Result<Option<AuthSession>> {
        let row = sqlx::query(
            "SELECT operator_id, organization_id, role::text
             FROM operator_token
             WHERE token = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| AuthSession {
            operator_id: row.get("operator_id"),
            organization_id: row.get("organization_id"),
            role: Self::str_to_role(row.get("role")),
        }))
    }
}
