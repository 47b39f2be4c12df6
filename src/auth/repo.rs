use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        identity::{InsertViolation, Provider, VerifiedIdentity},
        repo_types::{Role, User},
    },
    error::{unique_violation, ApiError},
};

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, google_id, facebook_id, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, google_id, facebook_id, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_provider(
        db: &PgPool,
        provider: Provider,
        provider_user_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let query = match provider {
            Provider::Google => {
                r#"
                SELECT id, username, email, password_hash, role, google_id, facebook_id, created_at
                FROM users
                WHERE google_id = $1
                "#
            }
            Provider::Facebook => {
                r#"
                SELECT id, username, email, password_hash, role, google_id, facebook_id, created_at
                FROM users
                WHERE facebook_id = $1
                "#
            }
        };
        let user = sqlx::query_as::<_, User>(query)
            .bind(provider_user_id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Create a password-based user.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, role, google_id, facebook_id, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await
    }

    async fn create_external(
        db: &PgPool,
        identity: &VerifiedIdentity,
        email: &str,
    ) -> Result<User, sqlx::Error> {
        let query = match identity.provider {
            Provider::Google => {
                r#"
                INSERT INTO users (username, email, role, google_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, password_hash, role, google_id, facebook_id, created_at
                "#
            }
            Provider::Facebook => {
                r#"
                INSERT INTO users (username, email, role, facebook_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, email, password_hash, role, google_id, facebook_id, created_at
                "#
            }
        };
        sqlx::query_as::<_, User>(query)
            .bind(&identity.display_name)
            .bind(email)
            .bind(Role::Student)
            .bind(&identity.provider_user_id)
            .fetch_one(db)
            .await
    }

    /// Create-or-fetch for a provider-verified identity.
    ///
    /// The unique provider-id column is the source of truth for concurrent
    /// first logins: an insert that loses the race fails on that constraint
    /// and is retried as a lookup. A unique violation on the email column
    /// means the address belongs to an account with a different login method.
    pub async fn resolve_external(
        db: &PgPool,
        identity: &VerifiedIdentity,
    ) -> Result<User, ApiError> {
        if let Some(user) =
            Self::find_by_provider(db, identity.provider, &identity.provider_user_id).await?
        {
            return Ok(user);
        }

        // normalized like the register/login paths so the email constraint
        // can catch cross-method collisions
        let email = identity.canonical_email();

        match Self::create_external(db, identity, &email).await {
            Ok(user) => {
                info!(user_id = %user.id, provider = ?identity.provider, "external user created");
                Ok(user)
            }
            Err(e) => {
                let constraint = unique_violation(&e);
                match identity
                    .provider
                    .classify_insert_violation(constraint.as_deref())
                {
                    InsertViolation::LostRace => {
                        Self::find_by_provider(db, identity.provider, &identity.provider_user_id)
                            .await?
                            .ok_or(ApiError::Store(e))
                    }
                    InsertViolation::EmailTaken => Err(ApiError::Conflict(
                        "Email already registered with a different login method".into(),
                    )),
                    InsertViolation::Other => Err(e.into()),
                }
            }
        }
    }
}
