use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr,
};
use thiserror::Error;
use tracing::debug;

use crate::auth::hash_password;
use crate::entities::auth_record;
use crate::entities::prelude::AuthRecord;
use crate::models::auth::AuthDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username or email already registered")]
    Duplicate,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Storage for identity records.
///
/// Callers pass already normalized usernames and emails.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<AuthDocument>, StoreError>;

    /// Persists a new identity record. Fails with [`StoreError::Duplicate`]
    /// when the username, email or uId is already taken.
    async fn create(&self, record: &AuthDocument) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct SqlAuthStore {
    database: DatabaseConnection,
}

impl SqlAuthStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

#[async_trait]
impl AuthStore for SqlAuthStore {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<AuthDocument>, StoreError> {
        assert!(!username.is_empty(), "Lookup username must be non-empty");
        assert!(!email.is_empty(), "Lookup email must be non-empty");

        let record = AuthRecord::find()
            .filter(
                Condition::any()
                    .add(auth_record::Column::Username.eq(username))
                    .add(auth_record::Column::Email.eq(email)),
            )
            .one(&self.database)
            .await?;

        Ok(record.map(into_document))
    }

    async fn create(&self, record: &AuthDocument) -> Result<(), StoreError> {
        let password = record.password.clone();
        let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| StoreError::Hashing(err.to_string()))?
            .map_err(|err| StoreError::Hashing(err.to_string()))?;

        let model = auth_record::ActiveModel {
            id: Set(record.id),
            u_id: Set(record.u_id.clone()),
            username: Set(record.username.clone()),
            email: Set(record.email.clone()),
            password: Set(hashed),
            avatar_color: Set(record.avatar_color.clone()),
            created_at: Set(record.created_at.fixed_offset()),
        };

        AuthRecord::insert(model)
            .exec(&self.database)
            .await
            .map_err(map_insert_error)?;

        debug!("Stored auth record {} (uId {})", record.id, record.u_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.ping().await?;
        Ok(())
    }
}

fn map_insert_error(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Duplicate,
        _ => StoreError::Database(err),
    }
}

fn into_document(model: auth_record::Model) -> AuthDocument {
    AuthDocument {
        id: model.id,
        u_id: model.u_id,
        username: model.username,
        email: model.email,
        password: model.password,
        avatar_color: model.avatar_color,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
