//! Persisted authentication record created at signup.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Externally visible numeric id, stored as its decimal string
    #[sea_orm(unique, column_type = "String(StringLen::N(12))")]
    pub u_id: String,
    #[sea_orm(unique, column_type = "String(StringLen::N(64))")]
    pub username: String,
    #[sea_orm(unique, column_type = "String(StringLen::N(254))")]
    pub email: String,
    /// Argon2id PHC string, never the plain password
    #[sea_orm(column_type = "Text")]
    pub password: String,
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub avatar_color: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
