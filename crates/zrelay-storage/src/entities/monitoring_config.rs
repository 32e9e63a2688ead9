use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "monitoring_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub api_url: Option<String>,
    pub api_token_encrypted: Option<String>,
    pub api_token_iv: Option<String>,
    pub username: Option<String>,
    pub password_encrypted: Option<String>,
    pub password_iv: Option<String>,
    pub enabled: bool,
    pub poll_interval_minutes: i32,
    pub last_poll_at: Option<DateTimeWithTimeZone>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTimeWithTimeZone>,
    pub total_polls: i64,
    pub successful_polls: i64,
    pub failed_polls: i64,
    pub alerts_processed: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
