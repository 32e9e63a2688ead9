use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub member_ids: String,
    pub trigger_ids: String,
    pub host_patterns: String,
    pub severities: String,
    pub enabled: bool,
    pub priority: i32,
    pub chat_id: Option<String>,
    pub bot_token_encrypted: Option<String>,
    pub bot_token_iv: Option<String>,
    pub notify_on_resolve: bool,
    pub notify_on_acknowledge: bool,
    pub min_notification_interval_minutes: i64,
    pub alerts_matched: i64,
    pub notifications_sent: i64,
    pub last_notification_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
