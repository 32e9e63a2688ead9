use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub alert_id: String,
    pub trigger_id: String,
    pub host_id: String,
    pub host: String,
    pub trigger_name: String,
    pub trigger_description: Option<String>,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub event_time: DateTimeWithTimeZone,
    pub update_time: DateTimeWithTimeZone,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTimeWithTimeZone>,
    pub resolved: bool,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub raw_json: String,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTimeWithTimeZone>,
    pub notified_group_ids: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
