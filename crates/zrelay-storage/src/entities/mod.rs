pub mod alert;
pub mod monitoring_config;
pub mod notification_group;
pub mod subscriber;
