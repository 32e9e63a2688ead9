use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::subscriber::{self, Column, Entity};
use crate::store::Store;

/// A group member's registered personal messaging handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberRow {
    pub id: String,
    pub member_id: String,
    pub display_name: Option<String>,
    pub chat_id: String,
    pub enabled: bool,
}

fn to_row(m: subscriber::Model) -> SubscriberRow {
    SubscriberRow {
        id: m.id,
        member_id: m.member_id,
        display_name: m.display_name,
        chat_id: m.chat_id,
        enabled: m.enabled,
    }
}

impl Store {
    /// Registers or refreshes a member's personal chat handle.
    pub async fn upsert_subscriber(
        &self,
        member_id: &str,
        display_name: Option<&str>,
        chat_id: &str,
    ) -> Result<SubscriberRow> {
        let now = Utc::now().fixed_offset();
        let existing = Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .one(self.db())
            .await?;
        match existing {
            Some(model) => {
                let mut am: subscriber::ActiveModel = model.into();
                am.display_name = Set(display_name.map(str::to_string));
                am.chat_id = Set(chat_id.to_string());
                am.enabled = Set(true);
                am.updated_at = Set(now);
                Ok(to_row(am.update(self.db()).await?))
            }
            None => {
                let am = subscriber::ActiveModel {
                    id: Set(zrelay_common::id::next_id()),
                    member_id: Set(member_id.to_string()),
                    display_name: Set(display_name.map(str::to_string)),
                    chat_id: Set(chat_id.to_string()),
                    enabled: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(to_row(am.insert(self.db()).await?))
            }
        }
    }

    /// The personal chat handle for a member, if registered and enabled.
    pub async fn chat_handle_for(&self, member_id: &str) -> Result<Option<String>> {
        let model = Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .filter(Column::Enabled.eq(true))
            .one(self.db())
            .await?;
        Ok(model.map(|m| m.chat_id))
    }

    pub async fn list_subscribers(&self) -> Result<Vec<SubscriberRow>> {
        let rows = Entity::find()
            .order_by(Column::MemberId, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn delete_subscriber(&self, member_id: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::MemberId.eq(member_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }
}
