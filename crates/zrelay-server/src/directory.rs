use std::sync::Arc;

use async_trait::async_trait;
use zrelay_notify::SubscriberDirectory;
use zrelay_storage::Store;

/// Store-backed lookup from group member ids to personal chat handles.
pub struct StoreSubscriberDirectory {
    store: Arc<Store>,
}

impl StoreSubscriberDirectory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubscriberDirectory for StoreSubscriberDirectory {
    async fn chat_handle(&self, member_id: &str) -> anyhow::Result<Option<String>> {
        self.store.chat_handle_for(member_id).await
    }
}
