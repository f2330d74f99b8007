use async_trait::async_trait;

use crate::core::model::Account;

/// AccountStore is the local lookup of the primary record by customer id.
/// Persistence is an external collaborator; the aggregation path only needs
/// this one read. A missing record is a legitimate answer, not an error.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn find_by_customer_id(&self, customer_id: u64) -> Option<Account>;
}
