use std::collections::HashMap;

use async_trait::async_trait;

use crate::{core::model::Account, ports::account_store::AccountStore};

/// In-memory account lookup seeded from the configuration, standing in for
/// the persistent store behind the aggregation's primary record.
pub struct InMemoryAccountStore {
    accounts: HashMap<u64, Account>,
}

impl InMemoryAccountStore {
    pub fn new(seed: impl IntoIterator<Item = Account>) -> Self {
        let accounts = seed
            .into_iter()
            .map(|account| (account.customer_id, account))
            .collect();
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_customer_id(&self, customer_id: u64) -> Option<Account> {
        self.accounts.get(&customer_id).cloned()
    }
}
