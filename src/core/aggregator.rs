//! Customer-details aggregation: one local lookup plus a two-way fan-out.
//!
//! The whole operation runs under the circuit breaker. On the primary path
//! both peer calls run concurrently and either failure fails the entire call
//! (no partial merge is ever returned); that failure feeds the breaker and
//! the degraded path is served instead. The degraded path keeps the local
//! lookup and the loans call but leaves `cards` out of the result entirely.
use std::sync::Arc;

use crate::{
    core::{
        circuit_breaker::BreakerRegistry,
        correlation::CorrelationContext,
        dispatch::{DispatchError, Dispatcher},
        model::{Customer, CustomerDetails},
    },
    ports::account_store::AccountStore,
};

/// Breaker operation name guarding the aggregation.
pub const CUSTOMER_DETAILS_OP: &str = "customer-details";

pub struct CustomerAggregator {
    store: Arc<dyn AccountStore>,
    dispatcher: Arc<Dispatcher>,
    breakers: Arc<BreakerRegistry>,
}

impl CustomerAggregator {
    pub fn new(
        store: Arc<dyn AccountStore>,
        dispatcher: Arc<Dispatcher>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            breakers,
        }
    }

    /// Merge the local account record with the loans and cards fan-out,
    /// invoked through the breaker. Only a failure of the degraded path
    /// itself surfaces to the caller.
    pub async fn customer_details(
        &self,
        ctx: &CorrelationContext,
        customer: Customer,
    ) -> Result<CustomerDetails, DispatchError> {
        let breaker = self.breakers.get_or_create(CUSTOMER_DETAILS_OP);
        breaker
            .protect(
                || self.full_details(ctx, customer),
                || self.degraded_details(ctx, customer),
            )
            .await
    }

    async fn full_details(
        &self,
        ctx: &CorrelationContext,
        customer: Customer,
    ) -> Result<CustomerDetails, DispatchError> {
        // A missing account record does not short-circuit the fan-out; the
        // peers are queried with the same key regardless.
        let account = self.store.find_by_customer_id(customer.customer_id).await;
        let (loans, cards) = tokio::try_join!(
            self.dispatcher.fetch_loans(ctx, &customer),
            self.dispatcher.fetch_cards(ctx, &customer),
        )?;
        Ok(CustomerDetails {
            account,
            loans,
            cards: Some(cards),
        })
    }

    async fn degraded_details(
        &self,
        ctx: &CorrelationContext,
        customer: Customer,
    ) -> Result<CustomerDetails, DispatchError> {
        let account = self.store.find_by_customer_id(customer.customer_id).await;
        let loans = self.dispatcher.fetch_loans(ctx, &customer).await?;
        Ok(CustomerDetails {
            account,
            loans,
            cards: None,
        })
    }
}
