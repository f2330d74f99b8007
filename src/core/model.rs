//! Domain records exchanged with the peer banking services.
//!
//! Field names serialize in camelCase to stay wire-compatible with the
//! existing accounts / loans / cards services.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lookup key supplied by the caller. The same key is used verbatim by the
/// local account lookup and by both downstream calls so the fan-out stays
/// consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: u64,
}

/// Primary record held by the local account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_number: u64,
    pub customer_id: u64,
    pub account_type: String,
    pub branch_address: String,
    pub create_dt: NaiveDate,
}

/// One loan record as returned by the loans service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub loan_number: u64,
    pub customer_id: u64,
    pub start_dt: NaiveDate,
    pub loan_type: String,
    pub total_loan: i64,
    pub amount_paid: i64,
    pub outstanding_amount: i64,
}

/// One card record as returned by the cards service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_number: String,
    pub customer_id: u64,
    pub card_type: String,
    pub total_limit: i64,
    pub amount_used: i64,
    pub available_amount: i64,
}

/// Composite response of the aggregation endpoint.
///
/// `cards` is `None` (and absent from the JSON body) when the circuit breaker
/// served the degraded path; an empty `Some(vec![])` means the cards service
/// answered and the customer simply has no cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub account: Option<Account>,
    pub loans: Vec<Loan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
}
