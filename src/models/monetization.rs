//! Creator monetization statements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::query::FilterField;
use crate::resource::{Resource, WriteContext};
use crate::store::StatsSpec;
use crate::validation::{is_period, Checks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    Sale,
    Refund,
    Payout,
    Fee,
    Adjustment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementStatus {
    #[default]
    Pending,
    Cleared,
    Paid,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// One line of a creator's earnings statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    /// `YYYY-MM`.
    pub period: String,
    /// When the line was booked.
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Line type (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: StatementType,
    /// Gross amount. Never negative for a sale.
    pub amount: f64,
    /// Creator's share of `amount`.
    pub earnings: f64,
    /// ISO 4217 code, upper case.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub status: StatementStatus,
}

impl Resource for Statement {
    const COLLECTION: &'static str = "statements";
    const SINGULAR: &'static str = "statement";
    const PLURAL: &'static str = "statements";
    const FILTERS: &'static [FilterField] = &[
        FilterField::text("period"),
        FilterField::one_of("type", &["sale", "refund", "payout", "fee", "adjustment"]),
        FilterField::one_of("status", &["pending", "cleared", "paid"]),
        FilterField::text("orderId"),
        FilterField::date("date"),
        FilterField::number("amount"),
        FilterField::number("earnings"),
    ];
    const STATS: Option<StatsSpec> = Some(StatsSpec {
        group_by: "type",
        sum: &["amount", "earnings"],
        avg: &[],
    });

    fn normalize(&mut self, _ctx: &WriteContext<'_>) -> Result<(), AppError> {
        self.currency = self.currency.trim().to_uppercase();
        self.period = self.period.trim().to_string();
        Ok(())
    }

    fn validate(&self) -> Result<(), AppError> {
        Checks::new()
            .check(is_period(&self.period), "period must be formatted YYYY-MM")
            .finite("amount", self.amount)
            .finite("earnings", self.earnings)
            .currency("currency", &self.currency)
            .check(
                self.kind != StatementType::Sale || self.amount >= 0.0,
                "a sale cannot have a negative amount",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_requires_type_amount_and_date() {
        let missing = serde_json::from_value::<Statement>(json!({"period": "2024-05"}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_statement_validation() {
        let mut statement: Statement = serde_json::from_value(json!({
            "period": "2024-05",
            "date": "2024-05-03T10:00:00Z",
            "type": "sale",
            "amount": 49.9,
            "earnings": 44.91,
            "currency": "eur",
        }))
        .unwrap();
        statement.currency = statement.currency.to_uppercase();
        assert!(statement.validate().is_ok());
        assert_eq!(statement.status, StatementStatus::Pending);

        statement.period = "May 2024".into();
        assert!(statement.validate().is_err());
    }
}
