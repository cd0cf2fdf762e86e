//! Structured transaction fields and the tolerant conversions used to build them.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, ValidationError};

/// Canonical layout for transaction times.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_LAYOUTS: &[&str] = &[
    TIME_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y年%m月%d日 %H:%M:%S",
    "%Y年%m月%d日 %H:%M",
    "%Y年%m月%d日%H:%M:%S",
    "%Y年%m月%d日%H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

const CURRENCY_MARKERS: &[&str] = &["CNY", "RMB", "USD", "EUR", "元", "¥", "￥", "$", "€", "£"];

/// A transaction extracted from bill text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFields {
    pub payment_method: String,
    /// Positive amount in the record's currency. Stored rounded to whole cents
    /// (half away from zero), so validation applies to the rounded value.
    pub amount: f64,
    #[serde(with = "time_format")]
    pub transaction_time: NaiveDateTime,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransactionFields {
    /// Checks domain constraints: finite amount that stays positive after rounding
    /// to cents, non-empty method and category.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_finite() {
            return Err(ValidationError::NonFiniteAmount);
        }
        if self.amount_in_cents() <= 0.0 {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }
        if self.payment_method.trim().is_empty() {
            return Err(ValidationError::EmptyField("payment_method"));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::EmptyField("category"));
        }
        Ok(())
    }

    /// Amount rounded to whole cents; this is the value persisted.
    pub fn amount_in_cents(&self) -> f64 {
        (self.amount * 100.0).round() / 100.0
    }

    pub fn formatted_time(&self) -> String {
        self.transaction_time.format(TIME_FORMAT).to_string()
    }
}

/// Loosely-typed fields as a model tends to return them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFields {
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default, alias = "transactionTime", alias = "time")]
    pub transaction_time: Option<String>,
    #[serde(default, alias = "product_type", alias = "productType")]
    pub category: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RawFields {
    /// Normalizes into [`TransactionFields`]. Domain validation happens separately.
    pub fn into_fields(self) -> Result<TransactionFields, ParseError> {
        let amount = match self.amount {
            Some(value) => amount_from_value(&value)?,
            None => return Err(ParseError::MissingField("amount")),
        };
        let time = self
            .transaction_time
            .ok_or(ParseError::MissingField("transaction time"))?;
        let transaction_time = parse_transaction_time(&time)
            .ok_or_else(|| ParseError::Decode(format!("Unrecognized transaction time '{}'", time)))?;

        Ok(TransactionFields {
            payment_method: self.payment_method.unwrap_or_default().trim().to_string(),
            amount,
            transaction_time,
            category: self.category.unwrap_or_default().trim().to_string(),
            merchant: non_blank(self.merchant),
            description: non_blank(self.description),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn amount_from_value(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ParseError::Decode(format!("Amount out of range: {}", n))),
        Value::String(s) => parse_amount(s)
            .ok_or_else(|| ParseError::Decode(format!("Unrecognized amount '{}'", s))),
        other => Err(ParseError::Decode(format!("Unexpected amount type: {}", other))),
    }
}

/// Parses an amount such as `¥1,288.00`, `-5`, or `18.5元`.
pub fn parse_amount(input: &str) -> Option<f64> {
    let mut cleaned = input.trim().to_string();
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Parses a transaction time in any of the accepted layouts. Date-only values mean midnight.
pub fn parse_transaction_time(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(input, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(input, layout).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

mod time_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(super::TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_transaction_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid transaction time '{}'", raw)))
    }
}
