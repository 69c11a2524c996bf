//! Map raw source records onto [`Candidate`]
//!
//! Providers disagree on field names (`price`, `total_price`,
//! `avg_cost_per_person`, `price_per_night`, `title` vs `name`). This module
//! reads the known aliases and scales prices so that a candidate's price is
//! what the whole party pays.

use serde_json::{Map, Value};
use tracing::debug;

use super::SearchQuery;
use crate::domain::{Candidate, Category, Money};

/// Keys consumed into dedicated candidate fields; everything else stays in `attributes`
const CONSUMED: &[&str] = &[
    "id",
    "name",
    "title",
    "price",
    "total_price",
    "price_per_night",
    "avg_cost_per_person",
    "rating",
    "tags",
    "type",
    "cuisine",
    "location",
    "address",
    "description",
    "snippet",
];

fn number(record: &Map<String, Value>, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches(['$', '€', '£']).replace(',', "").parse().ok(),
        _ => None,
    }
}

fn text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn tags(record: &Map<String, Value>) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(Value::Array(items)) = record.get("tags") {
        tags.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
    }
    for key in ["type", "cuisine"] {
        if let Some(value) = text(record, &[key])
            && !tags.contains(&value)
        {
            tags.push(value);
        }
    }
    tags
}

/// Largest single price accepted from a source, in major units
const MAX_PRICE: f64 = 1e9;

fn sane_price(amount: f64) -> Option<Money> {
    (amount.is_finite() && amount.abs() <= MAX_PRICE).then(|| Money::from_major(amount))
}

/// Price charged to the budget for this record, `None` when unusable
fn budget_price(record: &Map<String, Value>, category: Category, query: &SearchQuery) -> Option<Money> {
    let party = query.party_size.max(1);
    let amount = match category {
        Category::Accommodation => number(record, "total_price")
            .filter(|p| *p > 0.0)
            .or_else(|| {
                number(record, "price_per_night")
                    .or_else(|| number(record, "price"))
                    .map(|nightly| nightly * f64::from(query.nights.max(1)))
            })
            .and_then(sane_price)?,
        Category::Dining => {
            let per_person = number(record, "avg_cost_per_person")
                .or_else(|| number(record, "price"))
                .unwrap_or(0.0);
            sane_price(per_person)?.checked_mul(party)?
        }
        Category::Transport => sane_price(number(record, "price")?)?.checked_mul(party)?,
        Category::Activity => sane_price(number(record, "price").unwrap_or(0.0))?.checked_mul(party)?,
    };
    (!amount.is_negative()).then_some(amount)
}

/// Normalize one raw record; `None` when the record cannot be priced
pub fn normalize_record(value: &Value, index: usize, query: &SearchQuery, provider: &str) -> Option<Candidate> {
    let record = value.as_object()?;
    let category = query.category;
    let price = budget_price(record, category, query)?;

    let id = match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("{}_{}", category, index + 1),
    };
    let name = text(record, &["name", "title"])
        .or_else(|| {
            let airline = text(record, &["airline"])?;
            Some(match text(record, &["flight_number"]) {
                Some(number) => format!("{} {}", airline, number),
                None => airline,
            })
        })
        .unwrap_or_else(|| id.clone());

    let mut candidate = Candidate::new(id, category, name, price).with_tags(tags(record));
    candidate.rating = number(record, "rating").unwrap_or(0.0).clamp(0.0, 5.0);
    candidate.location = text(record, &["location", "address"]);
    candidate.description = text(record, &["description", "snippet"]);
    candidate.provider = provider.to_string();
    candidate.attributes = record
        .iter()
        .filter(|(k, _)| !CONSUMED.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(candidate)
}

/// Normalize a provider payload: either a bare array or `{"results": [...]}`
pub fn normalize_payload(payload: &Value, query: &SearchQuery, provider: &str) -> Vec<Candidate> {
    let records = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("results").or_else(|| map.get(query.category.as_str())) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    let candidates: Vec<Candidate> = records
        .iter()
        .enumerate()
        .filter_map(|(i, v)| normalize_record(v, i, query, provider))
        .collect();
    debug!(
        category = %query.category,
        raw = records.len(),
        kept = candidates.len(),
        "normalize_payload: done"
    );
    candidates
}
