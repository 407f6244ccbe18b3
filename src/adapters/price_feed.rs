use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::models::{Brand, FuelKind};

const FUEL_KEYS: &[&str] = &["fuelKind", "fuel_kind", "fuel", "product"];
const PRICE_KEYS: &[&str] = &["price", "retailPrice", "price_lkr", "Price (LKR)"];
const BRAND_KEYS: &[&str] = &["brand", "supplier", "company"];
const LIST_KEYS: &[&str] = &["prices", "items", "data"];

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("price feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("price feed payload must be a list of entries")]
    InvalidPayload,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PriceEntryError {
    #[error("price entry must be a JSON object")]
    InvalidEntryType,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown fuel kind: {0}")]
    UnknownFuelKind(String),
    #[error("unknown brand: {0}")]
    UnknownBrand(String),
    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub fuel_kind: FuelKind,
    pub brand: Option<Brand>,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    http: reqwest::Client,
    url: String,
}

impl HttpPriceFeed {
    pub fn new(url: &str) -> Result<Self, PriceFeedError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    pub async fn fetch_entries(&self) -> Result<Vec<Value>, PriceFeedError> {
        let payload: Value = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        entries_from_payload(payload)
    }
}

/// Accepts a bare array or an object wrapping the array under a list key.
pub fn entries_from_payload(payload: Value) -> Result<Vec<Value>, PriceFeedError> {
    match payload {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut obj) => LIST_KEYS
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or(PriceFeedError::InvalidPayload),
        _ => Err(PriceFeedError::InvalidPayload),
    }
}

pub fn parse_price_entry(entry: &Value) -> Result<PriceEntry, PriceEntryError> {
    let obj = entry.as_object().ok_or(PriceEntryError::InvalidEntryType)?;

    let raw_fuel = find_text(obj, FUEL_KEYS).ok_or(PriceEntryError::MissingField("fuelKind"))?;
    let fuel_kind = parse_fuel_kind(&raw_fuel)
        .ok_or_else(|| PriceEntryError::UnknownFuelKind(raw_fuel.clone()))?;

    let price = find_number(obj, PRICE_KEYS).ok_or(PriceEntryError::MissingField("price"))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(PriceEntryError::InvalidPrice(price));
    }

    let brand = match find_text(obj, BRAND_KEYS) {
        Some(raw) => Some(parse_brand(&raw).ok_or(PriceEntryError::UnknownBrand(raw))?),
        None => None,
    };

    Ok(PriceEntry {
        fuel_kind,
        brand,
        price,
    })
}

fn parse_fuel_kind(raw: &str) -> Option<FuelKind> {
    match normalize_key(raw).as_str() {
        "petrol92" | "octane92" | "lp92" => Some(FuelKind::Petrol92),
        "petrol95" | "octane95" | "lp95" => Some(FuelKind::Petrol95),
        "autodiesel" | "diesel" | "lad" => Some(FuelKind::AutoDiesel),
        "superdiesel" | "lsd" => Some(FuelKind::SuperDiesel),
        _ => None,
    }
}

fn parse_brand(raw: &str) -> Option<Brand> {
    match normalize_key(raw).as_str() {
        "ceypetco" | "cpc" | "ceylonpetroleum" => Some(Brand::Ceypetco),
        "lankaioc" | "ioc" => Some(Brand::LankaIoc),
        "sinopec" => Some(Brand::Sinopec),
        "other" => Some(Brand::Other),
        _ => None,
    }
}

fn find_value<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    if let Some(value) = aliases.iter().find_map(|alias| obj.get(*alias)) {
        return Some(value);
    }

    let normalized_aliases: Vec<String> =
        aliases.iter().map(|alias| normalize_key(alias)).collect();

    obj.iter().find_map(|(key, value)| {
        let normalized_key = normalize_key(key);
        normalized_aliases
            .iter()
            .any(|alias| alias == &normalized_key)
            .then_some(value)
    })
}

fn find_text(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match find_value(obj, aliases)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn find_number(obj: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    match find_value(obj, aliases)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number_from_text(text),
        _ => None,
    }
}

fn normalize_key(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_number_from_text(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let digits = cleaned.trim_start_matches(|c: char| !c.is_ascii_digit());
    let end = digits
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(digits.len());
    digits[..end].trim_end_matches('.').parse().ok()
}
