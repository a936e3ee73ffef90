//! Turns loosely-labelled spreadsheet rows into comparison entries.
//!
//! Column headers in the sheet are edited by hand and drift over time
//! ("Account Size", "account_size", "accountsize" ...), so every logical
//! field is looked up through a list of accepted spellings after both sides
//! are normalised. Unparseable values fall back to defaults instead of
//! failing the load.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::{CURRENCY_MARKER, PLACEHOLDER_URL};

static HEADER_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+|_").unwrap());
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").unwrap());
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").unwrap());
static LEADING_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+\.?[0-9]*|\.[0-9]+)").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const NO_PRICE: &str = "None";

pub const FINAL_PRICE_FIELDS: &[&str] = &["priceFinal", "finalPrice", "discountedPrice", "price final", "final price"];
pub const ORIGINAL_PRICE_FIELDS: &[&str] = &["priceOriginal", "originalPrice", "listPrice", "price original", "original price"];
pub const AMOUNT_FIELDS: &[&str] = &["priceAmount", "price", "amount"];

/// One spreadsheet row keyed by its column label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    /// Zip headers with cells; missing trailing cells become "".
    pub fn from_cells(headers: &[String], cells: Vec<String>) -> Self {
        let mut cells = cells.into_iter();
        RawRow {
            cells: headers
                .iter()
                .map(|h| (h.clone(), cells.next().unwrap_or_default()))
                .collect(),
        }
    }
}

/// Header-tolerant view over a [`RawRow`], built once per row.
pub struct FieldLookup<'a> {
    by_key: HashMap<String, &'a str>,
}

impl<'a> FieldLookup<'a> {
    pub fn new(row: &'a RawRow) -> Self {
        let mut by_key = HashMap::new();
        for (label, value) in &row.cells {
            // later duplicates win, same as assigning into an object
            by_key.insert(header_key(label), value.as_str());
        }
        FieldLookup { by_key }
    }

    /// First accepted spelling present in the row, or "" when none are.
    pub fn get(&self, names: &[&str]) -> &'a str {
        names
            .iter()
            .find_map(|name| self.by_key.get(&header_key(name)).copied())
            .unwrap_or("")
    }

    fn field(&self, name: &str) -> &'a str {
        self.get(&[name])
    }
}

pub fn header_key(label: &str) -> String {
    HEADER_NOISE.replace_all(&label.trim().to_lowercase(), "").into_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaxContracts {
    pub minis: u32,
    pub micros: u32,
}

/// A normalised comparison row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonEntry {
    pub id: String,
    pub name: String,
    pub account_size: String,
    pub steps: String,
    pub drawdown: String,
    pub activation_fee: String,
    pub max_contracts: MaxContracts,
    pub profit_target: String,
    pub daily_loss: String,
    pub max_loss: String,
    pub profit_split: String,
    pub payout_freq: String,
    pub price_type: String,
    /// Final (possibly discounted) price.
    pub price_amount: String,
    /// Pre-discount price, shown struck through.
    pub price_original: Option<String>,
    pub buy_url: String,
    #[serde(skip)]
    pub sort_price: f64,
}

impl ComparisonEntry {
    pub fn from_raw(row: &RawRow) -> Self {
        let f = FieldLookup::new(row);

        let final_raw = f.get(FINAL_PRICE_FIELDS).trim();
        let original_raw = f.get(ORIGINAL_PRICE_FIELDS).trim();
        let amount_raw = f.get(AMOUNT_FIELDS).trim();

        // An explicit final price outranks the generic amount for both display and sorting.
        let price_raw = if final_raw.is_empty() { amount_raw } else { final_raw };
        let price_original = (!original_raw.is_empty()).then(|| money_display(original_raw));

        let name = f.field("name").trim().to_string();
        let account_size = f.field("accountSize").trim().to_string();

        ComparisonEntry {
            id: entry_id(&name, &account_size),
            steps: f.field("steps").trim().to_string(),
            drawdown: f.field("drawdown").trim().to_string(),
            activation_fee: money_display(f.field("activationFee")),
            max_contracts: MaxContracts {
                minis: count(f.field("minis")),
                micros: count(f.field("micros")),
            },
            profit_target: money_display(f.field("profitTarget")),
            daily_loss: money_display(f.field("dailyLoss")),
            max_loss: money_display(f.field("maxLoss")),
            profit_split: percent_display(f.field("profitSplit")),
            payout_freq: f.field("payoutFreq").trim().to_string(),
            price_type: f.field("priceType").trim().to_string(),
            price_amount: money_display(price_raw),
            price_original,
            buy_url: non_empty_or(f.field("buyUrl"), PLACEHOLDER_URL),
            sort_price: money_number(price_raw),
            name,
            account_size,
        }
    }
}

pub fn normalize_all(rows: &[RawRow]) -> Vec<ComparisonEntry> {
    rows.iter().map(ComparisonEntry::from_raw).collect()
}

fn entry_id(name: &str, account_size: &str) -> String {
    let name = if name.is_empty() { "firm" } else { name };
    let raw = format!("{}-{}", name, account_size).to_lowercase();
    WHITESPACE.replace_all(&raw, "-").into_owned()
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() { fallback.to_string() } else { value.to_string() }
}

/// Leading decimal of `s` once everything but digits and '.' is removed.
fn leading_decimal(s: &str) -> Option<String> {
    let stripped = NON_NUMERIC.replace_all(s, "");
    LEADING_DECIMAL
        .find(&stripped)
        .map(|m| m.as_str().to_string())
}

/// `"None"` for empty, "none" or digit-free values, otherwise `$<amount>`.
pub fn money_display(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case(NO_PRICE) || !s.chars().any(|c| c.is_ascii_digit()) {
        return NO_PRICE.to_string();
    }
    match leading_decimal(s) {
        Some(body) => format!("{CURRENCY_MARKER}{body}"),
        None => NO_PRICE.to_string(),
    }
}

/// Numeric amount of a money value; 0 for "None" and anything unparseable.
pub fn money_number(s: &str) -> f64 {
    if s.trim().eq_ignore_ascii_case(NO_PRICE) {
        return 0.0;
    }
    decimal_number(s)
}

pub fn decimal_number(s: &str) -> f64 {
    leading_decimal(s)
        .and_then(|body| body.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

pub fn percent_display(raw: &str) -> String {
    format!("{}%", format_number(decimal_number(raw)))
}

/// Digits only, 0 when there are none (or too many to fit).
pub fn count(raw: &str) -> u32 {
    NON_DIGIT.replace_all(raw, "").parse().unwrap_or(0)
}

/// Formats whole numbers without a trailing ".0".
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
