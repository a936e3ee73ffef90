//! Projection of visible entries into table rows.

use serde::Serialize;
use std::io::Write;
use tracing::warn;

use crate::normalize::{money_number, ComparisonEntry};
use crate::store::{SortDirection, SortKey};

/// Receives the rendered table body; each call replaces what was there.
pub trait RenderTarget {
    fn set_content(&mut self, content: &str);
}

impl RenderTarget for String {
    fn set_content(&mut self, content: &str) {
        self.clear();
        self.push_str(content);
    }
}

/// Writes each render as a complete `<tbody>` element.
pub struct TbodyWriter {
    out: Box<dyn Write>,
}

impl TbodyWriter {
    pub fn new(out: Box<dyn Write>) -> Self {
        TbodyWriter { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl RenderTarget for TbodyWriter {
    fn set_content(&mut self, content: &str) {
        let written = writeln!(self.out, "<tbody id=\"compareBody\">\n{}\n</tbody>", content)
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "could not write table body");
        }
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whole-percent discount of `final_price` against `original`, if it is a real discount.
pub fn discount_percent(final_price: &str, original: Option<&str>) -> Option<i64> {
    let original = original.filter(|o| !o.eq_ignore_ascii_case("none"))?;
    let pct = ((1.0 - money_number(final_price) / money_number(original)) * 100.0).round();
    (pct.is_finite() && pct > 0.0).then_some(pct as i64)
}

/// One table row, every text field already escaped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub name: String,
    pub account_size: String,
    pub steps: String,
    pub activation_fee: String,
    pub contracts: String,
    pub profit_target: String,
    pub daily_loss: String,
    pub max_loss: String,
    pub profit_split: String,
    pub payout_freq: String,
    pub price_original: Option<String>,
    pub price_amount: String,
    pub discount_badge: Option<String>,
    pub price_type: String,
    pub buy_url: String,
}

impl DisplayRow {
    pub fn from_entry(e: &ComparisonEntry) -> Self {
        DisplayRow {
            name: escape_html(&e.name),
            account_size: escape_html(&e.account_size),
            steps: escape_html(&e.steps),
            activation_fee: escape_html(&e.activation_fee),
            contracts: format!("{} | {}", e.max_contracts.minis, e.max_contracts.micros),
            profit_target: escape_html(&e.profit_target),
            daily_loss: escape_html(&e.daily_loss),
            max_loss: escape_html(&e.max_loss),
            profit_split: escape_html(&e.profit_split),
            payout_freq: escape_html(&e.payout_freq),
            price_original: e.price_original.as_deref().map(escape_html),
            price_amount: escape_html(&e.price_amount),
            discount_badge: discount_percent(&e.price_amount, e.price_original.as_deref())
                .map(|pct| format!("-{}%", pct)),
            price_type: escape_html(&e.price_type),
            buy_url: escape_html(&e.buy_url),
        }
    }

    pub fn to_html(&self) -> String {
        let old = self
            .price_original
            .as_ref()
            .map(|p| format!("<span class=\"price-old\">{}</span>", p))
            .unwrap_or_default();
        let badge = self
            .discount_badge
            .as_ref()
            .map(|b| format!("<span class=\"price-badge\">{}</span>", b))
            .unwrap_or_default();

        let mut html = String::from("<tr>");
        for cell in [
            &self.name,
            &self.account_size,
            &self.steps,
            &self.activation_fee,
            &self.contracts,
            &self.profit_target,
            &self.daily_loss,
            &self.max_loss,
            &self.profit_split,
            &self.payout_freq,
        ] {
            html.push_str(&format!("<td>{}</td>", cell));
        }
        html.push_str(&format!(
            "<td>{}<strong class=\"price-new\">{}</strong>{}<div class=\"muted\">{}</div></td>",
            old, self.price_amount, badge, self.price_type
        ));
        html.push_str(&format!(
            "<td><a class=\"btn-primary\" href=\"{}\" target=\"_blank\" rel=\"noopener\">Buy</a></td>",
            self.buy_url
        ));
        html.push_str("</tr>");
        html
    }
}

pub fn render_rows(entries: &[&ComparisonEntry]) -> Vec<DisplayRow> {
    entries.iter().map(|e| DisplayRow::from_entry(e)).collect()
}

/// Full `<tbody>` content for the visible entries.
pub fn render_tbody(entries: &[&ComparisonEntry]) -> String {
    render_rows(entries).iter().map(DisplayRow::to_html).collect::<Vec<_>>().join("\n")
}

fn column_title(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "Firm",
        SortKey::AccountSize => "Account",
        SortKey::Steps => "Steps",
        SortKey::ActivationFee => "Activation Fee",
        SortKey::MaxContracts => "Max Contracts",
        SortKey::ProfitTarget => "Profit Target",
        SortKey::DailyLoss => "Daily Loss",
        SortKey::MaxLoss => "Max Loss",
        SortKey::ProfitSplit => "Profit Split",
        SortKey::PayoutFreq => "Payout",
        SortKey::PriceAmount => "Price",
    }
}

/// Sortable header row; only the active column carries a sorted class.
pub fn render_thead(state: impl Fn(SortKey) -> Option<SortDirection>) -> String {
    let mut html = String::from("<thead><tr>");
    for key in SortKey::COLUMNS {
        let class = state(key)
            .map(|dir| format!(" class=\"{}\"", dir.css_class()))
            .unwrap_or_default();
        html.push_str(&format!("<th data-sort=\"{}\"{}>{}</th>", key.attr(), class, column_title(key)));
    }
    html.push_str("<th></th></tr></thead>");
    html
}

const TEXT_HEADERS: [&str; 12] = [
    "Firm", "Size", "Steps", "Activation", "Contracts", "Target", "Daily Loss", "Max Loss", "Split", "Payout", "Price", "Type",
];

/// Plain-text table for terminals. Values are printed unescaped.
pub fn render_text(entries: &[&ComparisonEntry]) -> String {
    let rows: Vec<[String; 12]> = entries
        .iter()
        .map(|e| {
            let mut price = e.price_amount.clone();
            if let Some(orig) = &e.price_original {
                price = format!("{} (was {})", price, orig);
            }
            if let Some(pct) = discount_percent(&e.price_amount, e.price_original.as_deref()) {
                price = format!("{} -{}%", price, pct);
            }
            [
                e.name.clone(),
                e.account_size.clone(),
                e.steps.clone(),
                e.activation_fee.clone(),
                format!("{} | {}", e.max_contracts.minis, e.max_contracts.micros),
                e.profit_target.clone(),
                e.daily_loss.clone(),
                e.max_loss.clone(),
                e.profit_split.clone(),
                e.payout_freq.clone(),
                price,
                e.price_type.clone(),
            ]
        })
        .collect();

    let mut widths = TEXT_HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let headers = TEXT_HEADERS.map(String::from);
    let mut out = line(&headers[..]);
    for row in &rows {
        out.push('\n');
        out.push_str(&line(&row[..]));
    }
    out
}
