//! Comparison table state: all entries plus the active filter and sort.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

use crate::config::ALL_SENTINEL;
use crate::normalize::{count, decimal_number, money_number, ComparisonEntry};
use crate::render::{render_tbody, RenderTarget};

static INSTANT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)instant").unwrap());

/// Payout frequency ranks; lower sorts earlier.
pub const PAYOUT_RANKS: &[(&str, u32)] = &[
    ("On-Demand", 0),
    ("Daily", 1),
    ("Weekly", 2),
    ("Biweekly", 3),
    ("Monthly", 4),
];

/// Rank for frequencies missing from [`PAYOUT_RANKS`]: after all known ones.
pub const UNRANKED_PAYOUT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    AccountSize,
    Steps,
    ActivationFee,
    MaxContracts,
    ProfitTarget,
    DailyLoss,
    MaxLoss,
    ProfitSplit,
    PayoutFreq,
    PriceAmount,
}

impl SortKey {
    /// Sortable columns in table order.
    pub const COLUMNS: [SortKey; 11] = [
        SortKey::Name,
        SortKey::AccountSize,
        SortKey::Steps,
        SortKey::ActivationFee,
        SortKey::MaxContracts,
        SortKey::ProfitTarget,
        SortKey::DailyLoss,
        SortKey::MaxLoss,
        SortKey::ProfitSplit,
        SortKey::PayoutFreq,
        SortKey::PriceAmount,
    ];

    /// Parse a column header's `data-sort` attribute.
    pub fn from_attr(attr: &str) -> Option<SortKey> {
        let key = match attr {
            "name" => SortKey::Name,
            "accountSize" => SortKey::AccountSize,
            "steps" => SortKey::Steps,
            "activationFee" => SortKey::ActivationFee,
            "maxContracts" => SortKey::MaxContracts,
            "profitTarget" => SortKey::ProfitTarget,
            "dailyLoss" => SortKey::DailyLoss,
            "maxLoss" => SortKey::MaxLoss,
            "profitSplit" => SortKey::ProfitSplit,
            "payoutFreq" => SortKey::PayoutFreq,
            "priceAmount" => SortKey::PriceAmount,
            _ => return None,
        };
        Some(key)
    }

    pub fn attr(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::AccountSize => "accountSize",
            SortKey::Steps => "steps",
            SortKey::ActivationFee => "activationFee",
            SortKey::MaxContracts => "maxContracts",
            SortKey::ProfitTarget => "profitTarget",
            SortKey::DailyLoss => "dailyLoss",
            SortKey::MaxLoss => "maxLoss",
            SortKey::ProfitSplit => "profitSplit",
            SortKey::PayoutFreq => "payoutFreq",
            SortKey::PriceAmount => "priceAmount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Header class for the active column.
    pub fn css_class(self) -> &'static str {
        match self {
            SortDirection::Asc => "sorted-asc",
            SortDirection::Desc => "sorted-desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCriteria {
    pub key: SortKey,
    pub dir: SortDirection,
}

impl Default for SortCriteria {
    fn default() -> Self {
        SortCriteria { key: SortKey::Name, dir: SortDirection::Asc }
    }
}

/// Facet constraints; `None` means unrestricted. All present ones must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub drawdown: Option<String>,
    pub account_size: Option<String>,
    pub steps: Option<String>,
    pub price_type: Option<String>,
}

/// A filter control value, with the "All" option and blank meaning unrestricted.
pub fn facet_value(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty() && v != ALL_SENTINEL).then(|| v.to_string())
}

impl FilterCriteria {
    pub fn from_controls(drawdown: &str, account_size: &str, steps: &str, price_type: &str) -> Self {
        FilterCriteria {
            drawdown: facet_value(drawdown),
            account_size: facet_value(account_size),
            steps: facet_value(steps),
            price_type: facet_value(price_type),
        }
    }

    pub fn matches(&self, entry: &ComparisonEntry) -> bool {
        fn ok(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }
        ok(&self.drawdown, &entry.drawdown)
            && ok(&self.account_size, &entry.account_size)
            && ok(&self.steps, &entry.steps)
            && ok(&self.price_type, &entry.price_type)
    }
}

/// Derived value a column sorts by.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            // A column always yields one variant; keep ties stable if not.
            _ => Ordering::Equal,
        }
    }
}

/// 0 for anything mentioning "instant", otherwise the step count.
pub fn steps_rank(steps: &str) -> u32 {
    if INSTANT.is_match(steps) {
        return 0;
    }
    count(steps)
}

pub fn payout_rank(freq: &str) -> u32 {
    PAYOUT_RANKS
        .iter()
        .find(|(name, _)| *name == freq)
        .map(|(_, rank)| *rank)
        .unwrap_or(UNRANKED_PAYOUT)
}

pub fn sort_value(entry: &ComparisonEntry, key: SortKey) -> SortValue {
    let n = match key {
        SortKey::Name => return SortValue::Text(entry.name.to_lowercase()),
        SortKey::AccountSize => count(&entry.account_size) as f64,
        SortKey::Steps => steps_rank(&entry.steps) as f64,
        SortKey::ActivationFee => money_number(&entry.activation_fee),
        SortKey::MaxContracts => entry.max_contracts.minis as f64,
        SortKey::ProfitTarget => money_number(&entry.profit_target),
        SortKey::DailyLoss => money_number(&entry.daily_loss),
        SortKey::MaxLoss => money_number(&entry.max_loss),
        SortKey::ProfitSplit => decimal_number(&entry.profit_split),
        SortKey::PayoutFreq => payout_rank(&entry.payout_freq) as f64,
        SortKey::PriceAmount if entry.sort_price.is_finite() => entry.sort_price,
        SortKey::PriceAmount => money_number(&entry.price_amount),
    };
    SortValue::Number(n)
}

/// Owns the loaded entries and the user's current filter/sort choice.
pub struct CompareStore {
    entries: Vec<ComparisonEntry>,
    filtered: Vec<usize>,
    filters: FilterCriteria,
    sort: SortCriteria,
    target: Option<Box<dyn RenderTarget>>,
}

impl CompareStore {
    pub fn new(entries: Vec<ComparisonEntry>) -> Self {
        let filtered = (0..entries.len()).collect();
        CompareStore {
            entries,
            filtered,
            filters: FilterCriteria::default(),
            sort: SortCriteria::default(),
            target: None,
        }
    }

    /// Attach the container that receives the table body on every change.
    pub fn with_target(mut self, target: Box<dyn RenderTarget>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn entries(&self) -> &[ComparisonEntry] {
        &self.entries
    }

    pub fn filters(&self) -> &FilterCriteria {
        &self.filters
    }

    pub fn sort(&self) -> SortCriteria {
        self.sort
    }

    /// Replace all filters; facets left out are unrestricted, not kept.
    pub fn set_filters(&mut self, criteria: FilterCriteria) {
        self.filtered = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| criteria.matches(e))
            .map(|(i, _)| i)
            .collect();
        debug!(visible = self.filtered.len(), total = self.entries.len(), ?criteria, "filters applied");
        self.filters = criteria;
        self.render();
    }

    /// Same column flips direction; a new column starts ascending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort.key == key {
            self.sort.dir = self.sort.dir.flip();
        } else {
            self.sort = SortCriteria { key, dir: SortDirection::Asc };
        }
        debug!(sort = ?self.sort, "sort changed");
        self.render();
    }

    /// Sorted state for one header; only the active column has one.
    pub fn header_state(&self, key: SortKey) -> Option<SortDirection> {
        (self.sort.key == key).then_some(self.sort.dir)
    }

    /// Filtered entries in the current sort order. Ties keep filtered order.
    pub fn visible_entries(&self) -> Vec<&ComparisonEntry> {
        let key = self.sort.key;
        let mut keyed: Vec<(SortValue, &ComparisonEntry)> = self
            .filtered
            .iter()
            .map(|&i| {
                let e = &self.entries[i];
                (sort_value(e, key), e)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            let ord = a.compare(b);
            match self.sort.dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        keyed.into_iter().map(|(_, e)| e).collect()
    }

    /// Replace the attached target's content; no target means nothing to do.
    pub fn render(&mut self) {
        if self.target.is_none() {
            return;
        }
        let html = render_tbody(&self.visible_entries());
        if let Some(target) = self.target.as_mut() {
            target.set_content(&html);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RawRow;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn entry(pairs: &[(&str, &str)]) -> ComparisonEntry {
        ComparisonEntry::from_raw(&RawRow {
            cells: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        })
    }

    fn names(store: &CompareStore) -> Vec<String> {
        store.visible_entries().iter().map(|e| e.name.clone()).collect()
    }

    fn sample() -> Vec<ComparisonEntry> {
        vec![
            entry(&[("name", "Gamma"), ("accountSize", "100k"), ("drawdown", "EOD"), ("steps", "1 Step"), ("priceType", "One-time")]),
            entry(&[("name", "alpha"), ("accountSize", "50k"), ("drawdown", "Trailing"), ("steps", "2 Step"), ("priceType", "Monthly")]),
            entry(&[("name", "Beta"), ("accountSize", "50k"), ("drawdown", "EOD"), ("steps", "Instant Funded"), ("priceType", "Monthly")]),
        ]
    }

    #[test]
    fn default_sort_is_name_ascending_case_insensitive() {
        let store = CompareStore::new(sample());
        assert_eq!(names(&store), vec!["alpha", "Beta", "Gamma"]);
        assert_eq!(store.header_state(SortKey::Name), Some(SortDirection::Asc));
        assert_eq!(store.header_state(SortKey::Steps), None);
    }

    #[test]
    fn toggle_flips_then_restores() {
        let mut store = CompareStore::new(sample());
        store.toggle_sort(SortKey::AccountSize);
        let first = names(&store);
        assert_eq!(first, vec!["alpha", "Beta", "Gamma"]);

        store.toggle_sort(SortKey::AccountSize);
        assert_eq!(store.sort().dir, SortDirection::Desc);
        assert_eq!(names(&store), vec!["Gamma", "alpha", "Beta"]);

        store.toggle_sort(SortKey::AccountSize);
        assert_eq!(names(&store), first);
    }

    #[test]
    fn new_key_starts_ascending() {
        let mut store = CompareStore::new(sample());
        store.toggle_sort(SortKey::Name);
        assert_eq!(store.sort().dir, SortDirection::Desc);
        store.toggle_sort(SortKey::Steps);
        assert_eq!(store.sort(), SortCriteria { key: SortKey::Steps, dir: SortDirection::Asc });
        assert_eq!(store.header_state(SortKey::Name), None);
        assert_eq!(names(&store), vec!["Beta", "Gamma", "alpha"]);
    }

    #[test]
    fn filters_are_anded_and_replaced_wholesale() {
        let mut store = CompareStore::new(sample());
        store.set_filters(FilterCriteria {
            drawdown: Some("EOD".into()),
            price_type: Some("Monthly".into()),
            ..FilterCriteria::default()
        });
        assert_eq!(names(&store), vec!["Beta"]);

        store.set_filters(FilterCriteria { account_size: Some("50k".into()), ..FilterCriteria::default() });
        assert_eq!(names(&store), vec!["alpha", "Beta"]);
    }

    #[test]
    fn unknown_facet_value_empties_then_clearing_restores() {
        let mut store = CompareStore::new(sample());
        store.set_filters(FilterCriteria { steps: Some("3 Step".into()), ..FilterCriteria::default() });
        assert!(store.visible_entries().is_empty());

        store.set_filters(FilterCriteria::from_controls("All", "All", "All", ""));
        assert_eq!(store.visible_entries().len(), 3);
    }

    #[test]
    fn filter_is_exact_not_substring() {
        let mut store = CompareStore::new(sample());
        store.set_filters(FilterCriteria::from_controls("All", "50", "All", "All"));
        assert!(store.visible_entries().is_empty());
    }

    #[test]
    fn payout_frequency_rank_order() {
        let entries = vec![
            entry(&[("name", "u"), ("payoutFreq", "Quarterly")]),
            entry(&[("name", "m"), ("payoutFreq", "Monthly")]),
            entry(&[("name", "b"), ("payoutFreq", "Biweekly")]),
            entry(&[("name", "w"), ("payoutFreq", "Weekly")]),
            entry(&[("name", "d"), ("payoutFreq", "Daily")]),
            entry(&[("name", "o"), ("payoutFreq", "On-Demand")]),
            entry(&[("name", "v"), ("payoutFreq", "")]),
        ];
        let mut store = CompareStore::new(entries);
        store.toggle_sort(SortKey::PayoutFreq);
        assert_eq!(names(&store), vec!["o", "d", "w", "b", "m", "u", "v"]);
    }

    #[test]
    fn instant_steps_rank_as_zero() {
        assert_eq!(steps_rank("Instant Funded"), 0);
        assert_eq!(steps_rank("INSTANT"), 0);
        assert_eq!(steps_rank("0 Step"), 0);
        assert_eq!(steps_rank("2 Step"), 2);
        assert_eq!(steps_rank("Evaluation"), 0);
        let a = entry(&[("steps", "Instant Funded")]);
        let b = entry(&[("steps", "0 Step")]);
        assert_eq!(sort_value(&a, SortKey::Steps), sort_value(&b, SortKey::Steps));
    }

    #[test]
    fn contracts_sort_by_minis_only_and_ties_stay_stable() {
        let entries = vec![
            entry(&[("name", "first"), ("minis", "5"), ("micros", "50")]),
            entry(&[("name", "second"), ("minis", "5"), ("micros", "10")]),
            entry(&[("name", "small"), ("minis", "2"), ("micros", "90")]),
        ];
        let mut store = CompareStore::new(entries);
        store.toggle_sort(SortKey::MaxContracts);
        assert_eq!(names(&store), vec!["small", "first", "second"]);
        store.toggle_sort(SortKey::MaxContracts);
        assert_eq!(names(&store), vec!["first", "second", "small"]);
    }

    #[test]
    fn money_columns_sort_numerically() {
        let entries = vec![
            entry(&[("name", "a"), ("maxLoss", "$2,500")]),
            entry(&[("name", "b"), ("maxLoss", "none")]),
            entry(&[("name", "c"), ("maxLoss", "900")]),
        ];
        let mut store = CompareStore::new(entries);
        store.toggle_sort(SortKey::MaxLoss);
        assert_eq!(names(&store), vec!["b", "c", "a"]);
    }

    #[test]
    fn sort_key_attributes() {
        assert_eq!(SortKey::from_attr("priceAmount"), Some(SortKey::PriceAmount));
        assert_eq!(SortKey::from_attr("accountSize"), Some(SortKey::AccountSize));
        assert_eq!(SortKey::from_attr("buyUrl"), None);
        for key in SortKey::COLUMNS {
            assert_eq!(SortKey::from_attr(key.attr()), Some(key));
        }
    }

    struct Shared(Rc<RefCell<Vec<String>>>);

    impl RenderTarget for Shared {
        fn set_content(&mut self, content: &str) {
            self.0.borrow_mut().push(content.to_string());
        }
    }

    #[test]
    fn every_mutation_rerenders_attached_target() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut store = CompareStore::new(sample()).with_target(Box::new(Shared(log.clone())));
        store.render();
        store.toggle_sort(SortKey::Steps);
        store.set_filters(FilterCriteria { drawdown: Some("Trailing".into()), ..FilterCriteria::default() });

        let renders = log.borrow();
        assert_eq!(renders.len(), 3);
        assert_eq!(renders[2].matches("<tr>").count(), 1);
        assert!(renders[2].contains("alpha"));
    }

    #[test]
    fn missing_target_is_a_no_op() {
        let mut store = CompareStore::new(sample());
        store.render();
        store.toggle_sort(SortKey::Name);
        assert_eq!(names(&store), vec!["Gamma", "Beta", "alpha"]);
    }
}
