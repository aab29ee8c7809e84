//! Deal ranking and diffing engine: pure, synchronous, I/O-free.

use std::collections::{HashMap, HashSet};

use pdw_core::{ModelKey, ProductVariant, Snapshot, Stock};

pub mod report;

pub const CRATE_NAME: &str = "pdw-engine";

/// A rankable variant paired with the reference price of its model triple.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedVariant {
    pub reference_price: i64,
    pub variant: ProductVariant,
}

impl RankedVariant {
    /// Cash price as a fraction of the reference price; lower is a
    /// better deal. A triple with no rrp anchor yields `+infinity` so
    /// it sorts behind every priced offer instead of dividing by zero.
    pub fn value_ratio(&self) -> f64 {
        value_ratio(self.variant.cash_price, self.reference_price)
    }
}

fn value_ratio(cash_price: i64, reference_price: i64) -> f64 {
    if reference_price <= 0 {
        f64::INFINITY
    } else {
        cash_price as f64 / reference_price as f64
    }
}

/// Maximum rrp observed per model triple, over the full unfiltered
/// variant set. Must run before any stock filtering: the anchor for a
/// like-new listing is usually the new listing's rrp, and that variant
/// may itself be out of stock.
pub fn reference_prices(variants: &[ProductVariant]) -> HashMap<ModelKey, i64> {
    let mut prices: HashMap<ModelKey, i64> = HashMap::new();
    for variant in variants {
        let anchor = prices.entry(variant.model_key()).or_insert(0);
        *anchor = (*anchor).max(variant.rrp);
    }
    prices
}

/// In-stock and pre-order variants ordered ascending by value ratio.
/// The sort is stable, so equal ratios keep fetch order.
pub fn rank_by_value(
    variants: &[ProductVariant],
    reference: &HashMap<ModelKey, i64>,
) -> Vec<RankedVariant> {
    let mut ranked: Vec<RankedVariant> = variants
        .iter()
        .filter(|variant| variant.stock != Stock::OutOfStock)
        .map(|variant| RankedVariant {
            reference_price: reference.get(&variant.model_key()).copied().unwrap_or(0),
            variant: variant.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| a.value_ratio().total_cmp(&b.value_ratio()));
    ranked
}

/// Walk the ranked order keeping the first occurrence of each deal key,
/// up to `limit` accepted entries. A worse-ranked duplicate (another
/// colour at a worse price) is skipped and does not count toward the
/// limit.
pub fn select_best(ranked: Vec<RankedVariant>, limit: usize) -> Vec<RankedVariant> {
    let mut claimed: HashSet<_> = HashSet::new();
    let mut accepted = Vec::new();
    for item in ranked {
        if accepted.len() >= limit {
            break;
        }
        if !claimed.insert(item.variant.deal_key()) {
            continue;
        }
        accepted.push(item);
    }
    accepted
}

/// One reportable row: a deal that is new or whose price moved.
#[derive(Debug, Clone, PartialEq)]
pub struct DealRow {
    pub brand: String,
    pub model: String,
    pub spec: String,
    pub condition: String,
    pub cash_price: i64,
    /// Price at the previous snapshot; `None` marks a new deal.
    pub previous_price: Option<i64>,
    pub reference_price: i64,
    pub link: String,
}

impl DealRow {
    pub fn is_new(&self) -> bool {
        self.previous_price.is_none()
    }

    pub fn value_ratio(&self) -> f64 {
        value_ratio(self.cash_price, self.reference_price)
    }
}

/// Result of one ranking/diff pass: the rows worth reporting plus the
/// accepted set that becomes the replacement snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub limit: usize,
    pub rows: Vec<DealRow>,
    pub snapshot: Snapshot,
}

impl ReportOutcome {
    /// Zero rows is the normal "nothing changed" outcome: the caller
    /// must skip both the snapshot rewrite and the notification.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Full pass: reference prices over the unfiltered set, rank, dedup to
/// the best `limit` distinct deals, then diff against the previous
/// snapshot. Unchanged deals emit no row but still enter the
/// replacement snapshot so it stays current.
pub fn best_value_report(
    variants: &[ProductVariant],
    previous: &Snapshot,
    limit: usize,
) -> ReportOutcome {
    let reference = reference_prices(variants);
    let ranked = rank_by_value(variants, &reference);
    let accepted = select_best(ranked, limit);

    let mut rows = Vec::new();
    let mut snapshot = Snapshot::new();
    for item in accepted {
        let key = item.variant.deal_key();
        let previous_price = previous.get(&key).map(|deal| deal.cash_price);
        snapshot.insert(key, item.variant.clone());

        if previous_price == Some(item.variant.cash_price) {
            // Seen before at the same price.
            continue;
        }
        rows.push(DealRow {
            brand: item.variant.brand,
            model: item.variant.model,
            spec: item.variant.spec,
            condition: item.variant.condition,
            cash_price: item.variant.cash_price,
            previous_price,
            reference_price: item.reference_price,
            link: item.variant.link,
        });
    }

    ReportOutcome {
        limit,
        rows,
        snapshot,
    }
}
