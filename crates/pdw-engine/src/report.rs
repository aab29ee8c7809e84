//! Report rendering: the aligned text block and the HTML table used as
//! the email body. Field selection and column order are part of the
//! engine's output contract; the markup itself is presentation.

use askama::Template;

use crate::ReportOutcome;

#[derive(Template)]
#[template(path = "report.html")]
struct HtmlReport {
    limit: usize,
    rows: Vec<HtmlRow>,
}

struct HtmlRow {
    brand: String,
    model: String,
    spec: String,
    condition: String,
    cash_price: String,
    previous_price: String,
    reference_price: String,
    percent: String,
    link: String,
}

/// Minor units as pounds, trailing zeros trimmed (`50000` -> `500`,
/// `54999` -> `549.99`).
fn pounds(minor: i64) -> String {
    format!("{}", minor as f64 / 100.0)
}

fn percent(ratio: f64) -> String {
    if ratio.is_finite() {
        format!("{:.2}%", ratio * 100.0)
    } else {
        "n/a".to_string()
    }
}

/// Line-oriented rendering, one `--` row per reportable deal under an
/// `Update from Best {n} Deals` header. Empty when there is nothing to
/// report, which callers treat as "skip notification".
pub fn render_text(outcome: &ReportOutcome) -> String {
    if outcome.is_empty() {
        return String::new();
    }

    let mut lines = vec![format!("Update from Best {} Deals", outcome.limit)];
    for row in &outcome.rows {
        let prices = match row.previous_price {
            Some(previous) => format!(
                "£{:<6} (£{:<6})",
                pounds(row.cash_price),
                pounds(previous)
            ),
            None => format!("£{:<6}", pounds(row.cash_price)),
        };
        lines.push(format!(
            "-- {:<10} {:<20} {:<20} {:<8} {} £{:<6} {}    -- {}",
            row.brand,
            row.model,
            row.spec,
            row.condition,
            prices,
            pounds(row.reference_price),
            percent(row.value_ratio()),
            row.link,
        ));
    }
    lines.join("\n")
}

/// Table rendering with the fixed column order: brand, model, spec,
/// condition, cash price, previous price, reference price, percentage
/// of reference, link. Empty when there is nothing to report.
pub fn render_html(outcome: &ReportOutcome) -> askama::Result<String> {
    if outcome.is_empty() {
        return Ok(String::new());
    }

    let rows = outcome
        .rows
        .iter()
        .map(|row| HtmlRow {
            brand: row.brand.clone(),
            model: row.model.clone(),
            spec: row.spec.clone(),
            condition: row.condition.clone(),
            cash_price: format!("£{}", pounds(row.cash_price)),
            previous_price: row
                .previous_price
                .map(|previous| format!("£{}", pounds(previous)))
                .unwrap_or_default(),
            reference_price: format!("£{}", pounds(row.reference_price)),
            percent: percent(row.value_ratio()),
            link: row.link.clone(),
        })
        .collect();

    HtmlReport {
        limit: outcome.limit,
        rows,
    }
    .render()
}
