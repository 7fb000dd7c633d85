//! Report row normalization and derived advertising metrics.
//!
//! Every ratio guards its denominator: a zero denominator yields `0.0`.

use serde::Serialize;
use serde_json::Value;

pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn ctr(clicks: f64, impressions: f64) -> f64 {
    safe_div(clicks, impressions)
}

pub fn cpc(cost: f64, clicks: f64) -> f64 {
    safe_div(cost, clicks)
}

pub fn acos(cost: f64, sales: f64) -> f64 {
    safe_div(cost, sales)
}

pub fn roas(sales: f64, cost: f64) -> f64 {
    safe_div(sales, cost)
}

pub fn cpa(cost: f64, conversions: f64) -> f64 {
    safe_div(cost, conversions)
}

pub fn conversion_rate(conversions: f64, clicks: f64) -> f64 {
    safe_div(conversions, clicks)
}

/// Which entity a report row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Campaign,
    AdGroup,
    Keyword,
    ProductAd,
}

const SALES_FIELDS: &[&str] = &[
    "attributedSales14d",
    "attributedSales7d",
    "attributedSales30d",
    "attributedSales1d",
    "sales14d",
    "sales",
];
const ORDERS_FIELDS: &[&str] = &[
    "attributedUnitsOrdered14d",
    "attributedUnitsOrdered7d",
    "attributedUnitsOrdered30d",
    "attributedUnitsOrdered1d",
    "unitsSold14d",
    "orders",
];
const CONVERSIONS_FIELDS: &[&str] = &[
    "attributedConversions14d",
    "attributedConversions7d",
    "attributedConversions30d",
    "attributedConversions1d",
    "purchases14d",
    "conversions",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMetrics {
    pub date: Option<String>,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub sales: f64,
    pub orders: u64,
    pub conversions: u64,
}

impl RowMetrics {
    fn from_raw(raw: &Value) -> Self {
        Self {
            date: text_field(raw, "date"),
            impressions: count_field(raw, &["impressions"]),
            clicks: count_field(raw, &["clicks"]),
            cost: amount_field(raw, &["cost", "spend"]),
            sales: amount_field(raw, SALES_FIELDS),
            orders: count_field(raw, ORDERS_FIELDS),
            conversions: count_field(raw, CONVERSIONS_FIELDS),
        }
    }
}

/// A downloaded report row, keyed by the granularity of the report that
/// produced it. Parent identifiers ride along for rows below campaign level.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportRow {
    Campaign {
        campaign_id: Option<String>,
        campaign_name: Option<String>,
        metrics: RowMetrics,
    },
    AdGroup {
        ad_group_id: Option<String>,
        ad_group_name: Option<String>,
        campaign_id: Option<String>,
        campaign_name: Option<String>,
        metrics: RowMetrics,
    },
    Keyword {
        keyword_id: Option<String>,
        keyword_text: Option<String>,
        ad_group_id: Option<String>,
        ad_group_name: Option<String>,
        campaign_id: Option<String>,
        campaign_name: Option<String>,
        metrics: RowMetrics,
    },
    ProductAd {
        ad_id: Option<String>,
        asin: Option<String>,
        ad_group_id: Option<String>,
        ad_group_name: Option<String>,
        campaign_id: Option<String>,
        campaign_name: Option<String>,
        metrics: RowMetrics,
    },
}

impl ReportRow {
    pub fn from_raw(granularity: Granularity, raw: &Value) -> Self {
        let metrics = RowMetrics::from_raw(raw);
        let id = |key: &str| text_field(raw, key);
        match granularity {
            Granularity::Campaign => ReportRow::Campaign {
                campaign_id: id("campaignId"),
                campaign_name: id("campaignName"),
                metrics,
            },
            Granularity::AdGroup => ReportRow::AdGroup {
                ad_group_id: id("adGroupId"),
                ad_group_name: id("adGroupName"),
                campaign_id: id("campaignId"),
                campaign_name: id("campaignName"),
                metrics,
            },
            Granularity::Keyword => ReportRow::Keyword {
                keyword_id: id("keywordId"),
                keyword_text: id("keywordText").or_else(|| id("keyword")),
                ad_group_id: id("adGroupId"),
                ad_group_name: id("adGroupName"),
                campaign_id: id("campaignId"),
                campaign_name: id("campaignName"),
                metrics,
            },
            Granularity::ProductAd => ReportRow::ProductAd {
                ad_id: id("adId"),
                asin: id("asin").or_else(|| id("advertisedAsin")),
                ad_group_id: id("adGroupId"),
                ad_group_name: id("adGroupName"),
                campaign_id: id("campaignId"),
                campaign_name: id("campaignName"),
                metrics,
            },
        }
    }

    pub fn metrics(&self) -> &RowMetrics {
        match self {
            ReportRow::Campaign { metrics, .. }
            | ReportRow::AdGroup { metrics, .. }
            | ReportRow::Keyword { metrics, .. }
            | ReportRow::ProductAd { metrics, .. } => metrics,
        }
    }

    /// The identifier of the row's own entity. When the report omitted it,
    /// falls back to the first present of campaign, ad group, keyword, ad.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ReportRow::Campaign { campaign_id, .. } => campaign_id.as_deref(),
            ReportRow::AdGroup {
                ad_group_id,
                campaign_id,
                ..
            } => ad_group_id.as_deref().or(campaign_id.as_deref()),
            ReportRow::Keyword {
                keyword_id,
                ad_group_id,
                campaign_id,
                ..
            } => keyword_id
                .as_deref()
                .or(campaign_id.as_deref())
                .or(ad_group_id.as_deref()),
            ReportRow::ProductAd {
                ad_id,
                ad_group_id,
                campaign_id,
                ..
            } => ad_id
                .as_deref()
                .or(campaign_id.as_deref())
                .or(ad_group_id.as_deref()),
        }
    }

    /// Display name of the row's own entity, falling back the same way as
    /// [`ReportRow::entity_id`].
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            ReportRow::Campaign { campaign_name, .. } => campaign_name.as_deref(),
            ReportRow::AdGroup {
                ad_group_name,
                campaign_name,
                ..
            } => ad_group_name.as_deref().or(campaign_name.as_deref()),
            ReportRow::Keyword {
                keyword_text,
                ad_group_name,
                campaign_name,
                ..
            } => keyword_text
                .as_deref()
                .or(campaign_name.as_deref())
                .or(ad_group_name.as_deref()),
            ReportRow::ProductAd {
                asin,
                ad_group_name,
                campaign_name,
                ..
            } => asin
                .as_deref()
                .or(campaign_name.as_deref())
                .or(ad_group_name.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub date: Option<String>,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub sales: f64,
    pub orders: u64,
    pub ctr: f64,
    pub cpc: f64,
    pub acos: f64,
    pub roas: f64,
    pub conversions: u64,
}

pub fn normalize_row(row: &ReportRow) -> NormalizedRow {
    let m = row.metrics();
    let impressions = m.impressions as f64;
    let clicks = m.clicks as f64;
    NormalizedRow {
        entity_id: row.entity_id().map(str::to_string),
        entity_name: row.entity_name().map(str::to_string),
        date: m.date.clone(),
        impressions: m.impressions,
        clicks: m.clicks,
        cost: round_to(m.cost, 2),
        sales: round_to(m.sales, 2),
        orders: m.orders,
        ctr: round_to(ctr(clicks, impressions), 4),
        cpc: round_to(cpc(m.cost, clicks), 2),
        acos: round_to(acos(m.cost, m.sales), 4),
        roas: round_to(roas(m.sales, m.cost), 2),
        conversions: m.conversions,
    }
}

pub fn normalize_rows(granularity: Granularity, raw_rows: &[Value]) -> Vec<NormalizedRow> {
    raw_rows
        .iter()
        .map(|raw| normalize_row(&ReportRow::from_raw(granularity, raw)))
        .collect()
}

/// Totals across rows with ratios recomputed from the sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub row_count: usize,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_cost: f64,
    pub total_sales: f64,
    pub total_orders: u64,
    pub total_conversions: u64,
    pub overall_ctr: f64,
    pub overall_cpc: f64,
    pub overall_acos: f64,
    pub overall_roas: f64,
}

pub fn summarize(rows: &[NormalizedRow]) -> Summary {
    let total_impressions: u64 = rows.iter().map(|r| r.impressions).sum();
    let total_clicks: u64 = rows.iter().map(|r| r.clicks).sum();
    let total_cost: f64 = rows.iter().map(|r| r.cost).sum();
    let total_sales: f64 = rows.iter().map(|r| r.sales).sum();
    Summary {
        row_count: rows.len(),
        total_impressions,
        total_clicks,
        total_cost: round_to(total_cost, 2),
        total_sales: round_to(total_sales, 2),
        total_orders: rows.iter().map(|r| r.orders).sum(),
        total_conversions: rows.iter().map(|r| r.conversions).sum(),
        overall_ctr: round_to(ctr(total_clicks as f64, total_impressions as f64), 4),
        overall_cpc: round_to(cpc(total_cost, total_clicks as f64), 2),
        overall_acos: round_to(acos(total_cost, total_sales), 4),
        overall_roas: round_to(roas(total_sales, total_cost), 2),
    }
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match raw.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn amount_field(raw: &Value, keys: &[&str]) -> f64 {
    number_field(raw, keys)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn count_field(raw: &Value, keys: &[&str]) -> u64 {
    number_field(raw, keys)
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}
