//! Reclassification, grouping and report assembly for scraped WMS rows.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::ReportConfig;
use crate::types::ScrapedRecord;

/// Group order used when the config does not override it
pub const PRIORITY_ORDER: &[&str] = &[
    "7-11",
    "711大物流",
    "全家",
    "萊爾富",
    "OK",
    "蝦皮店到店",
    "蝦皮店到家",
];

pub const SEVEN_ELEVEN: &str = "7-11";

/// Bulk-logistics subtype of 7-11 shipments
pub const BULK_SEVEN_ELEVEN: &str = "711大物流";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

lazy_static::lazy_static! {
    static ref LEADING_DIGIT: Regex = Regex::new(r"^\d").unwrap();
}

/// Rewrite a plain 7-11 record whose tracking code starts with a digit
pub fn reclassify(record: &ScrapedRecord) -> ScrapedRecord {
    if record.shipping_method == SEVEN_ELEVEN && LEADING_DIGIT.is_match(&record.tracking_code) {
        ScrapedRecord {
            shipping_method: BULK_SEVEN_ELEVEN.to_string(),
            tracking_code: record.tracking_code.clone(),
        }
    } else {
        record.clone()
    }
}

/// Priority members that are present, in priority order, then the rest lexically
pub fn method_order<'a, I>(methods: I, priority: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = methods.into_iter().collect();

    let mut order: Vec<String> = priority
        .iter()
        .filter(|m| present.contains(m.as_str()))
        .cloned()
        .collect();
    order.extend(
        present
            .iter()
            .filter(|m| !priority.iter().any(|p| p == *m))
            .map(|m| m.to_string()),
    );
    order
}

/// Count for one shipping method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCount {
    pub method: String,
    pub count: usize,
}

/// Grouped counts plus the rows they were computed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBundle {
    /// In group order; methods with no rows are absent
    pub grouped_counts: Vec<MethodCount>,
    pub total: usize,
    pub timestamp: String,
    /// Sorted by group order, scrape order within a group
    pub detail_rows: Vec<ScrapedRecord>,
}

impl ReportBundle {
    fn build(rows: Vec<ScrapedRecord>, order: &[String], timestamp: &str) -> Self {
        let rank = |method: &str| order.iter().position(|m| m == method).unwrap_or(order.len());

        let mut detail_rows = rows;
        detail_rows.sort_by_key(|r| rank(&r.shipping_method));

        let grouped_counts = order
            .iter()
            .filter_map(|method| {
                let count = detail_rows
                    .iter()
                    .filter(|r| &r.shipping_method == method)
                    .count();
                (count > 0).then(|| MethodCount {
                    method: method.clone(),
                    count,
                })
            })
            .collect();

        Self {
            grouped_counts,
            total: detail_rows.len(),
            timestamp: timestamp.to_string(),
            detail_rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detail_rows.is_empty()
    }

    /// Plain-text summary: one `method: count` line per group and a total
    pub fn summary_lines(&self) -> Vec<String> {
        if self.is_empty() {
            return vec!["(no data)".to_string()];
        }
        let width = self
            .grouped_counts
            .iter()
            .map(|g| g.method.chars().count())
            .max()
            .unwrap_or(0)
            + 2;

        let mut lines: Vec<String> = self
            .grouped_counts
            .iter()
            .map(|g| format!("{:<width$} {:>8}", format!("{}:", g.method), g.count, width = width))
            .collect();
        lines.push(format!("Total: {}", self.total));
        lines
    }
}

/// Both report views and the plain 7-11 code list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Only the configured default methods
    pub filtered: ReportBundle,
    pub all: ReportBundle,
    /// Non-empty codes still classified as plain 7-11, in report order
    pub seven_eleven_codes: Vec<String>,
}

/// Applies the report rules from [`ReportConfig`]
#[derive(Debug, Clone)]
pub struct Reconciler {
    priority: Vec<String>,
    default_methods: Vec<String>,
    offset: FixedOffset,
}

impl Reconciler {
    pub fn new(config: &ReportConfig) -> Self {
        let offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "UTC offset of {} hours is out of range, using UTC",
                    config.utc_offset_hours
                );
                Utc.fix()
            });
        Self {
            priority: config.priority.clone(),
            default_methods: config.default_methods.clone(),
            offset,
        }
    }

    pub fn reconcile(&self, records: &[ScrapedRecord]) -> Reconciliation {
        self.reconcile_at(records, Utc::now())
    }

    pub fn reconcile_at(&self, records: &[ScrapedRecord], now: DateTime<Utc>) -> Reconciliation {
        let reclassified: Vec<ScrapedRecord> = records.iter().map(reclassify).collect();
        let order = method_order(
            reclassified.iter().map(|r| r.shipping_method.as_str()),
            &self.priority,
        );
        let timestamp = now.with_timezone(&self.offset).format(TIMESTAMP_FORMAT).to_string();

        let all = ReportBundle::build(reclassified, &order, &timestamp);

        let filtered_rows = all
            .detail_rows
            .iter()
            .filter(|r| self.default_methods.contains(&r.shipping_method))
            .cloned()
            .collect();
        let filtered = ReportBundle::build(filtered_rows, &order, &timestamp);

        let seven_eleven_codes = all
            .detail_rows
            .iter()
            .filter(|r| r.shipping_method == SEVEN_ELEVEN && !r.tracking_code.is_empty())
            .map(|r| r.tracking_code.clone())
            .collect();

        Reconciliation {
            filtered,
            all,
            seven_eleven_codes,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&ReportConfig::default())
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;
