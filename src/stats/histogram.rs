//! Per-type distribution summaries over a field's extracted values.
//!
//! Data-shape anomalies (mixed kinds, composite elements) are conditions,
//! not errors: they log a warning and yield `None` so bulk introspection
//! over many fields never aborts on one malformed field.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use crate::core::types::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramOptions {
    /// Number of bins for numeric data; number of reported labels for
    /// strings (0 reports all labels).
    pub bins: usize,
    /// Label length for string data before duplicates are counted.
    pub truncate: usize,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        HistogramOptions {
            bins: 10,
            truncate: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Histogram {
    Float(FloatHistogram),
    Int(IntHistogram),
    Str(StrHistogram),
    Date(DateHistogram),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatHistogram {
    pub name: String,
    pub bins: usize,
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub var: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntHistogram {
    pub name: String,
    /// Effective bin count, capped at `max - min + 1` so no bin is narrower
    /// than one unit.
    pub bins: usize,
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub std: f64,
    pub var: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrHistogram {
    pub name: String,
    pub total: u64,
    /// Distinct values before truncation.
    pub unique: u64,
    /// Top labels ranked by count descending, label ascending.
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
    pub truncate: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateHistogram {
    pub name: String,
    pub bins: usize,
    pub edges: Vec<DateTime<Utc>>,
    pub counts: Vec<u64>,
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
    pub mean: DateTime<Utc>,
    /// Spread as a duration rather than a calendar timestamp.
    pub std: Duration,
    pub var_seconds: f64,
}

/// Builds a distribution summary for homogeneous scalar values. Returns
/// `None` for empty input, mixed kinds, or kinds with no binning strategy.
pub fn histogram(name: &str, values: &[Value], options: &HistogramOptions) -> Option<Histogram> {
    let first = values.first()?;
    let kind = first.kind_name();

    if values.iter().any(|v| v.kind_name() != kind) {
        log::warn!("{name}: mixed value kinds, no histogram");
        return None;
    }

    match first {
        Value::Float(_) => {
            let data: Vec<f64> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Some(Histogram::Float(hist_float(name, &data, options.bins)))
        }
        Value::Int(_) => {
            let data: Vec<i64> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Some(Histogram::Int(hist_int(name, &data, options.bins)))
        }
        Value::Str(_) => {
            let data: Vec<&str> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            Some(Histogram::Str(hist_str(
                name,
                &data,
                options.bins,
                options.truncate,
            )))
        }
        Value::Date(_) => {
            let data: Vec<DateTime<Utc>> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Date(d) => Some(*d),
                    _ => None,
                })
                .collect();
            Some(Histogram::Date(hist_date(name, &data, options.bins)))
        }
        _ => {
            log::warn!("{name}: histogram for {kind} values is not supported");
            None
        }
    }
}

struct Binned {
    bins: usize,
    edges: Vec<f64>,
    counts: Vec<u64>,
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
    var: f64,
}

/// Linear binning over `[min, max]` with the final edge inclusive. A
/// degenerate single-value range widens to one unit around the value.
fn bin(data: &[f64], bins: usize) -> Binned {
    let bins = bins.max(1);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    };

    let width = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + i as f64 * width).collect();
    edges.push(hi);

    let mut counts = vec![0u64; bins];
    for &value in data {
        let index = (((value - lo) / (hi - lo)) * bins as f64) as usize;
        counts[index.min(bins - 1)] += 1;
    }

    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    Binned {
        bins,
        edges,
        counts,
        min,
        max,
        mean,
        std: var.sqrt(),
        var,
    }
}

fn hist_float(name: &str, data: &[f64], bins: usize) -> FloatHistogram {
    let b = bin(data, bins);
    FloatHistogram {
        name: name.to_string(),
        bins: b.bins,
        edges: b.edges,
        counts: b.counts,
        min: b.min,
        max: b.max,
        mean: b.mean,
        std: b.std,
        var: b.var,
    }
}

fn hist_int(name: &str, data: &[i64], bins: usize) -> IntHistogram {
    let min = data.iter().copied().min().unwrap_or(0);
    let max = data.iter().copied().max().unwrap_or(0);
    // The span can exceed i64 for extreme ranges; an overflowing span never
    // caps the bin count anyway.
    let span = max
        .checked_sub(min)
        .and_then(|d| d.checked_add(1))
        .and_then(|d| usize::try_from(d).ok())
        .unwrap_or(bins);

    let floats: Vec<f64> = data.iter().map(|&v| v as f64).collect();
    let b = bin(&floats, bins.min(span));
    IntHistogram {
        name: name.to_string(),
        bins: b.bins,
        edges: b.edges,
        counts: b.counts,
        min,
        max,
        mean: b.mean,
        std: b.std,
        var: b.var,
    }
}

fn hist_date(name: &str, data: &[DateTime<Utc>], bins: usize) -> DateHistogram {
    let seconds: Vec<f64> = data
        .iter()
        .map(|d| d.timestamp_micros() as f64 / 1e6)
        .collect();
    let b = bin(&seconds, bins);
    DateHistogram {
        name: name.to_string(),
        bins: b.bins,
        edges: b.edges.iter().map(|&e| from_epoch(e)).collect(),
        counts: b.counts,
        min: from_epoch(b.min),
        max: from_epoch(b.max),
        mean: from_epoch(b.mean),
        std: Duration::microseconds((b.std * 1e6) as i64),
        var_seconds: b.var,
    }
}

fn from_epoch(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).unwrap_or(DateTime::UNIX_EPOCH)
}

fn hist_str(name: &str, data: &[&str], bins: usize, truncate: usize) -> StrHistogram {
    let unique = data.iter().collect::<BTreeSet<_>>().len() as u64;

    let mut tallies: BTreeMap<String, u64> = BTreeMap::new();
    for &item in data {
        let label = if truncate > 0 && item.chars().count() > truncate {
            let mut label: String = item.chars().take(truncate).collect();
            label.push_str("...");
            label
        } else {
            item.to_string()
        };
        *tallies.entry(label).or_insert(0) += 1;
    }

    let total = tallies.values().sum();

    let mut ranked: Vec<(String, u64)> = tallies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if bins > 0 {
        ranked.truncate(bins);
    }

    let (labels, counts) = ranked.into_iter().unzip();
    StrHistogram {
        name: name.to_string(),
        total,
        unique,
        labels,
        counts,
        truncate,
    }
}
