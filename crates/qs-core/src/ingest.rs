//! JSON bar ingestion: field mapping, timestamp normalization, ordering, and
//! gap filling.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::candle::Bar;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("field {field:?} has unsupported value {value}")]
    BadScalar { field: String, value: String },

    #[error("data error: invalid or zero interval between the first two bars")]
    BadInterval,

    #[error("data error: unexpected time difference between bars: {0:.2} seconds")]
    ShortInterval(f64),
}

fn to_float(field: &str, value: &Value) -> Result<f64, IngestError> {
    let bad = || IngestError::BadScalar {
        field: field.to_owned(),
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(bad),
        Value::String(s) => s.trim().parse().map_err(|_| bad()),
        _ => Err(bad()),
    }
}

fn map_to_bar(object: &serde_json::Map<String, Value>) -> Result<Bar, IngestError> {
    let mut bar = Bar {
        open: 0.0,
        high: 0.0,
        low: 0.0,
        close: 0.0,
        volume: 0.0,
        time: 0.0,
    };

    for (key, value) in object {
        match key.to_ascii_lowercase().as_str() {
            "open" => bar.open = to_float(key, value)?,
            "high" => bar.high = to_float(key, value)?,
            "low" => bar.low = to_float(key, value)?,
            "close" => bar.close = to_float(key, value)?,
            "volume" => bar.volume = to_float(key, value)?,
            "time" | "timestamp" | "ts" => bar.time = to_float(key, value)?,
            _ => {}
        }
    }

    Ok(bar)
}

/// Collapse ns/ms timestamps to seconds.
fn normalize_timestamps(bars: &mut [Bar]) {
    for bar in bars {
        if bar.time > 1e12 {
            bar.time /= 1e9;
        } else if bar.time > 1e10 {
            bar.time /= 1e3;
        }
    }
}

/// Insert NaN-valued bars for missing timestamps at the interval inferred
/// from the first two bars.
fn fill_bar_gaps(bars: Vec<Bar>) -> Result<Vec<Bar>, IngestError> {
    if bars.len() < 2 {
        return Ok(bars);
    }

    let interval = bars[1].time - bars[0].time;
    if interval <= 0.0 {
        return Err(IngestError::BadInterval);
    }

    let mut filled = Vec::with_capacity(bars.len());
    for i in 0..bars.len() - 1 {
        filled.push(bars[i]);
        let diff = bars[i + 1].time - bars[i].time;

        if diff > interval {
            let missing = (diff / interval).round() as i64 - 1;
            for j in 1..=missing {
                filled.push(Bar::gap(bars[i].time + j as f64 * interval));
            }
        } else if diff < interval {
            return Err(IngestError::ShortInterval(diff));
        }
    }
    filled.push(bars[bars.len() - 1]);

    Ok(filled)
}

/// Parse a JSON array of bar objects into an ordered, gap-filled bar vector.
///
/// Keys match `close|open|high|low|volume|time|timestamp|ts` case-
/// insensitively; missing fields default to 0. A time-descending input (per
/// the first two bars) is reversed before gap filling.
pub fn bars_from_json(json: &str) -> Result<Vec<Bar>, IngestError> {
    let objects: Vec<serde_json::Map<String, Value>> = serde_json::from_str(json)?;

    let mut bars = objects
        .iter()
        .map(map_to_bar)
        .collect::<Result<Vec<_>, _>>()?;

    normalize_timestamps(&mut bars);

    if bars.len() >= 2 && bars[0].time > bars[1].time {
        bars.reverse();
    }

    fill_bar_gaps(bars)
}

/// Read and parse a bar file.
pub fn bars_from_path(path: impl AsRef<Path>) -> Result<Vec<Bar>, IngestError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    bars_from_json(&data)
}
