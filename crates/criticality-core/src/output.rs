use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::metric::{Metric, MetricValue, MetricVector};

/// Fixed output field order, used verbatim as the tabular header.
pub const FIELD_ORDER: [&str; 14] = [
    "name",
    "url",
    "language",
    "created_since",
    "updated_since",
    "contributor_count",
    "org_count",
    "commit_frequency",
    "recent_releases_count",
    "updated_issues_count",
    "closed_issues_count",
    "comment_frequency",
    "dependents_count",
    "criticality_score",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricVector,
    pub criticality_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Default,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "text" => Ok(Self::Default),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown output format {other:?}, use one of default, csv or json"
            )),
        }
    }
}

fn format_value(value: MetricValue) -> String {
    match value {
        MetricValue::Count(v) => v.to_string(),
        MetricValue::Frequency(v) => format!("{v:.1}"),
    }
}

impl ScoreResult {
    /// Field values as strings, in [`FIELD_ORDER`].
    pub fn field_values(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(FIELD_ORDER.len());
        out.push(self.name.clone());
        out.push(self.url.clone());
        out.push(self.language.clone().unwrap_or_default());
        for metric in Metric::ALL {
            out.push(format_value(self.metrics.get(metric)));
        }
        out.push(self.criticality_score.to_string());
        out
    }

    /// One `key: value` line per field.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in FIELD_ORDER.iter().zip(self.field_values()) {
            let _ = writeln!(out, "{key}: {value}");
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv_record(&self) -> String {
        csv_line(self.field_values().iter().map(String::as_str))
    }

    /// Parses a record produced by [`ScoreResult::to_csv_record`].
    pub fn from_csv_record(line: &str) -> Result<Self, ParseError> {
        let fields = split_csv_line(line)?;
        if fields.len() != FIELD_ORDER.len() {
            return Err(ParseError::FieldCount {
                expected: FIELD_ORDER.len(),
                found: fields.len(),
            });
        }
        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or_default();

        let name = next();
        let url = next();
        let language = Some(next()).filter(|l| !l.is_empty());

        let mut metrics = MetricVector::default();
        for metric in Metric::ALL {
            let raw = next();
            let bad = || ParseError::Value {
                field: metric.as_str().to_string(),
                value: raw.clone(),
            };
            let value = if metric.is_fractional() {
                MetricValue::Frequency(raw.trim().parse::<f64>().map_err(|_| bad())?)
            } else {
                MetricValue::Count(raw.trim().parse::<u64>().map_err(|_| bad())?)
            };
            metrics.set(metric, value);
        }

        let raw_score = next();
        let criticality_score = raw_score
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::Value {
                field: "criticality_score".to_string(),
                value: raw_score.clone(),
            })?;

        Ok(Self {
            name,
            url,
            language,
            metrics,
            criticality_score,
        })
    }
}

pub fn csv_header() -> String {
    csv_line(FIELD_ORDER.iter().copied())
}

/// Header plus one record per result.
pub fn render_csv(results: &[ScoreResult]) -> String {
    let mut out = csv_header();
    out.push('\n');
    for r in results {
        out.push_str(&r.to_csv_record());
        out.push('\n');
    }
    out
}

/// Parses a document written by [`render_csv`].
pub fn parse_csv(doc: &str) -> Result<Vec<ScoreResult>, ParseError> {
    let records = split_csv_records(doc)?;
    let mut records = records.iter().filter(|r| !r.trim().is_empty());
    let header = records.next().map(|r| split_csv_line(r)).transpose()?;
    if header.as_deref().map(|h| h.iter().map(String::as_str).eq(FIELD_ORDER)) != Some(true) {
        return Err(ParseError::Header);
    }
    records.map(|r| ScoreResult::from_csv_record(r)).collect()
}

/// Splits a document into records on line breaks outside quoted fields.
fn split_csv_records(doc: &str) -> Result<Vec<String>, ParseError> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in doc.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\n' if !in_quotes => {
                let record = std::mem::take(&mut current);
                records.push(record.trim_end_matches('\r').to_string());
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(ParseError::Unterminated);
    }
    if !current.is_empty() {
        records.push(current);
    }
    Ok(records)
}

pub fn render(results: &[ScoreResult], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Default => Ok(results
            .iter()
            .map(ScoreResult::to_text)
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => match results {
            [single] => single.to_json(),
            many => serde_json::to_string_pretty(many),
        },
        OutputFormat::Csv => Ok(render_csv(results)),
    }
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields
        .map(|f| {
            if f.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                f.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn split_csv_line(line: &str) -> Result<Vec<String>, ParseError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(ParseError::Unterminated);
    }
    fields.push(current);
    Ok(fields)
}
