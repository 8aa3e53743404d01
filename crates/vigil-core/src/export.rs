//! Snapshot export to JSON and CSV.
//!
//! The engine only produces bytes; writing them anywhere is the caller's job.
//!
//! CSV layout: a samples table (`timestamp` then one column per field, in
//! field-name order, empty cell when a sample lacks a field), one blank line,
//! then an alerts table.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::error::{Result, VigilError};
use crate::metrics::DerivedMetrics;
use crate::sample::{Sample, unix_ms_now};
use crate::session::SessionSnapshot;

pub const ALERT_COLUMNS: [&str; 13] = [
    "id",
    "rule_id",
    "subject",
    "severity",
    "title",
    "message",
    "observed",
    "threshold",
    "created_at",
    "updated_at",
    "resolved",
    "resolved_at",
    "resolved_by",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(VigilError::Export {
                reason: format!("unsupported format '{other}' (expected csv or json)"),
            }),
        }
    }
}

/// JSON export document.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub subject: String,
    pub exported_at: u64,
    pub capacity: usize,
    pub samples: Vec<Sample>,
    pub alerts: Vec<Alert>,
    pub metrics: DerivedMetrics,
}

pub fn export(snapshot: &SessionSnapshot, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => to_json(snapshot),
        ExportFormat::Csv => Ok(to_csv(snapshot).into_bytes()),
    }
}

pub fn to_json(snapshot: &SessionSnapshot) -> Result<Vec<u8>> {
    let doc = ExportDocument {
        subject: snapshot.subject.clone(),
        exported_at: unix_ms_now(),
        capacity: snapshot.capacity,
        samples: snapshot.samples.clone(),
        alerts: snapshot.alerts.clone(),
        metrics: snapshot.metrics.clone(),
    };
    serde_json::to_vec_pretty(&doc).map_err(|e| VigilError::Export {
        reason: format!("JSON serialisation failed: {e}"),
    })
}

pub fn to_csv(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    write_samples(&mut out, &snapshot.samples);
    out.push('\n');
    write_alerts(&mut out, &snapshot.alerts);
    out
}

fn write_samples(out: &mut String, samples: &[Sample]) {
    let fields: BTreeSet<&str> = samples.iter().flat_map(Sample::field_names).collect();

    out.push_str("timestamp");
    for f in &fields {
        out.push(',');
        out.push_str(&escape(f));
    }
    out.push('\n');

    for s in samples {
        let _ = write!(out, "{}", s.timestamp());
        for f in &fields {
            out.push(',');
            if let Some(v) = s.get(f) {
                let _ = write!(out, "{v}");
            }
        }
        out.push('\n');
    }
}

fn write_alerts(out: &mut String, alerts: &[Alert]) {
    out.push_str(&ALERT_COLUMNS.join(","));
    out.push('\n');
    for a in alerts {
        let resolved_at = a.resolved_at.map(|t| t.to_string()).unwrap_or_default();
        let resolved_by = a.resolved_by.map(|r| r.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            a.id,
            escape(&a.rule_id),
            escape(&a.subject),
            a.severity,
            escape(&a.title),
            escape(&a.message),
            a.observed,
            a.threshold,
            a.created_at,
            a.updated_at,
            a.resolved,
            resolved_at,
            resolved_by,
        );
    }
}

/// Quote a cell when it contains a delimiter, quote or newline.
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
