//! Output formatting for samples, reports and history

use crate::core::logger::LogRecord;
use crate::core::monitor::StabilityReport;
use crate::core::sample::Sample;
use clap::ValueEnum;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
    /// CSV
    Csv,
}

/// Format a sample sequence
pub fn format_samples(samples: &[Sample], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => samples
            .iter()
            .map(|s| format!("[{}] {:.1}", s.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"), s.value))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(samples).unwrap_or_default(),
        OutputFormat::Csv => csv_table(Some(&["timestamp", "value"]), samples),
    }
}

/// Format one live sample
pub fn format_sample(sample: &Sample, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "[{}] {:.1}",
            sample.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            sample.value
        ),
        OutputFormat::Json => sample.to_message(),
        OutputFormat::Csv => csv_table(None, std::slice::from_ref(sample)),
    }
}

/// Format a stability report
pub fn format_report(report: &StabilityReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Csv => format!(
            "stable,mean,std_dev,threshold,count,outliers\n{},{},{},{},{},{}",
            report.stable,
            report.mean.map(|m| m.to_string()).unwrap_or_default(),
            report.std_dev.map(|s| s.to_string()).unwrap_or_default(),
            report.threshold,
            report.values.len(),
            report.outliers.len()
        ),
        OutputFormat::Text => match (report.mean, report.std_dev) {
            (Some(mean), Some(std_dev)) => {
                let mut text = format!(
                    "{} (mean {:.2}, std dev {:.3}, threshold {}, {} readings)",
                    if report.stable { "STABLE" } else { "NOT STABLE" },
                    mean,
                    std_dev,
                    report.threshold,
                    report.values.len()
                );
                for outlier in &report.outliers {
                    text.push_str(&format!("\n  outlier: {}", format_sample(outlier, OutputFormat::Text)));
                }
                text
            }
            _ => "NOT STABLE (no readings collected)".to_string(),
        },
    }
}

/// Format history records
pub fn format_history(records: &[LogRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_default(),
        OutputFormat::Csv => csv_table(Some(&["timestamp", "device_id", "value"]), records),
        OutputFormat::Text => records
            .iter()
            .map(|r| {
                format!(
                    "[{}] {} {:.1}",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    r.device_id,
                    r.value
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render `rows` as CSV, without the trailing line break
fn csv_table<T: Serialize>(header: Option<&[&str]>, rows: &[T]) -> String {
    write_csv(header, rows).unwrap_or_default()
}

fn write_csv<T: Serialize>(header: Option<&[&str]>, rows: &[T]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if let Some(header) = header {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
}
