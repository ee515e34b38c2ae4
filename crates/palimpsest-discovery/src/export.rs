//! Report serialization.

use palimpsest_contracts::{
    error::{LedgerError, LedgerResult},
    report::{ExportFormat, LegalReport},
};

pub const CSV_HEADER: &str = "id,author,status,digest,created_at";

/// Serialize `report` in `format`.
///
/// JSON is the whole report, pretty-printed. CSV is one row per snapshot
/// entry with the columns in `CSV_HEADER`.
pub fn render(report: &LegalReport, format: ExportFormat) -> LedgerResult<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(report).map_err(|e| LedgerError::ReportGeneration {
            reason: format!("failed to serialize report '{}': {}", report.id, e),
        }),
        ExportFormat::Csv => Ok(render_csv(report)),
    }
}

fn render_csv(report: &LegalReport) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for entry in &report.snapshot.entries {
        let row = [
            csv_field(entry.id.as_str()),
            csv_field(&entry.author),
            entry.status.to_string(),
            entry.digest.to_hex(),
            entry.created_at.to_rfc3339(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field if it contains a delimiter, quote, or line break (RFC 4180).
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::csv_field;

    #[test]
    fn plain_field_is_unquoted() {
        assert_eq!(csv_field("desk1"), "desk1");
    }

    #[test]
    fn field_with_comma_or_quote_is_quoted() {
        assert_eq!(csv_field("Smith, J."), "\"Smith, J.\"");
        assert_eq!(csv_field("the \"desk\""), "\"the \"\"desk\"\"\"");
    }
}
