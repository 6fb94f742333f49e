//! Report renderers: terminal table, CSV file and HTML print preview

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rust_embed::Embed;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use tera::Tera;

use super::ReportTable;
use crate::core::error::{StoreError, StoreResult};

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const HTML_TEMPLATE: &str = "report.html.tera";

#[derive(Serialize)]
struct HtmlCell {
    text: String,
    numeric: bool,
}

/// UTF-8 byte order mark, for spreadsheet programs that need it
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Table for terminal output (`markdown` selects pipe-table style)
pub fn render_table(table: &ReportTable, currency: &str, markdown: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().map(String::as_str));
    for row in table.formatted_rows(currency) {
        builder.push_record(row);
    }

    let mut rendered = builder.build();
    if markdown {
        rendered.with(Style::markdown());
    } else {
        rendered.with(Style::rounded());
    }
    rendered.to_string()
}

/// Write the report as CSV: header row, then formatted cells
pub fn write_csv<W: Write>(
    table: &ReportTable,
    writer: W,
    currency: &str,
    bom: bool,
) -> StoreResult<()> {
    let mut writer = writer;
    if bom {
        writer.write_all(BOM)?;
    }
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.headers)?;
    for row in table.formatted_rows(currency) {
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the report as a CSV file
pub fn export_csv(table: &ReportTable, path: &Path, currency: &str, bom: bool) -> StoreResult<PathBuf> {
    let file = File::create(path)?;
    write_csv(table, BufWriter::new(file), currency, bom)?;
    tracing::info!(report = %table.kind, path = %path.display(), "csv exported");
    Ok(path.to_path_buf())
}

/// Render the HTML print view
pub fn render_html(table: &ReportTable, currency: &str) -> StoreResult<String> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![".html.tera"]);
    let template = EmbeddedTemplates::get(HTML_TEMPLATE).ok_or_else(|| {
        StoreError::Integrity(format!("embedded template {} is missing", HTML_TEMPLATE))
    })?;
    let source = std::str::from_utf8(&template.data)
        .map_err(|e| StoreError::Integrity(format!("{}: {}", HTML_TEMPLATE, e)))?;
    tera.add_raw_template(HTML_TEMPLATE, source)?;

    let rows: Vec<Vec<HtmlCell>> = table
        .rows
        .iter()
        .zip(table.formatted_rows(currency))
        .map(|(raw, text)| {
            raw.iter()
                .zip(text)
                .map(|(value, text)| HtmlCell {
                    text,
                    numeric: matches!(value, Value::Integer(_) | Value::Real(_)),
                })
                .collect()
        })
        .collect();

    let mut context = tera::Context::new();
    context.insert("title", table.title());
    context.insert(
        "generated",
        &chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
    );
    context.insert("headers", &table.headers);
    context.insert("rows", &rows);
    Ok(tera.render(HTML_TEMPLATE, &context)?)
}

/// Write the HTML print view to `path`
pub fn write_html(table: &ReportTable, path: &Path, currency: &str) -> StoreResult<PathBuf> {
    std::fs::write(path, render_html(table, currency)?)?;
    tracing::info!(report = %table.kind, path = %path.display(), "html written");
    Ok(path.to_path_buf())
}

/// Write the HTML print view to a fresh file in the temp directory
pub fn write_html_preview(table: &ReportTable, currency: &str) -> StoreResult<PathBuf> {
    let name = format!(
        "tally-{}-{}-{}.html",
        table.kind.slug(),
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        std::process::id()
    );
    write_html(table, &std::env::temp_dir().join(name), currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;

    fn sample() -> ReportTable {
        ReportTable {
            kind: ReportKind::ProfitMarginAnalysis,
            headers: ["SKU", "Product", "Unit Cost", "Unit Price", "Profit", "Margin %"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![
                vec![
                    Value::Text("A-1".into()),
                    Value::Text("Cable, \"braided\"".into()),
                    Value::Real(3.0),
                    Value::Real(9.0),
                    Value::Real(6.0),
                    Value::Real(66.6667),
                ],
                vec![
                    Value::Text("B-2".into()),
                    Value::Text("<Adapter>".into()),
                    Value::Null,
                    Value::Integer(5),
                    Value::Real(5.0),
                    Value::Real(100.0),
                ],
            ],
        }
    }

    #[test]
    fn test_csv_has_header_row_and_quotes() {
        let mut out = Vec::new();
        write_csv(&sample(), &mut out, "$", false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("SKU,Product,Unit Cost,Unit Price,Profit,Margin %")
        );
        assert_eq!(
            lines.next(),
            Some("A-1,\"Cable, \"\"braided\"\"\",$3.00,$9.00,$6.00,66.67%")
        );
        assert_eq!(lines.next(), Some("B-2,<Adapter>,,$5,$5.00,100.00%"));
    }

    #[test]
    fn test_csv_bom_is_optional() {
        let mut with_bom = Vec::new();
        write_csv(&sample(), &mut with_bom, "$", true).unwrap();
        assert!(with_bom.starts_with(BOM));

        let mut plain = Vec::new();
        write_csv(&sample(), &mut plain, "$", false).unwrap();
        assert!(plain.starts_with(b"SKU"));
    }

    #[test]
    fn test_html_is_escaped() {
        let html = render_html(&sample(), "$").unwrap();
        assert!(html.contains("<title>Profit Margin Analysis</title>"));
        assert!(html.contains("&lt;Adapter&gt;"));
        assert!(!html.contains("<Adapter>"));
        assert!(html.contains("66.67%"));
    }

    #[test]
    fn test_html_preview_file() {
        let path = write_html_preview(&sample(), "$").unwrap();
        assert!(path.extension().is_some_and(|e| e == "html"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("Margin %"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_terminal_table() {
        let text = render_table(&sample(), "$", true);
        assert!(text.contains("| SKU"));
        assert!(text.contains("$9.00"));
        assert!(render_table(&sample(), "$", false).contains("╭"));
    }
}
