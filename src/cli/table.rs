//! Table formatting for record list and show commands
//!
//! One formatter serves every table: columns come from the table metadata,
//! values from the stored rows. CSV and ID output stay single-line for
//! piping; TSV truncates long cells to keep rows aligned.

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::truncate_str;
use crate::cli::OutputFormat;
use crate::core::schema::TableSchema;
use crate::core::value::{display_value, Record};

/// Configuration for table output
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Widest a TSV column may grow before cells are truncated
    pub max_width: usize,
    /// Show summary line after table (e.g., "5 account(s) found")
    pub show_summary: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_width: 30,
            show_summary: true,
        }
    }
}

impl TableConfig {
    /// Config for piping (no summary)
    pub fn for_pipe() -> Self {
        Self {
            show_summary: false,
            ..Self::default()
        }
    }
}

/// Formats a list of records of one table
pub struct RecordFormatter {
    schema: &'static TableSchema,
    columns: Vec<&'static str>,
    config: TableConfig,
}

impl RecordFormatter {
    /// Show every column of `schema`
    pub fn new(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            columns: schema.columns.iter().map(|c| c.name).collect(),
            config: TableConfig::default(),
        }
    }

    /// Restrict output to the named columns, in the given order
    ///
    /// Unknown names are a validation error so typos don't silently vanish.
    pub fn with_columns<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let column = self.schema.column(name).ok_or_else(|| {
                miette::miette!(
                    "unknown column '{}' for {} (columns: {})",
                    name,
                    self.schema.name,
                    self.schema.columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
                )
            })?;
            columns.push(column.name);
        }
        self.columns = columns;
        Ok(self)
    }

    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Print records in the requested format
    pub fn output(&self, records: &[Record], format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(records).into_diagnostic()?);
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yml::to_string(&records).into_diagnostic()?);
            }
            OutputFormat::Csv => self.output_csv(records)?,
            OutputFormat::Md => self.output_md(records),
            OutputFormat::Id => {
                for record in records {
                    println!("{}", record.id);
                }
            }
            OutputFormat::Tsv | OutputFormat::Auto => self.output_tsv(records),
        }
        Ok(())
    }

    fn cell(record: &Record, column: &str) -> String {
        record.get(column).map(display_value).unwrap_or_default()
    }

    fn calculate_widths(&self, records: &[Record]) -> Vec<usize> {
        let id_width = records
            .iter()
            .map(|r| r.id.to_string().len())
            .max()
            .unwrap_or(0)
            .max(2);

        let mut widths = vec![id_width];
        for column in &self.columns {
            let content = records
                .iter()
                .map(|r| Self::cell(r, column).chars().count())
                .max()
                .unwrap_or(0);
            widths.push(column.len().max(content).min(self.config.max_width));
        }
        widths
    }

    fn output_tsv(&self, records: &[Record]) {
        let widths = self.calculate_widths(records);

        let mut header = vec![style(format!("{:<w$}", "ID", w = widths[0]))
            .bold()
            .dim()
            .to_string()];
        for (column, width) in self.columns.iter().zip(&widths[1..]) {
            let title = column.to_uppercase();
            header.push(style(format!("{:<w$}", title, w = *width)).bold().to_string());
        }
        println!("{}", header.join(" "));

        let total: usize = widths.iter().sum::<usize>() + widths.len() - 1;
        println!("{}", "-".repeat(total));

        for record in records {
            let mut row = vec![style(format!("{:<w$}", record.id, w = widths[0]))
                .cyan()
                .to_string()];
            for (column, width) in self.columns.iter().zip(&widths[1..]) {
                let text = truncate_str(&Self::cell(record, column), *width);
                row.push(format!("{:<w$}", text, w = *width));
            }
            println!("{}", row.join(" ").trim_end());
        }

        if self.config.show_summary {
            println!();
            println!(
                "{} {}(s) found.",
                style(records.len()).cyan(),
                self.schema.entity
            );
        }
    }

    fn output_csv(&self, records: &[Record]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        let mut header = vec!["id"];
        header.extend(self.columns.iter().copied());
        writer.write_record(&header).into_diagnostic()?;

        for record in records {
            let mut row = vec![record.id.to_string()];
            row.extend(self.columns.iter().map(|c| Self::cell(record, c)));
            writer.write_record(&row).into_diagnostic()?;
        }
        writer.flush().into_diagnostic()?;
        Ok(())
    }

    fn output_md(&self, records: &[Record]) {
        let mut header = vec!["id"];
        header.extend(self.columns.iter().copied());
        println!("| {} |", header.join(" | "));
        println!("|{}|", vec!["---"; header.len()].join("|"));

        for record in records {
            let mut row = vec![record.id.to_string()];
            row.extend(
                self.columns
                    .iter()
                    .map(|c| Self::cell(record, c).replace('|', "\\|")),
            );
            println!("| {} |", row.join(" | "));
        }
    }
}

/// Print a single record; YAML unless another format is requested
pub fn print_record(schema: &TableSchema, record: &Record, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record).into_diagnostic()?);
        }
        OutputFormat::Id => println!("{}", record.id),
        OutputFormat::Tsv | OutputFormat::Csv | OutputFormat::Md => {
            let width = schema
                .columns
                .iter()
                .map(|c| c.name.len())
                .max()
                .unwrap_or(2);
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {}",
                style(format!("{:<w$}", "id", w = width)).bold(),
                style(record.id).cyan()
            );
            for (name, value) in &record.values {
                let text = display_value(value);
                if !text.is_empty() {
                    println!("{}: {}", style(format!("{:<w$}", name, w = width)).bold(), text);
                }
            }
            println!("{}", style("─".repeat(60)).dim());
        }
        OutputFormat::Yaml | OutputFormat::Auto => {
            print!("{}", serde_yml::to_string(record).into_diagnostic()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::inventory::CATEGORIES;
    use rusqlite::types::Value;

    fn record(id: i64, name: &str) -> Record {
        Record {
            id,
            values: vec![
                ("name".to_string(), Value::Text(name.to_string())),
                ("description".to_string(), Value::Null),
            ],
        }
    }

    #[test]
    fn test_default_columns_follow_schema() {
        let formatter = RecordFormatter::new(&CATEGORIES);
        assert_eq!(formatter.columns[0], "name");
        assert_eq!(formatter.columns.len(), CATEGORIES.columns.len());
    }

    #[test]
    fn test_with_columns_rejects_unknown() {
        assert!(RecordFormatter::new(&CATEGORIES).with_columns(&["colour"]).is_err());
        let formatter = RecordFormatter::new(&CATEGORIES).with_columns(&["name"]).unwrap();
        assert_eq!(formatter.columns, vec!["name"]);
    }

    #[test]
    fn test_widths_are_capped() {
        let formatter = RecordFormatter::new(&CATEGORIES)
            .with_columns(&["name"])
            .unwrap()
            .with_config(TableConfig {
                max_width: 10,
                show_summary: false,
            });
        let rows = [record(7, "Cables"), record(12, "Networking equipment")];
        assert_eq!(formatter.calculate_widths(&rows), vec![2, 10]);
    }

    #[test]
    fn test_null_cells_are_empty() {
        assert_eq!(RecordFormatter::cell(&record(1, "Cables"), "description"), "");
        assert_eq!(RecordFormatter::cell(&record(1, "Cables"), "name"), "Cables");
    }
}
