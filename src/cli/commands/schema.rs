//! Schema introspection
//!
//! Shows which tables exist, which columns they accept and how writes to
//! them are checked, so `--set` pairs can be written without reading code.

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::record::resolve_table;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::schema::{ColumnDef, OnDelete, TableSchema, WritePolicy};
use crate::core::Domain;

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Table to describe (default: list all tables)
    pub table: Option<String>,
}

pub fn run(args: SchemaArgs, global: &GlobalOpts) -> Result<()> {
    let Some(name) = args.table else {
        list_tables();
        return Ok(());
    };

    let (domain, schema) = resolve_table(&name)?;
    if global.format == OutputFormat::Json {
        let json = table_json(domain, schema);
        println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
    } else {
        show_table(domain, schema);
    }
    Ok(())
}

fn policy_label(policy: WritePolicy) -> &'static str {
    match policy {
        WritePolicy::Open => "open",
        WritePolicy::CompoundCreate => "compound create",
        WritePolicy::AppendOnly => "append only",
    }
}

fn list_tables() {
    println!(
        "{:<11} {:<22} {:<8} {}",
        style("DATABASE").bold(),
        style("TABLE").bold(),
        style("COLUMNS").bold(),
        style("WRITES").bold()
    );
    println!("{}", "-".repeat(60));
    for domain in Domain::ALL {
        for table in domain.tables() {
            println!(
                "{:<11} {:<22} {:<8} {}",
                domain.as_str(),
                style(table.name).cyan(),
                table.columns.len(),
                policy_label(table.policy)
            );
        }
    }
    println!("\nUse 'tally schema <table>' for column details");
}

fn flags(column: &ColumnDef) -> String {
    let mut flags = Vec::new();
    if column.required {
        flags.push("required".to_string());
    }
    if column.unique {
        flags.push("unique".to_string());
    }
    if column.searchable {
        flags.push("search".to_string());
    }
    if column.managed {
        flags.push("managed".to_string());
    }
    match (column.min, column.max) {
        (Some(min), Some(max)) => flags.push(format!("{}..={}", min, max)),
        (Some(min), None) => flags.push(format!(">= {}", min)),
        (None, Some(max)) => flags.push(format!("<= {}", max)),
        (None, None) => {}
    }
    if let Some(parent) = column.references {
        flags.push(format!("-> {}", parent));
    }
    flags.join(", ")
}

fn show_table(domain: Domain, schema: &TableSchema) {
    println!("{}", style(schema.name).bold());
    println!("{}", "=".repeat(schema.name.len()));
    println!("Database: {}", domain.file_name());
    println!("Writes:   {}", policy_label(schema.policy));
    println!(
        "Order:    {} {}",
        schema.order.column,
        if schema.order.descending { "desc" } else { "asc" }
    );
    println!();

    let width = schema
        .columns
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(4);
    for column in schema.columns {
        let name = format!("{:<w$}", column.name, w = width);
        let name = if column.required {
            style(name).yellow()
        } else if column.managed {
            style(name).dim()
        } else {
            style(name)
        };
        println!("  {} {:<22} {}", name, column.kind.label(), style(flags(column)).dim());
    }

    if !schema.dependents.is_empty() {
        println!();
        println!("Dependents:");
        for dep in schema.dependents {
            let action = match dep.on_delete {
                OnDelete::Restrict => "restrict",
                OnDelete::Cascade => "cascade",
            };
            println!("  {}.{} ({})", dep.table, dep.column, action);
        }
    }
}

fn table_json(domain: Domain, schema: &TableSchema) -> serde_json::Value {
    let columns: Vec<_> = schema
        .columns
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "type": c.kind.label(),
                "required": c.required,
                "unique": c.unique,
                "searchable": c.searchable,
                "managed": c.managed,
                "min": c.min,
                "max": c.max,
                "references": c.references,
            })
        })
        .collect();
    serde_json::json!({
        "table": schema.name,
        "database": domain.as_str(),
        "writes": policy_label(schema.policy),
        "columns": columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::bank::ACCOUNTS;
    use crate::entities::inventory::PRODUCTS;

    #[test]
    fn test_flags_describe_column_rules() {
        let sku = PRODUCTS.column("sku").unwrap();
        assert_eq!(flags(sku), "required, unique, search");

        let category = PRODUCTS.column("category_id").unwrap();
        assert_eq!(flags(category), "-> categories");

        let balance = ACCOUNTS.column("balance").unwrap();
        assert!(flags(balance).contains("managed"));
    }

    #[test]
    fn test_table_json_lists_every_column() {
        let json = table_json(Domain::Bank, &ACCOUNTS);
        assert_eq!(json["table"], "accounts");
        assert_eq!(json["writes"], "compound create");
        assert_eq!(
            json["columns"].as_array().unwrap().len(),
            ACCOUNTS.columns.len()
        );
    }
}
