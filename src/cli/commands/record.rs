//! `tally record` command - generic access to any table
//!
//! Every table of every domain is reachable by name. Values are passed as
//! `--set column=value` pairs and go through the field assembler, so unknown
//! and managed columns are dropped and types are checked before any SQL runs.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{config, open_database, output_format, success};
use crate::cli::table::{print_record, RecordFormatter, TableConfig};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::schema::TableSchema;
use crate::core::{find_table, Database, Domain, Fields, SearchOptions};

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// Create a row
    New(NewArgs),

    /// List rows with search and ordering
    List(ListArgs),

    /// Show one row
    Show(ShowArgs),

    /// Change some columns of a row
    Edit(EditArgs),

    /// Delete a row (cascades or refuses per table)
    Delete(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Table name (see `tally schema`)
    pub table: String,

    /// Column values as column=value (repeatable)
    #[arg(long = "set", short = 's', value_name = "COLUMN=VALUE")]
    pub set: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Table name (see `tally schema`)
    pub table: String,

    /// Case-insensitive substring over the searchable columns
    #[arg(long)]
    pub search: Option<String>,

    /// Sort by column (default: the table's natural order)
    #[arg(long)]
    pub sort: Option<String>,

    /// Reverse sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Columns to display (comma-separated; default: all)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Table name (see `tally schema`)
    pub table: String,

    /// Row id
    pub id: i64,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Table name (see `tally schema`)
    pub table: String,

    /// Row id
    pub id: i64,

    /// Column values as column=value (repeatable)
    #[arg(long = "set", short = 's', value_name = "COLUMN=VALUE", required = true)]
    pub set: Vec<String>,
}

pub fn run(cmd: RecordCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        RecordCommands::New(args) => run_new(args, global),
        RecordCommands::List(args) => run_list(args, global),
        RecordCommands::Show(args) => run_show(args, global),
        RecordCommands::Edit(args) => run_edit(args, global),
        RecordCommands::Delete(args) => run_delete(args, global),
    }
}

/// Resolve a table name across all domains
pub fn resolve_table(name: &str) -> Result<(Domain, &'static TableSchema)> {
    find_table(name.trim()).ok_or_else(|| {
        let known: Vec<&str> = Domain::ALL
            .iter()
            .flat_map(|d| d.tables().iter().map(|t| t.name))
            .collect();
        miette::miette!("unknown table '{}' (tables: {})", name, known.join(", "))
    })
}

fn open_table(table: &str, global: &GlobalOpts) -> Result<(Database, &'static TableSchema)> {
    let (domain, schema) = resolve_table(table)?;
    Ok((open_database(global, domain)?, schema))
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let (db, schema) = open_table(&args.table, global)?;
    let fields = Fields::from_assignments(&args.set)?;
    let id = db.store(schema).create(&fields)?;

    if global.format == OutputFormat::Id {
        println!("{}", id);
    } else {
        success(
            global,
            format!("Created {} {}", schema.entity, style(id).cyan()),
        );
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (db, schema) = open_table(&args.table, global)?;
    let options = SearchOptions {
        term: args.search.clone(),
        sort: args.sort.clone(),
        reverse: args.reverse,
        limit: args.limit,
    };
    let records = db.store(schema).search(&options)?;

    if args.count {
        println!("{}", records.len());
        return Ok(());
    }

    if records.is_empty() {
        if !global.quiet {
            println!("No {} rows found.", schema.name);
        }
        return Ok(());
    }

    let config = config(global);
    let format = output_format(global, &config, OutputFormat::Tsv);
    let table_config = if global.quiet {
        TableConfig::for_pipe()
    } else {
        TableConfig::default()
    };
    RecordFormatter::new(schema)
        .with_columns(&args.columns)?
        .with_config(table_config)
        .output(&records, format)
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (db, schema) = open_table(&args.table, global)?;
    let record = db.store(schema).get(args.id)?;
    let config = config(global);
    let format = output_format(global, &config, OutputFormat::Yaml);
    print_record(schema, &record, format)
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let (db, schema) = open_table(&args.table, global)?;
    let fields = Fields::from_assignments(&args.set)?;
    db.store(schema).update(args.id, &fields)?;
    success(
        global,
        format!("Updated {} {}", schema.entity, style(args.id).cyan()),
    );
    Ok(())
}

fn run_delete(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (db, schema) = open_table(&args.table, global)?;
    db.store(schema).delete(args.id)?;
    success(
        global,
        format!("Deleted {} {}", schema.entity, style(args.id).cyan()),
    );
    Ok(())
}
