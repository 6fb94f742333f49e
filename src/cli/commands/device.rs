//! `tally device` command - selling serialised devices

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{config, money, open_database, output_format, success};
use crate::cli::table::RecordFormatter;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Domain, Fields};
use crate::entities::inventory::{self, SALES};

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Sell a device: records the sale and marks it sold
    Sell(SellArgs),

    /// List the sales recorded against a device
    Sales(SalesArgs),
}

#[derive(clap::Args, Debug)]
pub struct SellArgs {
    /// Device id
    pub device: i64,

    /// Sale price
    #[arg(long)]
    pub price: String,

    /// Customer name
    #[arg(long)]
    pub customer: Option<String>,

    /// Customer phone
    #[arg(long)]
    pub phone: Option<String>,

    /// Sale date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SalesArgs {
    /// Device id
    pub device: i64,
}

pub fn run(cmd: DeviceCommands, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global, Domain::Inventory)?;
    let config = config(global);

    match cmd {
        DeviceCommands::Sell(args) => {
            let mut sale = Fields::new().with("sale_price", args.price.clone());
            let optional = [
                ("customer_name", args.customer),
                ("customer_phone", args.phone),
                ("sale_date", args.date),
                ("notes", args.notes),
            ];
            for (column, value) in optional.into_iter().filter_map(|(c, v)| Some((c, v?))) {
                sale.insert(column, value);
            }

            let sale_id =
                inventory::sell_device(&mut db, args.device, &sale, config.resale_policy())?;
            if global.format == OutputFormat::Id {
                println!("{}", sale_id);
            } else {
                let price = args
                    .price
                    .trim()
                    .parse::<f64>()
                    .map(|p| money(p, config.currency_symbol()))
                    .unwrap_or(args.price);
                success(
                    global,
                    format!(
                        "Sold device {} for {} (sale {})",
                        style(args.device).cyan(),
                        price,
                        style(sale_id).cyan()
                    ),
                );
            }
        }
        DeviceCommands::Sales(args) => {
            let sales = inventory::device_sales(&db, args.device)?;
            if sales.is_empty() {
                if !global.quiet {
                    println!("No sales recorded for device {}.", args.device);
                }
                return Ok(());
            }
            RecordFormatter::new(&SALES)
                .output(&sales, output_format(global, &config, OutputFormat::Tsv))?;
        }
    }
    Ok(())
}
