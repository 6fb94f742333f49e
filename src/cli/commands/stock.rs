//! `tally stock` command - product stock movements

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_database, success};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Domain;
use crate::entities::inventory;

#[derive(Subcommand, Debug)]
pub enum StockCommands {
    /// Sell units of a product, decrementing stock
    Sell(SellArgs),

    /// Add received units to a product
    Restock(RestockArgs),
}

#[derive(clap::Args, Debug)]
pub struct SellArgs {
    /// Product id
    pub product: i64,

    /// Units sold
    pub quantity: i64,

    /// Unit price (default: the product's price)
    #[arg(long)]
    pub price: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct RestockArgs {
    /// Product id
    pub product: i64,

    /// Units received
    pub quantity: i64,
}

pub fn run(cmd: StockCommands, global: &GlobalOpts) -> Result<()> {
    let mut db = open_database(global, Domain::Inventory)?;

    match cmd {
        StockCommands::Sell(args) => {
            let sale_id = inventory::sell_product(&mut db, args.product, args.quantity, args.price)?;
            if global.format == OutputFormat::Id {
                println!("{}", sale_id);
            } else {
                success(
                    global,
                    format!(
                        "Sold {} unit(s) of product {} (sale {})",
                        args.quantity,
                        style(args.product).cyan(),
                        style(sale_id).cyan()
                    ),
                );
            }
        }
        StockCommands::Restock(args) => {
            let on_hand = inventory::restock_product(&mut db, args.product, args.quantity)?;
            success(
                global,
                format!(
                    "Restocked product {}; {} on hand",
                    style(args.product).cyan(),
                    style(on_hand).yellow()
                ),
            );
        }
    }
    Ok(())
}
