//! Inventory entities - serialised devices and ERP stock items
//!
//! Two catalogues share `device_inventory.db`:
//!
//! - **Devices**: individually tracked units, sold once (see [`sell_device`])
//! - **Products**: stocked items with a quantity on hand, grouped by category and supplier

use rusqlite::types::Value;
use rusqlite::{params, Connection};

use crate::core::config::ResalePolicy;
use crate::core::db::Database;
use crate::core::error::{StoreError, StoreResult};
use crate::core::schema::{ColumnDef, Dependent, OnDelete, Order, TableSchema, WritePolicy};
use crate::core::store::RecordStore;
use crate::core::value::{Fields, Record};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    model TEXT,
    category TEXT,
    purchase_cost REAL,
    list_price REAL,
    status TEXT DEFAULT 'in_stock',
    location TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL REFERENCES devices(id),
    sale_price REAL NOT NULL,
    customer_name TEXT,
    customer_phone TEXT,
    sale_date TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_sales_device ON sales(device_id);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS suppliers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    contact_person TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sku TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category_id INTEGER REFERENCES categories(id),
    supplier_id INTEGER REFERENCES suppliers(id),
    quantity INTEGER DEFAULT 0 CHECK (quantity >= 0),
    reorder_point INTEGER DEFAULT 0,
    unit_cost REAL,
    unit_price REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS product_sales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id),
    quantity INTEGER NOT NULL CHECK (quantity >= 1),
    unit_price REAL NOT NULL,
    total REAL NOT NULL,
    sold_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_product_sales_product ON product_sales(product_id);
"#;

/// Device lifecycle states
pub const DEVICE_STATUSES: &[&str] = &["in_stock", "sold", "repair", "retired"];

pub static DEVICES: TableSchema = TableSchema {
    name: "devices",
    entity: "device",
    columns: &[
        ColumnDef::text("serial_number").required().unique().searchable(),
        ColumnDef::text("name").required().searchable(),
        ColumnDef::text("model").searchable(),
        ColumnDef::text("category").searchable(),
        ColumnDef::real("purchase_cost").non_negative(),
        ColumnDef::real("list_price").non_negative(),
        ColumnDef::choice("status", DEVICE_STATUSES),
        ColumnDef::text("location").searchable(),
        ColumnDef::text("notes"),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[Dependent {
        table: "sales",
        column: "device_id",
        on_delete: OnDelete::Restrict,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static SALES: TableSchema = TableSchema {
    name: "sales",
    entity: "sale",
    columns: &[
        ColumnDef::integer("device_id").required().references("devices"),
        ColumnDef::real("sale_price").required().non_negative(),
        ColumnDef::text("customer_name").searchable(),
        ColumnDef::text("customer_phone").searchable(),
        ColumnDef::date("sale_date"),
        ColumnDef::text("notes"),
        ColumnDef::created_at(),
    ],
    order: Order::newest_first(),
    dependents: &[],
    policy: WritePolicy::AppendOnly,
    check: None,
};

pub static CATEGORIES: TableSchema = TableSchema {
    name: "categories",
    entity: "category",
    columns: &[
        ColumnDef::text("name").required().unique().searchable(),
        ColumnDef::text("description").searchable(),
        ColumnDef::created_at(),
    ],
    order: Order::by("name"),
    dependents: &[Dependent {
        table: "products",
        column: "category_id",
        on_delete: OnDelete::Restrict,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static SUPPLIERS: TableSchema = TableSchema {
    name: "suppliers",
    entity: "supplier",
    columns: &[
        ColumnDef::text("name").required().unique().searchable(),
        ColumnDef::text("contact_person").searchable(),
        ColumnDef::text("email").searchable(),
        ColumnDef::text("phone"),
        ColumnDef::text("address"),
        ColumnDef::created_at(),
    ],
    order: Order::by("name"),
    dependents: &[Dependent {
        table: "products",
        column: "supplier_id",
        on_delete: OnDelete::Restrict,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static PRODUCTS: TableSchema = TableSchema {
    name: "products",
    entity: "product",
    columns: &[
        ColumnDef::text("sku").required().unique().searchable(),
        ColumnDef::text("name").required().searchable(),
        ColumnDef::integer("category_id").references("categories"),
        ColumnDef::integer("supplier_id").references("suppliers"),
        ColumnDef::integer("quantity").non_negative(),
        ColumnDef::integer("reorder_point").non_negative(),
        ColumnDef::real("unit_cost").non_negative(),
        ColumnDef::real("unit_price").non_negative(),
        ColumnDef::created_at(),
    ],
    order: Order::by("name"),
    dependents: &[Dependent {
        table: "product_sales",
        column: "product_id",
        on_delete: OnDelete::Restrict,
    }],
    policy: WritePolicy::Open,
    check: None,
};

pub static PRODUCT_SALES: TableSchema = TableSchema {
    name: "product_sales",
    entity: "product sale",
    columns: &[
        ColumnDef::integer("product_id").required().references("products"),
        ColumnDef::integer("quantity").required().min(1.0),
        ColumnDef::real("unit_price").required().non_negative(),
        ColumnDef::real("total").required().non_negative(),
        ColumnDef::text("sold_at").managed(),
    ],
    order: Order {
        column: "sold_at",
        descending: true,
    },
    dependents: &[],
    policy: WritePolicy::AppendOnly,
    check: None,
};

pub static TABLES: &[&TableSchema] = &[
    &DEVICES,
    &SALES,
    &CATEGORIES,
    &SUPPLIERS,
    &PRODUCTS,
    &PRODUCT_SALES,
];

/// Sell a device: record one sale and mark the device sold, atomically
///
/// `fields` carries the sale columns (`sale_price`, `customer_name`, ...);
/// any `device_id` in it is ignored in favour of `device_id`.
pub fn sell_device(
    db: &mut Database,
    device_id: i64,
    fields: &Fields,
    policy: ResalePolicy,
) -> StoreResult<i64> {
    let tx = db.transaction()?;
    let device = RecordStore::new(&tx, &DEVICES).get(device_id)?;
    match device.text("status") {
        None | Some("in_stock") => {}
        Some("sold") => match policy {
            ResalePolicy::Reject => return Err(StoreError::AlreadySold { device_id }),
            ResalePolicy::Allow => {
                tracing::warn!(device_id, "recording another sale for a sold device")
            }
        },
        Some(status) => {
            return Err(StoreError::validation(
                "status",
                format!("device {} is {} and cannot be sold", device_id, status),
            ))
        }
    }

    let mut sale = fields.clone();
    sale.insert("device_id", device_id.to_string());
    let sale_id = RecordStore::new(&tx, &SALES).insert(&sale)?;
    RecordStore::new(&tx, &DEVICES).patch(device_id, &Fields::new().with("status", "sold"))?;
    tx.commit()?;

    tracing::info!(device_id, sale_id, "device sold");
    Ok(sale_id)
}

/// Sell `quantity` units of a product, returning the sale id
///
/// The product's own `unit_price` is used when `unit_price` is `None`.
pub fn sell_product(
    db: &mut Database,
    product_id: i64,
    quantity: i64,
    unit_price: Option<f64>,
) -> StoreResult<i64> {
    if quantity < 1 {
        return Err(StoreError::validation("quantity", "must be at least 1"));
    }
    let tx = db.transaction()?;
    let product = RecordStore::new(&tx, &PRODUCTS).get(product_id)?;
    let available = product.integer("quantity").unwrap_or(0);
    if quantity > available {
        return Err(StoreError::InsufficientStock {
            product_id,
            available,
            requested: quantity,
        });
    }
    let price = match unit_price.or_else(|| product.real("unit_price")) {
        Some(price) => price,
        None => return Err(StoreError::validation("unit_price", "product has no price; pass one")),
    };

    let total = (price * quantity as f64 * 100.0).round() / 100.0;
    let sale = Fields::new()
        .with("product_id", product_id.to_string())
        .with("quantity", quantity.to_string())
        .with("unit_price", price.to_string())
        .with("total", total.to_string());
    let sale_id = RecordStore::new(&tx, &PRODUCT_SALES).insert(&sale)?;
    adjust_quantity(&tx, product_id, -quantity)?;
    tx.commit()?;

    tracing::info!(product_id, quantity, sale_id, "product sold");
    Ok(sale_id)
}

/// Add received units to a product, returning the new quantity on hand
pub fn restock_product(db: &mut Database, product_id: i64, quantity: i64) -> StoreResult<i64> {
    if quantity < 1 {
        return Err(StoreError::validation("quantity", "must be at least 1"));
    }
    let tx = db.transaction()?;
    if !RecordStore::new(&tx, &PRODUCTS).exists(product_id)? {
        return Err(StoreError::not_found(PRODUCTS.entity, product_id));
    }
    let on_hand = adjust_quantity(&tx, product_id, quantity)?;
    tx.commit()?;

    tracing::info!(product_id, quantity, on_hand, "product restocked");
    Ok(on_hand)
}

/// Sales recorded against one device, newest first
pub fn device_sales(db: &Database, device_id: i64) -> StoreResult<Vec<Record>> {
    db.store(&DEVICES).get(device_id)?;
    db.store(&SALES).filter_by("device_id", &Value::Integer(device_id))
}

fn adjust_quantity(conn: &Connection, product_id: i64, delta: i64) -> StoreResult<i64> {
    conn.execute(
        "UPDATE products SET quantity = COALESCE(quantity, 0) + ?1 WHERE id = ?2",
        params![delta, product_id],
    )
    .map_err(|e| StoreError::from_write(PRODUCTS.name, e))?;
    let on_hand = conn.query_row(
        "SELECT quantity FROM products WHERE id = ?1",
        params![product_id],
        |row| row.get(0),
    )?;
    Ok(on_hand)
}
