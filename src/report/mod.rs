//! Report formatter - named queries rendered as tables, CSV or HTML
//!
//! Every report is a fixed SQL query plus its column headers. The set of
//! reports is closed: [`ReportKind`] lists them all, and parsing any other
//! name fails with [`StoreError::UnsupportedReportType`].

pub mod export;
pub mod format;

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;
use serde::Serialize;

use crate::core::db::{Database, Domain};
use crate::core::error::{StoreError, StoreResult};

pub use export::{export_csv, render_html, render_table, write_csv, write_html, write_html_preview};
pub use format::{format_cell, is_monetary};

/// Query template for one report
#[derive(Debug, Clone, Copy)]
pub struct ReportSpec {
    pub title: &'static str,
    pub sql: &'static str,
    pub headers: &'static [&'static str],
}

/// The closed set of reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    InventorySummary,
    LowStockAlert,
    SalesReport,
    CategoryAnalysis,
    ProfitMarginAnalysis,
    SupplierPerformance,
    DeviceSales,
    AccountBalances,
    PayrollSummary,
}

impl ReportKind {
    pub const ALL: [ReportKind; 9] = [
        ReportKind::InventorySummary,
        ReportKind::LowStockAlert,
        ReportKind::SalesReport,
        ReportKind::CategoryAnalysis,
        ReportKind::ProfitMarginAnalysis,
        ReportKind::SupplierPerformance,
        ReportKind::DeviceSales,
        ReportKind::AccountBalances,
        ReportKind::PayrollSummary,
    ];

    /// Display name, e.g. "Low Stock Alert"
    pub fn name(&self) -> &'static str {
        self.spec().title
    }

    /// Command-line name, e.g. "low-stock-alert"
    pub fn slug(&self) -> String {
        self.name().to_ascii_lowercase().replace(' ', "-")
    }

    /// Database the report reads from
    pub fn domain(&self) -> Domain {
        match self {
            ReportKind::DeviceSales
            | ReportKind::InventorySummary
            | ReportKind::LowStockAlert
            | ReportKind::SalesReport
            | ReportKind::CategoryAnalysis
            | ReportKind::ProfitMarginAnalysis
            | ReportKind::SupplierPerformance => Domain::Inventory,
            ReportKind::AccountBalances => Domain::Bank,
            ReportKind::PayrollSummary => Domain::Company,
        }
    }

    pub fn spec(&self) -> ReportSpec {
        match self {
            ReportKind::InventorySummary => ReportSpec {
                title: "Inventory Summary",
                sql: r#"
                    SELECT p.sku, p.name, c.name, s.name, p.quantity, p.reorder_point,
                           p.unit_cost, p.unit_price,
                           COALESCE(p.quantity, 0) * COALESCE(p.unit_cost, 0.0)
                    FROM products p
                    LEFT JOIN categories c ON c.id = p.category_id
                    LEFT JOIN suppliers s ON s.id = p.supplier_id
                    ORDER BY p.name, p.id"#,
                headers: &[
                    "SKU",
                    "Product",
                    "Category",
                    "Supplier",
                    "Quantity",
                    "Reorder Point",
                    "Unit Cost",
                    "Unit Price",
                    "Stock Value",
                ],
            },
            ReportKind::LowStockAlert => ReportSpec {
                title: "Low Stock Alert",
                sql: r#"
                    SELECT p.sku, p.name, s.name, COALESCE(p.quantity, 0),
                           COALESCE(p.reorder_point, 0),
                           COALESCE(p.reorder_point, 0) - COALESCE(p.quantity, 0)
                    FROM products p
                    LEFT JOIN suppliers s ON s.id = p.supplier_id
                    WHERE COALESCE(p.quantity, 0) <= COALESCE(p.reorder_point, 0)
                    ORDER BY 6 DESC, p.name"#,
                headers: &[
                    "SKU",
                    "Product",
                    "Supplier",
                    "Quantity",
                    "Reorder Point",
                    "Shortfall",
                ],
            },
            ReportKind::SalesReport => ReportSpec {
                title: "Sales Report",
                sql: r#"
                    SELECT date(ps.sold_at), p.sku, p.name, ps.quantity, ps.unit_price, ps.total
                    FROM product_sales ps
                    JOIN products p ON p.id = ps.product_id
                    ORDER BY ps.sold_at DESC, ps.id DESC"#,
                headers: &["Date", "SKU", "Product", "Quantity", "Unit Price", "Total"],
            },
            ReportKind::CategoryAnalysis => ReportSpec {
                title: "Category Analysis",
                sql: r#"
                    SELECT c.name,
                           (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id),
                           (SELECT COALESCE(SUM(p.quantity), 0) FROM products p
                             WHERE p.category_id = c.id),
                           (SELECT COALESCE(SUM(p.quantity * COALESCE(p.unit_cost, 0.0)), 0.0)
                              FROM products p WHERE p.category_id = c.id),
                           (SELECT COALESCE(SUM(ps.quantity), 0) FROM product_sales ps
                              JOIN products p ON p.id = ps.product_id
                             WHERE p.category_id = c.id),
                           (SELECT COALESCE(SUM(ps.total), 0.0) FROM product_sales ps
                              JOIN products p ON p.id = ps.product_id
                             WHERE p.category_id = c.id)
                    FROM categories c
                    ORDER BY c.name"#,
                headers: &[
                    "Category",
                    "Products",
                    "Units in Stock",
                    "Stock Value",
                    "Units Sold",
                    "Revenue",
                ],
            },
            ReportKind::ProfitMarginAnalysis => ReportSpec {
                title: "Profit Margin Analysis",
                sql: r#"
                    SELECT sku, name, unit_cost, unit_price,
                           unit_price - COALESCE(unit_cost, 0.0),
                           CASE WHEN unit_price > 0
                                THEN (unit_price - COALESCE(unit_cost, 0.0)) * 100.0 / unit_price
                           END
                    FROM products
                    WHERE unit_price IS NOT NULL
                    ORDER BY 6 DESC, name"#,
                headers: &["SKU", "Product", "Unit Cost", "Unit Price", "Profit", "Margin %"],
            },
            ReportKind::SupplierPerformance => ReportSpec {
                title: "Supplier Performance",
                sql: r#"
                    SELECT s.name, s.contact_person,
                           (SELECT COUNT(*) FROM products p WHERE p.supplier_id = s.id),
                           (SELECT COALESCE(SUM(ps.quantity), 0) FROM product_sales ps
                              JOIN products p ON p.id = ps.product_id
                             WHERE p.supplier_id = s.id),
                           (SELECT COALESCE(SUM(ps.total), 0.0) FROM product_sales ps
                              JOIN products p ON p.id = ps.product_id
                             WHERE p.supplier_id = s.id),
                           (SELECT COUNT(*) FROM products p WHERE p.supplier_id = s.id
                               AND COALESCE(p.quantity, 0) <= COALESCE(p.reorder_point, 0))
                    FROM suppliers s
                    ORDER BY 5 DESC, s.name"#,
                headers: &[
                    "Supplier",
                    "Contact",
                    "Products",
                    "Units Sold",
                    "Revenue",
                    "Low Stock Items",
                ],
            },
            ReportKind::DeviceSales => ReportSpec {
                title: "Device Sales",
                sql: r#"
                    SELECT COALESCE(sa.sale_date, date(sa.created_at)), d.serial_number, d.name,
                           sa.customer_name, d.purchase_cost, sa.sale_price,
                           sa.sale_price - COALESCE(d.purchase_cost, 0.0)
                    FROM sales sa
                    JOIN devices d ON d.id = sa.device_id
                    ORDER BY 1 DESC, sa.id DESC"#,
                headers: &[
                    "Sale Date",
                    "Serial Number",
                    "Device",
                    "Customer",
                    "Purchase Cost",
                    "Sale Price",
                    "Profit",
                ],
            },
            ReportKind::AccountBalances => ReportSpec {
                title: "Account Balances",
                sql: r#"
                    SELECT a.account_number, a.holder_name, a.balance,
                           (SELECT COUNT(*) FROM bank_transactions t WHERE t.account_id = a.id),
                           (SELECT MAX(t.created_at) FROM bank_transactions t
                             WHERE t.account_id = a.id)
                    FROM accounts a
                    ORDER BY a.holder_name, a.id"#,
                headers: &[
                    "Account Number",
                    "Holder",
                    "Balance",
                    "Transactions",
                    "Last Activity",
                ],
            },
            ReportKind::PayrollSummary => ReportSpec {
                title: "Payroll Summary",
                sql: r#"
                    SELECT pr.period, e.employee_code, e.full_name, e.department,
                           pr.base_salary, pr.adjustments_total, pr.net_pay
                    FROM payroll pr
                    JOIN employees e ON e.id = pr.employee_id
                    ORDER BY pr.period DESC, e.full_name"#,
                headers: &[
                    "Period",
                    "Employee Code",
                    "Employee",
                    "Department",
                    "Base Salary",
                    "Adjustments",
                    "Net Pay",
                ],
            },
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = StoreError;

    /// Accepts the display name or the slug, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        ReportKind::ALL
            .into_iter()
            .find(|k| k.slug() == wanted)
            .ok_or_else(|| StoreError::UnsupportedReportType(s.to_string()))
    }
}

/// Result of running a report
#[derive(Debug, Clone)]
pub struct ReportTable {
    pub kind: ReportKind,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ReportTable {
    pub fn title(&self) -> &'static str {
        self.kind.name()
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Rows rendered through the cell formatting policy
    pub fn formatted_rows(&self, currency: &str) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.headers)
                    .map(|(value, header)| format_cell(header, value, currency))
                    .collect()
            })
            .collect()
    }
}

/// Run a report against its domain database
pub fn generate(db: &Database, kind: ReportKind) -> StoreResult<ReportTable> {
    if db.domain() != kind.domain() {
        return Err(StoreError::Integrity(format!(
            "{} reads the {} database, not {}",
            kind,
            kind.domain(),
            db.domain()
        )));
    }

    let spec = kind.spec();
    let mut stmt = db.conn().prepare(spec.sql)?;
    let width = stmt.column_count();
    if width != spec.headers.len() {
        return Err(StoreError::Integrity(format!(
            "{} has {} headers but its query returns {} columns",
            kind,
            spec.headers.len(),
            width
        )));
    }

    let rows = stmt.query_map([], |row| {
        (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()
    })?;
    let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    tracing::debug!(report = %kind, rows = rows.len(), "report generated");
    Ok(ReportTable {
        kind,
        headers: spec.headers.iter().map(|h| h.to_string()).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::Fields;
    use crate::entities::{bank, company, inventory};

    fn stocked() -> Database {
        let mut db = Database::open_in_memory(Domain::Inventory).unwrap();
        let supplier = db
            .store(&inventory::SUPPLIERS)
            .create(&Fields::new().with("name", "Acme").with("contact_person", "Rana"))
            .unwrap();
        let category = db
            .store(&inventory::CATEGORIES)
            .create(&Fields::new().with("name", "Cables"))
            .unwrap();
        let mut ids = Vec::new();
        for (sku, qty, reorder, cost, price) in [
            ("A-1", 2, 5, "1.5", "4"),
            ("A-2", 5, 5, "10", "12.5"),
            ("A-3", 50, 5, "3", "9"),
        ] {
            let id = db
                .store(&inventory::PRODUCTS)
                .create(
                    &Fields::new()
                        .with("sku", sku)
                        .with("name", format!("Cable {}", sku))
                        .with("category_id", category.to_string())
                        .with("supplier_id", supplier.to_string())
                        .with("quantity", qty.to_string())
                        .with("reorder_point", reorder.to_string())
                        .with("unit_cost", cost)
                        .with("unit_price", price),
                )
                .unwrap();
            ids.push(id);
        }
        inventory::sell_product(&mut db, ids[2], 4, None).unwrap();
        db
    }

    #[test]
    fn test_parse_names_and_slugs() {
        assert_eq!("Low Stock Alert".parse::<ReportKind>().unwrap(), ReportKind::LowStockAlert);
        assert_eq!("low-stock-alert".parse::<ReportKind>().unwrap(), ReportKind::LowStockAlert);
        assert_eq!("PROFIT_MARGIN_ANALYSIS".parse::<ReportKind>().unwrap(), ReportKind::ProfitMarginAnalysis);
        for kind in ReportKind::ALL {
            assert_eq!(kind.slug().parse::<ReportKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_report_type_is_explicit() {
        let err = "Quarterly Forecast".parse::<ReportKind>().unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedReportType(ref name) if name == "Quarterly Forecast"));
    }

    #[test]
    fn test_every_report_matches_its_headers() {
        for kind in ReportKind::ALL {
            let db = Database::open_in_memory(kind.domain()).unwrap();
            let table = generate(&db, kind).unwrap();
            assert_eq!(table.headers.len(), kind.spec().headers.len(), "{}", kind);
            assert!(table.rows.is_empty());
        }
    }

    #[test]
    fn test_low_stock_rows_are_at_or_below_reorder_point() {
        let db = stocked();
        let table = generate(&db, ReportKind::LowStockAlert).unwrap();
        let qty = table.column("Quantity").unwrap();
        let reorder = table.column("Reorder Point").unwrap();

        let skus: Vec<_> = table
            .rows
            .iter()
            .map(|r| crate::core::value::display_value(&r[0]))
            .collect();
        assert_eq!(skus, vec!["A-1", "A-2"]);
        for row in &table.rows {
            match (&row[qty], &row[reorder]) {
                (Value::Integer(q), Value::Integer(r)) => assert!(q <= r),
                other => panic!("unexpected cells {:?}", other),
            }
        }
    }

    #[test]
    fn test_sales_and_category_analysis() {
        let db = stocked();
        let sales = generate(&db, ReportKind::SalesReport).unwrap();
        assert_eq!(sales.rows.len(), 1);
        assert_eq!(sales.formatted_rows("$")[0][5], "$36.00");

        let categories = generate(&db, ReportKind::CategoryAnalysis).unwrap();
        let row = &categories.formatted_rows("$")[0];
        assert_eq!(row[0], "Cables");
        assert_eq!(row[1], "3");
        assert_eq!(row[2], "53");
        assert_eq!(row[4], "4");
        assert_eq!(row[5], "$36.00");
    }

    #[test]
    fn test_profit_margin_formatting() {
        let db = stocked();
        let table = generate(&db, ReportKind::ProfitMarginAnalysis).unwrap();
        let rows = table.formatted_rows("€");
        // A-3: (9 - 3) / 9 = 66.67%
        assert_eq!(rows[0][0], "A-3");
        assert_eq!(rows[0][4], "€6.00");
        assert_eq!(rows[0][5], "66.67%");
    }

    #[test]
    fn test_report_against_wrong_database() {
        let db = Database::open_in_memory(Domain::Bank).unwrap();
        assert!(matches!(
            generate(&db, ReportKind::SalesReport).unwrap_err(),
            StoreError::Integrity(_)
        ));
    }

    #[test]
    fn test_account_and_payroll_reports() {
        let mut bank_db = Database::open_in_memory(Domain::Bank).unwrap();
        let id = bank::create_account(&mut bank_db, "Jane Doe", "ACC-001", "", 100.0).unwrap();
        bank::deposit(&mut bank_db, id, 50.0).unwrap();
        let balances = generate(&bank_db, ReportKind::AccountBalances).unwrap();
        let row = &balances.formatted_rows("$")[0];
        assert_eq!(row[2], "$150.00");
        assert_eq!(row[3], "2");

        let mut company_db = Database::open_in_memory(Domain::Company).unwrap();
        let employee = company_db
            .store(&company::EMPLOYEES)
            .create(
                &Fields::new()
                    .with("employee_code", "E-1")
                    .with("full_name", "Nadia")
                    .with("salary", "2500"),
            )
            .unwrap();
        company::run_payroll(&mut company_db, employee, "2024-07").unwrap();
        let payroll = generate(&company_db, ReportKind::PayrollSummary).unwrap();
        let row = &payroll.formatted_rows("$")[0];
        assert_eq!(row[0], "2024-07");
        assert_eq!(row[3], "");
        assert_eq!(row[6], "$2500.00");
    }
}
