//! Dynamic field assembler
//!
//! Turns a map of candidate form values into an ordered, parameterized column
//! list for one table. Only columns declared writable in the table metadata
//! can reach the generated SQL; everything else is dropped before any string
//! is built. Validation happens here, so a rejected input never issues a write.

use chrono::NaiveDate;
use rusqlite::types::Value;

use super::error::{StoreError, StoreResult};
use super::schema::{ColumnDef, ColumnKind, TableSchema};
use super::value::Fields;

/// Whether the statement creates a row or patches an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every required column must be present and non-blank
    Insert,
    /// Partial: only supplied columns are written
    Update,
}

/// Output of the assembler
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub columns: Vec<&'static str>,
    pub params: Vec<Value>,
    /// `?1, ?2, ...` matching `columns`
    pub placeholders: String,
    /// Input keys that are not writable columns of the table
    pub dropped: Vec<String>,
}

impl Assembled {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| &self.params[i])
    }

    /// `INSERT INTO table (a, b) VALUES (?1, ?2)`
    pub fn insert_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            self.columns.join(", "),
            self.placeholders
        )
    }

    /// `UPDATE table SET a = ?1, b = ?2 WHERE id = ?3`
    ///
    /// The primary key binds to the parameter after the assembled values.
    pub fn update_sql(&self, table: &str) -> String {
        let sets = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets,
            self.columns.len() + 1
        )
    }
}

/// Validate `fields` against `schema` and build the column/parameter lists
pub fn assemble(schema: &TableSchema, fields: &Fields, mode: WriteMode) -> StoreResult<Assembled> {
    let dropped: Vec<String> = fields
        .keys()
        .filter(|k| schema.column(k).map_or(true, |c| !c.writable()))
        .map(String::from)
        .collect();

    for key in &dropped {
        tracing::warn!(table = schema.name, field = %key, "dropping field that is not a writable column");
    }

    let mut columns = Vec::new();
    let mut params = Vec::new();

    for column in schema.writable_columns() {
        let raw = fields.get(column.name);
        let blank = raw.map_or(true, |v| v.trim().is_empty());

        if column.required && blank {
            match mode {
                WriteMode::Insert => {
                    return Err(StoreError::validation(column.name, "required field is missing"));
                }
                WriteMode::Update if raw.is_some() => {
                    return Err(StoreError::validation(column.name, "required field cannot be blank"));
                }
                WriteMode::Update => continue,
            }
        }

        let Some(raw) = raw else {
            continue;
        };

        let value = if blank {
            Value::Null
        } else {
            coerce(column, raw)?
        };
        columns.push(column.name);
        params.push(value);
    }

    if mode == WriteMode::Update && columns.is_empty() {
        return Err(StoreError::validation(
            "*",
            format!("no writable {} fields supplied", schema.entity),
        ));
    }

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Assembled {
        columns,
        params,
        placeholders,
        dropped,
    })
}

/// Parse one non-blank raw value according to its column definition
pub fn coerce(column: &ColumnDef, raw: &str) -> StoreResult<Value> {
    let raw = raw.trim();
    let value = match column.kind {
        ColumnKind::Text => Value::Text(raw.to_string()),
        ColumnKind::Integer => {
            let n: i64 = raw
                .parse()
                .map_err(|_| StoreError::validation(column.name, format!("'{}' is not a whole number", raw)))?;
            check_bounds(column, n as f64)?;
            Value::Integer(n)
        }
        ColumnKind::Real => {
            let n: f64 = raw
                .parse()
                .map_err(|_| StoreError::validation(column.name, format!("'{}' is not a number", raw)))?;
            if !n.is_finite() {
                return Err(StoreError::validation(column.name, "number must be finite"));
            }
            check_bounds(column, n)?;
            Value::Real(n)
        }
        ColumnKind::Date => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                StoreError::validation(column.name, format!("'{}' is not a date (YYYY-MM-DD)", raw))
            })?;
            Value::Text(date.format("%Y-%m-%d").to_string())
        }
        ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" | "x" => Value::Integer(1),
            "0" | "false" | "no" | "n" | "off" => Value::Integer(0),
            _ => {
                return Err(StoreError::validation(
                    column.name,
                    format!("'{}' is not a yes/no value", raw),
                ))
            }
        },
        ColumnKind::Choice(options) => {
            let lowered = raw.to_ascii_lowercase().replace([' ', '-'], "_");
            match options.iter().find(|o| **o == lowered) {
                Some(option) => Value::Text(option.to_string()),
                None => {
                    return Err(StoreError::validation(
                        column.name,
                        format!("'{}' is not {}", raw, column.kind.label()),
                    ))
                }
            }
        }
    };
    Ok(value)
}

fn check_bounds(column: &ColumnDef, n: f64) -> StoreResult<()> {
    if let Some(min) = column.min {
        if n < min {
            let message = if min == 0.0 {
                "must not be negative".to_string()
            } else {
                format!("must be at least {}", min)
            };
            return Err(StoreError::validation(column.name, message));
        }
    }
    if let Some(max) = column.max {
        if n > max {
            return Err(StoreError::validation(column.name, format!("must be at most {}", max)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Order, WritePolicy};

    static PRODUCTS: TableSchema = TableSchema {
        name: "products",
        entity: "product",
        columns: &[
            ColumnDef::text("sku").required().unique(),
            ColumnDef::text("name").required(),
            ColumnDef::integer("quantity").non_negative(),
            ColumnDef::real("unit_price").non_negative(),
            ColumnDef::date("received"),
            ColumnDef::boolean("active"),
            ColumnDef::choice("grade", &["a", "b", "c_minus"]),
            ColumnDef::integer("rating").range(1.0, 5.0),
            ColumnDef::real("total").managed(),
            ColumnDef::created_at(),
        ],
        order: Order::by("name"),
        dependents: &[],
        policy: WritePolicy::Open,
        check: None,
    };

    fn base() -> Fields {
        Fields::new().with("sku", "SKU-1").with("name", "Widget")
    }

    #[test]
    fn test_insert_orders_columns_by_schema() {
        let fields = base().with("unit_price", "2.50").with("quantity", "3");
        let assembled = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap();

        assert_eq!(assembled.columns, vec!["sku", "name", "quantity", "unit_price"]);
        assert_eq!(assembled.params.len(), assembled.columns.len());
        assert_eq!(assembled.placeholders, "?1, ?2, ?3, ?4");
        assert_eq!(assembled.params[2], Value::Integer(3));
        assert_eq!(assembled.params[3], Value::Real(2.5));
        assert_eq!(
            assembled.insert_sql("products"),
            "INSERT INTO products (sku, name, quantity, unit_price) VALUES (?1, ?2, ?3, ?4)"
        );
    }

    #[test]
    fn test_unknown_and_managed_keys_never_reach_sql() {
        let fields = base()
            .with("name; DROP TABLE products", "x")
            .with("total", "99")
            .with("id", "5")
            .with("created_at", "2020-01-01");
        let assembled = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap();

        for key in ["name; DROP TABLE products", "total", "id", "created_at"] {
            assert!(!assembled.columns.contains(&key), "{key} leaked into columns");
            assert!(assembled.dropped.iter().any(|d| d == key));
        }
        assert!(!assembled.insert_sql("products").contains("DROP"));
    }

    #[test]
    fn test_required_missing_or_blank_on_insert() {
        let fields = Fields::new().with("sku", "SKU-1");
        let err = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "name"));

        let fields = base().with("name", "   ");
        let err = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_optional_blank_becomes_null() {
        let fields = base().with("unit_price", "").with("received", " ");
        let assembled = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap();
        assert_eq!(assembled.value("unit_price"), Some(&Value::Null));
        assert_eq!(assembled.value("received"), Some(&Value::Null));
    }

    #[test]
    fn test_numeric_parse_failures_name_the_field() {
        let err = assemble(&PRODUCTS, &base().with("quantity", "three"), WriteMode::Insert)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "quantity"));

        let err = assemble(&PRODUCTS, &base().with("unit_price", "-1"), WriteMode::Insert)
            .unwrap_err();
        assert!(err.to_string().contains("must not be negative"));

        let err = assemble(&PRODUCTS, &base().with("unit_price", "NaN"), WriteMode::Insert)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "unit_price"));

        let err = assemble(&PRODUCTS, &base().with("rating", "6"), WriteMode::Insert).unwrap_err();
        assert!(err.to_string().contains("at most 5"));
    }

    #[test]
    fn test_date_boolean_and_choice_coercion() {
        let fields = base()
            .with("received", "2024-02-29")
            .with("active", "Yes")
            .with("grade", "C-Minus");
        let assembled = assemble(&PRODUCTS, &fields, WriteMode::Insert).unwrap();
        assert_eq!(assembled.value("received"), Some(&Value::Text("2024-02-29".into())));
        assert_eq!(assembled.value("active"), Some(&Value::Integer(1)));
        assert_eq!(assembled.value("grade"), Some(&Value::Text("c_minus".into())));

        assert!(assemble(&PRODUCTS, &base().with("received", "2023-02-29"), WriteMode::Insert).is_err());
        assert!(assemble(&PRODUCTS, &base().with("active", "maybe"), WriteMode::Insert).is_err());
        assert!(assemble(&PRODUCTS, &base().with("grade", "d"), WriteMode::Insert).is_err());
    }

    #[test]
    fn test_update_is_partial() {
        let fields = Fields::new().with("quantity", "10");
        let assembled = assemble(&PRODUCTS, &fields, WriteMode::Update).unwrap();
        assert_eq!(assembled.columns, vec!["quantity"]);
        assert_eq!(
            assembled.update_sql("products"),
            "UPDATE products SET quantity = ?1 WHERE id = ?2"
        );
    }

    #[test]
    fn test_update_rejects_blank_required_and_empty_patch() {
        let err = assemble(&PRODUCTS, &Fields::new().with("name", ""), WriteMode::Update)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "name"));

        let err = assemble(&PRODUCTS, &Fields::new().with("bogus", "1"), WriteMode::Update)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "*"));
    }
}
