//! Record store: CRUD over one table, driven by its metadata

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::assembler::{assemble, Assembled, WriteMode};
use super::error::{StoreError, StoreResult};
use super::schema::{OnDelete, TableSchema, WritePolicy};
use super::value::{Fields, Record};

/// Listing options for [`RecordStore::search`]
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Case-insensitive substring over the searchable columns
    pub term: Option<String>,
    /// Column to sort by (defaults to the table's natural order)
    pub sort: Option<String>,
    /// Reverse the sort direction
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn term(term: impl Into<String>) -> Self {
        Self {
            term: Some(term.into()),
            ..Self::default()
        }
    }
}

/// CRUD wrapper binding a connection to one table's metadata
pub struct RecordStore<'c> {
    conn: &'c Connection,
    schema: &'static TableSchema,
}

impl<'c> RecordStore<'c> {
    pub fn new(conn: &'c Connection, schema: &'static TableSchema) -> Self {
        Self { conn, schema }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    /// Validate and insert a new row, returning its id
    pub fn create(&self, fields: &Fields) -> StoreResult<i64> {
        if self.schema.policy != WritePolicy::Open {
            return Err(self.read_only("create"));
        }
        self.insert(fields)
    }

    /// Insert bypassing the write policy (compound operations only)
    pub(crate) fn insert(&self, fields: &Fields) -> StoreResult<i64> {
        let assembled = assemble(self.schema, fields, WriteMode::Insert)?;
        self.check_parents(&assembled)?;
        if let Some(check) = self.schema.check {
            check(&prospective_row(0, &assembled))?;
        }

        let sql = assembled.insert_sql(self.schema.name);
        tracing::debug!(table = self.schema.name, %sql, "insert");
        self.conn
            .execute(&sql, params_from_iter(assembled.params.iter()))
            .map_err(|e| StoreError::from_write(self.schema.name, e))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Validate and apply a partial update by primary key
    pub fn update(&self, id: i64, fields: &Fields) -> StoreResult<()> {
        if self.schema.policy == WritePolicy::AppendOnly {
            return Err(self.read_only("update"));
        }
        self.patch(id, fields)
    }

    pub(crate) fn patch(&self, id: i64, fields: &Fields) -> StoreResult<()> {
        let assembled = assemble(self.schema, fields, WriteMode::Update)?;
        self.check_parents(&assembled)?;
        if let Some(check) = self.schema.check {
            let mut row = self.get(id)?;
            for (column, value) in assembled.columns.iter().zip(&assembled.params) {
                row.set(column, value.clone());
            }
            check(&row)?;
        }

        let sql = assembled.update_sql(self.schema.name);
        tracing::debug!(table = self.schema.name, id, %sql, "update");
        let mut values = assembled.params;
        values.push(Value::Integer(id));
        let affected = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| StoreError::from_write(self.schema.name, e))?;

        match affected {
            0 => Err(StoreError::not_found(self.schema.entity, id)),
            1 => Ok(()),
            n => Err(StoreError::Integrity(format!(
                "update of {} {} touched {} rows",
                self.schema.entity, id, n
            ))),
        }
    }

    /// Fetch one row by id
    pub fn get(&self, id: i64) -> StoreResult<Record> {
        self.find(id)?
            .ok_or_else(|| StoreError::not_found(self.schema.entity, id))
    }

    pub fn find(&self, id: i64) -> StoreResult<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            self.schema.select_list(),
            self.schema.name
        );
        let record = self
            .conn
            .query_row(&sql, params![id], |row| self.read_row(row))
            .optional()?;
        Ok(record)
    }

    pub fn exists(&self, id: i64) -> StoreResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", self.schema.name);
        let found: Option<i64> = self.conn.query_row(&sql, params![id], |r| r.get(0)).optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.schema.name);
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }

    /// Case-insensitive substring search with caller-controlled ordering
    pub fn search(&self, options: &SearchOptions) -> StoreResult<Vec<Record>> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.schema.select_list(),
            self.schema.name
        );
        let mut bind: Vec<Value> = Vec::new();

        if let Some(term) = options.term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            let clauses: Vec<String> = self
                .schema
                .searchable_columns()
                .map(|c| {
                    bind.push(Value::Text(pattern.clone()));
                    format!("{} LIKE ?{} ESCAPE '\\'", c.name, bind.len())
                })
                .collect();
            if clauses.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" WHERE ({})", clauses.join(" OR ")));
        }

        let (column, descending) = match options.sort.as_deref() {
            Some(sort) => {
                if !self.schema.has_column(sort) {
                    return Err(StoreError::validation(
                        "sort",
                        format!("{} has no column '{}'", self.schema.name, sort),
                    ));
                }
                (sort, false)
            }
            None => (self.schema.order.column, self.schema.order.descending),
        };
        let descending = descending != options.reverse;
        let direction = if descending { "DESC" } else { "ASC" };
        if column == "id" {
            sql.push_str(&format!(" ORDER BY id {}", direction));
        } else {
            sql.push_str(&format!(
                " ORDER BY {col} {dir}, id {dir}",
                col = column,
                dir = direction
            ));
        }

        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        tracing::debug!(table = self.schema.name, %sql, "search");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| self.read_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rows whose `column` equals `value`, in the table's natural order
    pub fn filter_by(&self, column: &str, value: &Value) -> StoreResult<Vec<Record>> {
        if !self.schema.has_column(column) {
            return Err(StoreError::validation(
                column,
                format!("{} has no such column", self.schema.name),
            ));
        }
        let direction = if self.schema.order.descending { "DESC" } else { "ASC" };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {} {dir}, id {dir}",
            self.schema.select_list(),
            self.schema.name,
            column,
            self.schema.order.column,
            dir = direction
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], |row| self.read_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Hard delete, honouring the table's dependents
    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if self.schema.policy == WritePolicy::AppendOnly {
            return Err(self.read_only("delete"));
        }
        if !self.exists(id)? {
            return Err(StoreError::not_found(self.schema.entity, id));
        }

        for dep in self.schema.dependents.iter().filter(|d| d.on_delete == OnDelete::Restrict) {
            let count = self.count_children(dep.table, dep.column, id)?;
            if count > 0 {
                return Err(StoreError::HasDependents {
                    table: self.schema.entity.to_string(),
                    id,
                    child: dep.table.to_string(),
                    count,
                });
            }
        }

        // Join the caller's transaction when one is already open
        let tx = if self.conn.is_autocommit() {
            Some(self.conn.unchecked_transaction()?)
        } else {
            None
        };
        for dep in self.schema.dependents.iter().filter(|d| d.on_delete == OnDelete::Cascade) {
            let removed = self.conn.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", dep.table, dep.column),
                params![id],
            )?;
            tracing::debug!(parent = self.schema.name, child = dep.table, removed, "cascade delete");
        }
        let affected = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE id = ?1", self.schema.name),
                params![id],
            )
            .map_err(|e| StoreError::from_write(self.schema.name, e))?;
        if affected != 1 {
            return Err(StoreError::Integrity(format!(
                "delete of {} {} touched {} rows",
                self.schema.entity, id, affected
            )));
        }
        if let Some(tx) = tx {
            tx.commit()?;
        }
        Ok(())
    }

    fn count_children(&self, table: &str, column: &str, id: i64) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column);
        Ok(self.conn.query_row(&sql, params![id], |r| r.get(0))?)
    }

    /// Every non-null reference must point at an existing parent row
    fn check_parents(&self, assembled: &Assembled) -> StoreResult<()> {
        for (name, value) in assembled.columns.iter().zip(&assembled.params) {
            let Some(parent) = self.schema.column(name).and_then(|c| c.references) else {
                continue;
            };
            let Value::Integer(parent_id) = value else {
                continue;
            };
            let sql = format!("SELECT 1 FROM {} WHERE id = ?1", parent);
            let found: Option<i64> = self
                .conn
                .query_row(&sql, params![parent_id], |r| r.get(0))
                .optional()?;
            if found.is_none() {
                return Err(StoreError::MissingParent {
                    field: name.to_string(),
                    table: parent.to_string(),
                    id: *parent_id,
                });
            }
        }
        Ok(())
    }

    fn read_row(&self, row: &Row<'_>) -> rusqlite::Result<Record> {
        let id: i64 = row.get(0)?;
        let mut values = Vec::with_capacity(self.schema.columns.len());
        for (i, column) in self.schema.columns.iter().enumerate() {
            values.push((column.name.to_string(), row.get::<_, Value>(i + 1)?));
        }
        Ok(Record { id, values })
    }

    fn read_only(&self, operation: &str) -> StoreError {
        StoreError::ReadOnly {
            table: self.schema.name.to_string(),
            operation: operation.to_string(),
        }
    }
}

fn prospective_row(id: i64, assembled: &Assembled) -> Record {
    Record {
        id,
        values: assembled
            .columns
            .iter()
            .zip(&assembled.params)
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect(),
    }
}

/// Escape LIKE wildcards so the term matches literally
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
