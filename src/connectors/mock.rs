//! In-memory fake [`Connection`], used throughout the core's own test
//! suite (§6). It understands only the handful of SQL shapes the core
//! itself generates (see `reader.rs`, `sink.rs`, `repair.rs`) — this is a
//! test double, not a SQL engine.

use crate::connection::{Connection, Cursor, Dialect, Param, VecCursor};
use crate::error::{Result, SyncError};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

type Table = Vec<BTreeMap<String, Value>>;

fn param_to_value(p: &Param) -> Value {
    match p {
        Param::Null => Value::Null,
        Param::Int(i) => Value::Int(*i),
        Param::Float(f) => Value::Float(*f),
        Param::Text(s) => Value::String(s.clone()),
    }
}

/// A single in-memory table store, addressable by `schema.table`.
pub struct MockConnection {
    tables: Mutex<BTreeMap<String, Table>>,
    dialect: Dialect,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        MockConnection {
            tables: Mutex::new(BTreeMap::new()),
            dialect,
        }
    }

    /// Seed a table directly, bypassing SQL, for test setup.
    pub fn seed_table(&self, name: &str, rows: Vec<BTreeMap<String, Value>>) {
        self.tables.lock().unwrap().insert(name.to_lowercase(), rows);
    }

    /// Read a table's current contents, for test assertions.
    pub fn table_rows(&self, name: &str) -> Table {
        self.tables
            .lock()
            .unwrap()
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn ident_after<'a>(tokens: &[&'a str], keyword: &str) -> Option<&'a str> {
        tokens
            .iter()
            .position(|t| t.eq_ignore_ascii_case(keyword))
            .and_then(|i| tokens.get(i + 1))
            .copied()
    }

    /// Column names appearing as `col = ?` or `col = :N` in the WHERE
    /// clause, in textual order.
    fn where_columns(sql: &str) -> Vec<String> {
        let Some(where_idx) = sql.to_uppercase().find("WHERE") else {
            return Vec::new();
        };
        let clause = &sql[where_idx + 5..];
        let mut cols = Vec::new();
        for part in clause.split(|c| c == '?' || c == ':').take_while(|_| true) {
            let trimmed = part.trim();
            if let Some(eq) = trimmed.rfind('=') {
                let before = trimmed[..eq].trim();
                let col = before.rsplit(|c: char| c.is_whitespace() || c == '.').next();
                if let Some(c) = col {
                    if !c.is_empty() && c != "AND" {
                        cols.push(c.trim_matches(|c: char| !c.is_alphanumeric() && c != '_').to_lowercase());
                    }
                }
            }
        }
        cols
    }

    fn filter_by_equality(rows: &Table, cols: &[String], params: &[Param]) -> Table {
        rows.iter()
            .filter(|row| {
                cols.iter().zip(params.iter()).all(|(col, p)| {
                    match row.get(col) {
                        Some(v) => *v == param_to_value(p),
                        None => false,
                    }
                })
            })
            .cloned()
            .collect()
    }

    fn order_by_column(sql: &str) -> Option<String> {
        let upper = sql.to_uppercase();
        let idx = upper.find("ORDER BY")?;
        let rest = &sql[idx + 8..];
        let first_token = rest.split_whitespace().next()?;
        Some(first_token.trim_end_matches(',').to_lowercase())
    }

    fn row_to_row(map: &BTreeMap<String, Value>) -> Row {
        Row::new(map.clone())
    }

    /// Dedicated handler for the one MERGE shape the Sink generates:
    /// `MERGE INTO t USING s ON t.a = s.a AND ... WHEN MATCHED THEN UPDATE
    /// SET t.x = s.x, ... WHEN NOT MATCHED THEN INSERT (f1, f2, ...)
    /// VALUES (s.f1, s.f2, ...)`.
    fn execute_merge(&self, sql: &str) -> Result<()> {
        let tokens: Vec<&str> = sql.split_whitespace().collect();
        let target = Self::ident_after(&tokens, "INTO")
            .ok_or_else(|| SyncError::Query("MERGE missing target".into()))?
            .to_lowercase();
        let staging = Self::ident_after(&tokens, "USING")
            .ok_or_else(|| SyncError::Query("MERGE missing staging source".into()))?
            .to_lowercase();

        let on_start = sql.find(" ON ").ok_or_else(|| SyncError::Query("MERGE missing ON clause".into()))?;
        let matched_idx = sql.find("WHEN MATCHED").unwrap_or(sql.len());
        let on_clause = &sql[on_start + 4..matched_idx];
        let key_columns: Vec<String> = on_clause
            .split("AND")
            .filter_map(|pred| {
                let rhs = pred.split('=').nth(1)?;
                rhs.trim().rsplit('.').next().map(|s| s.trim().to_lowercase())
            })
            .collect();

        let not_matched_idx = sql.find("WHEN NOT MATCHED").unwrap_or(sql.len());
        let insert_paren_start = sql[not_matched_idx..]
            .find('(')
            .map(|i| i + not_matched_idx)
            .ok_or_else(|| SyncError::Query("MERGE missing INSERT column list".into()))?;
        let insert_paren_end = sql[insert_paren_start..]
            .find(')')
            .map(|i| i + insert_paren_start)
            .ok_or_else(|| SyncError::Query("MERGE unterminated INSERT column list".into()))?;
        let insert_fields: Vec<String> = sql[insert_paren_start + 1..insert_paren_end]
            .split(',')
            .map(|c| c.trim().to_lowercase())
            .collect();

        let update_start = sql.find("UPDATE SET").map(|i| i + "UPDATE SET".len()).unwrap_or(not_matched_idx);
        let update_clause = &sql[update_start..not_matched_idx];
        let update_fields: Vec<String> = update_clause
            .split(',')
            .filter_map(|assign| {
                let lhs = assign.split('=').next()?;
                lhs.trim().rsplit('.').next().map(|s| s.trim().to_lowercase())
            })
            .collect();

        let mut tables = self.tables.lock().unwrap();
        let staging_rows = tables.get(&staging).cloned().unwrap_or_default();
        let target_rows = tables.entry(target).or_default();

        for staging_row in &staging_rows {
            let matched = target_rows.iter_mut().find(|row| {
                key_columns
                    .iter()
                    .all(|k| row.get(k) == staging_row.get(k))
            });
            match matched {
                Some(row) => {
                    for field in &update_fields {
                        if let Some(v) = staging_row.get(field) {
                            row.insert(field.clone(), v.clone());
                        }
                    }
                }
                None => {
                    let mut new_row = BTreeMap::new();
                    for field in &insert_fields {
                        new_row.insert(field.clone(), staging_row.get(field).cloned().unwrap_or(Value::Null));
                    }
                    target_rows.push(new_row);
                }
            }
        }
        Ok(())
    }

    /// Dedicated handler for the repair shape: `UPDATE t SET dest.a = out.b
    /// FROM t dest JOIN o out ON dest.x = out.y AND ... WHERE out.p = ?
    /// AND ...`.
    fn execute_update(&self, sql: &str, params: &[Param]) -> Result<()> {
        let tokens: Vec<&str> = sql.split_whitespace().collect();
        let dest_table = Self::ident_after(&tokens, "UPDATE")
            .ok_or_else(|| SyncError::Query("UPDATE missing target".into()))?
            .to_lowercase();
        let out_table = Self::ident_after(&tokens, "JOIN")
            .ok_or_else(|| SyncError::Query("UPDATE missing joined table".into()))?
            .to_lowercase();

        let set_start = sql.find("SET").map(|i| i + 3).unwrap_or(0);
        let from_idx = sql.find(" FROM ").unwrap_or(sql.len());
        let assignments: Vec<(String, String)> = sql[set_start..from_idx]
            .split(',')
            .filter_map(|assign| {
                let mut sides = assign.split('=');
                let lhs = sides.next()?.trim().rsplit('.').next()?.to_lowercase();
                let rhs = sides.next()?.trim().rsplit('.').next()?.to_lowercase();
                Some((lhs, rhs))
            })
            .collect();

        let on_idx = sql.find(" ON ").map(|i| i + 4).unwrap_or(sql.len());
        let where_idx = sql.to_uppercase().find("WHERE").unwrap_or(sql.len());
        let join_predicates: Vec<(String, String)> = sql[on_idx..where_idx]
            .split("AND")
            .filter_map(|pred| {
                let mut sides = pred.split('=');
                let dest_col = sides.next()?.trim().rsplit('.').next()?.to_lowercase();
                let out_col = sides.next()?.trim().rsplit('.').next()?.to_lowercase();
                Some((dest_col, out_col))
            })
            .collect();

        let where_clause = &sql[where_idx..];
        let skip_nulls = where_clause.to_uppercase().contains("IS NOT NULL");
        let where_cols: Vec<String> = Self::where_columns(where_clause);

        let tables = self.tables.lock().unwrap();
        let out_rows = tables.get(&out_table).cloned().unwrap_or_default();
        drop(tables);

        let mut candidates = Self::filter_by_equality(&out_rows, &where_cols, params);
        if skip_nulls {
            candidates.retain(|row| match row.get("source_value") {
                Some(Value::Null) | None => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                _ => true,
            });
        }

        let mut tables = self.tables.lock().unwrap();
        if let Some(dest_rows) = tables.get_mut(&dest_table) {
            for out_row in &candidates {
                for dest_row in dest_rows.iter_mut() {
                    let joined = join_predicates
                        .iter()
                        .all(|(dest_col, out_col)| dest_row.get(dest_col) == out_row.get(out_col));
                    if joined {
                        for (dest_col, out_col) in &assignments {
                            if let Some(v) = out_row.get(out_col) {
                                dest_row.insert(dest_col.clone(), v.clone());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>> {
        let trimmed = sql.trim();
        let upper = trimmed.to_uppercase();
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if upper.starts_with("SELECT") {
            let table_name = Self::ident_after(&tokens, "FROM")
                .ok_or_else(|| SyncError::Query("missing FROM clause".into()))?
                .to_lowercase();
            let tables = self.tables.lock().unwrap();
            let table = tables.get(&table_name).cloned().unwrap_or_default();
            drop(tables);

            let cols = Self::where_columns(trimmed);
            let mut filtered = if cols.is_empty() {
                table
            } else {
                Self::filter_by_equality(&table, &cols, params)
            };

            if let Some(order_col) = Self::order_by_column(trimmed) {
                filtered.sort_by(|a, b| {
                    let av = a.get(&order_col);
                    let bv = b.get(&order_col);
                    crate::value::compare_keys(
                        av.unwrap_or(&Value::Null),
                        bv.unwrap_or(&Value::Null),
                    )
                    .unwrap_or(std::cmp::Ordering::Equal)
                });
            }

            let rows: Vec<Row> = filtered.iter().map(Self::row_to_row).collect();
            return Ok(Box::new(VecCursor::new(rows)));
        }

        if upper.starts_with("CREATE TABLE") {
            let table_name = Self::ident_after(&tokens, "EXISTS")
                .or_else(|| Self::ident_after(&tokens, "TABLE"))
                .ok_or_else(|| SyncError::Query("missing table name".into()))?
                .trim_end_matches('(')
                .to_lowercase();
            self.tables.lock().unwrap().entry(table_name).or_default();
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        if upper.starts_with("ALTER TABLE") {
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        if upper.starts_with("INSERT INTO") {
            let table_name = Self::ident_after(&tokens, "INTO")
                .ok_or_else(|| SyncError::Query("missing table name".into()))?
                .to_lowercase();
            let cols_start = trimmed.find('(').ok_or_else(|| SyncError::Query("missing column list".into()))?;
            let cols_end = trimmed[cols_start..]
                .find(')')
                .map(|i| i + cols_start)
                .ok_or_else(|| SyncError::Query("unterminated column list".into()))?;
            let columns: Vec<String> = trimmed[cols_start + 1..cols_end]
                .split(',')
                .map(|c| c.trim().to_lowercase())
                .collect();
            let mut row = BTreeMap::new();
            for (col, p) in columns.iter().zip(params.iter()) {
                row.insert(col.clone(), param_to_value(p));
            }
            self.tables.lock().unwrap().entry(table_name).or_default().push(row);
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        if upper.starts_with("UPDATE") {
            self.execute_update(trimmed, params)?;
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        if upper.starts_with("DELETE FROM") {
            let table_name = Self::ident_after(&tokens, "FROM")
                .ok_or_else(|| SyncError::Query("missing table name".into()))?
                .to_lowercase();
            let cols = Self::where_columns(trimmed);
            let mut tables = self.tables.lock().unwrap();
            if let Some(table) = tables.get_mut(&table_name) {
                let to_delete = Self::filter_by_equality(table, &cols, params);
                table.retain(|row| !to_delete.contains(row));
            }
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        if upper.starts_with("MERGE INTO") {
            self.execute_merge(trimmed)?;
            return Ok(Box::new(VecCursor::new(vec![])));
        }

        Err(SyncError::Query(format!("mock connection cannot interpret: {trimmed}")))
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}
