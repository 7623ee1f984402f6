//! Thin Oracle adapter backed by the `oracle` crate. The crate's client is
//! synchronous, so every call is dispatched through `spawn_blocking` —
//! driver internals remain out of scope (§1).

use crate::connection::{Connection, Cursor, Dialect, Param, VecCursor};
use crate::error::{Result, SyncError};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub struct OracleConnection {
    conn: Arc<Mutex<oracle::Connection>>,
}

impl OracleConnection {
    pub fn connect(role: &'static str, connect_string: &str, user: &str, password: &str) -> Result<Self> {
        let conn = oracle::Connection::connect(user, password, connect_string).map_err(|e| SyncError::Connect {
            role,
            message: e.to_string(),
        })?;
        Ok(OracleConnection {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn to_oracle_value(p: &Param) -> Box<dyn oracle::sql_type::ToSql> {
    match p {
        Param::Null => Box::new(Option::<String>::None),
        Param::Int(v) => Box::new(*v),
        Param::Float(v) => Box::new(*v),
        Param::Text(v) => Box::new(v.clone()),
    }
}

#[async_trait]
impl Connection for OracleConnection {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let conn_handle = Arc::clone(&self.conn);
        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<Row>> {
            let conn = conn_handle.lock().unwrap();
            let bind_values: Vec<Box<dyn oracle::sql_type::ToSql>> = params.iter().map(to_oracle_value).collect();
            let bind_refs: Vec<&dyn oracle::sql_type::ToSql> = bind_values.iter().map(|b| b.as_ref()).collect();

            let result = conn
                .query(&sql, &bind_refs)
                .map_err(|e| SyncError::Query(e.to_string()))?;
            let column_names: Vec<String> = result
                .column_info()
                .iter()
                .map(|c| c.name().to_lowercase())
                .collect();

            let mut rows = Vec::new();
            for row_result in result {
                let row_result = row_result.map_err(|e| SyncError::Query(e.to_string()))?;
                let mut map = BTreeMap::new();
                for (i, name) in column_names.iter().enumerate() {
                    let value: Value = row_result
                        .get::<_, Option<String>>(i)
                        .ok()
                        .flatten()
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                    map.insert(name.clone(), value);
                }
                rows.push(Row::new(map));
            }
            Ok(rows)
        })
        .await
        .map_err(|e| SyncError::Runtime(e.to_string()))??;

        Ok(Box::new(VecCursor::new(rows)))
    }

    async fn commit(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.commit().map_err(|e| SyncError::Query(e.to_string()))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }
}
