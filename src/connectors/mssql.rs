//! Thin SQL Server adapter backed by `tiberius`. Driver internals are out
//! of scope (§1); this module only translates the core's [`Connection`]
//! surface onto a pooled `tiberius::Client`.

use crate::connection::{Connection, Cursor, Dialect, Param, VecCursor};
use crate::error::{Result, SyncError};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub struct SqlServerConnection {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl SqlServerConnection {
    pub async fn connect(role: &'static str, host: &str, port: u16, user: &str, password: &str, database: &str) -> Result<Self> {
        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.authentication(tiberius::AuthMethod::sql_server(user, password));
        config.database(database);
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SyncError::Connect {
                role,
                message: e.to_string(),
            })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| SyncError::Connect {
                role,
                message: e.to_string(),
            })?;

        Ok(SqlServerConnection {
            client: Mutex::new(client),
        })
    }
}

fn to_sql_param(p: &Param) -> Box<dyn tiberius::ToSql> {
    match p {
        Param::Null => Box::new(Option::<i64>::None),
        Param::Int(v) => Box::new(*v),
        Param::Float(v) => Box::new(*v),
        Param::Text(v) => Box::new(v.clone()),
    }
}

#[async_trait]
impl Connection for SqlServerConnection {
    async fn execute(&self, sql: &str, params: &[Param]) -> Result<Box<dyn Cursor>> {
        let owned: Vec<Box<dyn tiberius::ToSql>> = params.iter().map(to_sql_param).collect();
        let refs: Vec<&dyn tiberius::ToSql> = owned.iter().map(|b| b.as_ref()).collect();

        let mut client = self.client.lock().await;
        let stream = client
            .query(sql, &refs)
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| SyncError::Query(e.to_string()))?;

        let mapped = rows
            .into_iter()
            .map(|row| {
                let mut map = std::collections::BTreeMap::new();
                for col in row.columns() {
                    let name = col.name().to_lowercase();
                    let value: Value = row
                        .try_get::<&str, _>(col.name())
                        .ok()
                        .flatten()
                        .map(|s| Value::String(s.to_string()))
                        .unwrap_or(Value::Null);
                    map.insert(name, value);
                }
                Row::new(map)
            })
            .collect();
        Ok(Box::new(VecCursor::new(mapped)))
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }
}
