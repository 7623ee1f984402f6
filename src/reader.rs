//! Partitioned Reader — dialect-specific SQL construction and batched
//! fetch, re-keyed from physical to logical column names. See §4.5.

use crate::connection::{Connection, Dialect, Param};
use crate::error::Result;
use crate::partition::Partition;
use crate::row::{ColumnMap, Row};
use crate::value::Value;

/// Everything the reader needs to build and run one partition's query.
#[derive(Debug, Clone)]
pub struct ReadSpec<'a> {
    pub schema: &'a str,
    pub table: &'a str,
    pub columns: &'a ColumnMap,
    pub primary_key: &'a str,
    pub year_col: &'a str,
    pub month_col: &'a str,
    pub week_col: Option<&'a str>,
    pub batch_size: usize,
    pub limit: Option<u64>,
    /// Restrict to a single primary-key value (`--record PK`).
    pub record_pk: Option<&'a str>,
}

/// Build the projected, partition-filtered, key-ordered `SELECT` for one
/// partition, plus its bound parameters (§4.5).
pub fn build_query(spec: &ReadSpec, partition: &Partition, dialect: Dialect) -> (String, Vec<Param>) {
    let projected: Vec<&str> = spec.columns.physical_names_in_logical_order().collect();
    let phys_pk = spec.columns.physical(spec.primary_key).unwrap_or(spec.primary_key);

    let mut params = Vec::new();
    let mut position = 0usize;
    let mut next_placeholder = |params: &mut Vec<Param>, value: Param| -> String {
        position += 1;
        params.push(value);
        dialect.placeholder(position)
    };

    let mut sql = format!(
        "SELECT {} FROM {}.{} WHERE {} = {}",
        projected.join(", "),
        spec.schema,
        spec.table,
        spec.year_col,
        next_placeholder(&mut params, Param::Text(partition.year.clone())),
    );
    sql.push_str(&format!(
        " AND {} = {}",
        spec.month_col,
        next_placeholder(&mut params, Param::Text(partition.month.clone())),
    ));
    if let (Some(week_col), Some(week)) = (spec.week_col, &partition.week) {
        sql.push_str(&format!(
            " AND {} = {}",
            week_col,
            next_placeholder(&mut params, Param::Text(week.clone())),
        ));
    }
    if let Some(pk) = spec.record_pk {
        sql.push_str(&format!(
            " AND {} = {}",
            phys_pk,
            next_placeholder(&mut params, Param::Text(pk.to_string())),
        ));
    }
    sql.push_str(&format!(" ORDER BY {phys_pk}"));
    if let Some(limit) = spec.limit {
        sql.push(' ');
        sql.push_str(&dialect.limit_clause(limit));
    }

    (sql, params)
}

/// Read an entire partition into memory, re-keyed to logical column
/// names, in physical-key order (the caller, the Merge-Walker, depends on
/// that order — §4.6).
pub async fn read_partition(
    conn: &dyn Connection,
    spec: &ReadSpec<'_>,
    partition: &Partition,
) -> Result<Vec<Row>> {
    let (sql, params) = build_query(spec, partition, conn.dialect());
    let mut cursor = conn.execute(&sql, &params).await?;

    let mut rows = Vec::new();
    loop {
        let batch = cursor.fetchmany(spec.batch_size).await?;
        if batch.is_empty() {
            break;
        }
        for raw in batch {
            rows.push(rekey(&raw, spec.columns));
        }
    }
    Ok(rows)
}

/// Re-key a row from physical column names (as returned by the driver) to
/// logical names, per the configured [`ColumnMap`].
fn rekey(raw: &Row, columns: &ColumnMap) -> Row {
    let mut values = std::collections::BTreeMap::new();
    for logical in columns.logical_names() {
        let physical = columns.physical(logical).unwrap_or(logical);
        let value = raw.get(physical).cloned().unwrap_or(Value::Null);
        values.insert(logical.to_string(), value);
    }
    Row::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mock::MockConnection;
    use std::collections::BTreeMap;

    fn columns() -> ColumnMap {
        ColumnMap::from_pairs([("id", "row_id"), ("amount", "amt")])
    }

    #[test]
    fn test_build_query_sqlserver_placeholders() {
        let cols = columns();
        let spec = ReadSpec {
            schema: "dbo",
            table: "accounts",
            columns: &cols,
            primary_key: "id",
            year_col: "yr",
            month_col: "mo",
            week_col: None,
            batch_size: 500,
            limit: None,
            record_pk: None,
        };
        let partition = Partition::new("2021", 1, None);
        let (sql, params) = build_query(&spec, &partition, Dialect::SqlServer);
        assert!(sql.contains("SELECT row_id, amt FROM dbo.accounts"));
        assert!(sql.contains("WHERE yr = ? AND mo = ?"));
        assert!(sql.contains("ORDER BY row_id"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_build_query_oracle_numbered_placeholders() {
        let cols = columns();
        let spec = ReadSpec {
            schema: "src",
            table: "accounts",
            columns: &cols,
            primary_key: "id",
            year_col: "yr",
            month_col: "mo",
            week_col: Some("wk"),
            batch_size: 500,
            limit: Some(100),
            record_pk: None,
        };
        let partition = Partition::new("2021", 1, Some("2".to_string()));
        let (sql, params) = build_query(&spec, &partition, Dialect::Oracle);
        assert!(sql.contains("yr = :1 AND mo = :2 AND wk = :3"));
        assert!(sql.contains("FETCH FIRST 100 ROWS ONLY"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_build_query_record_pk_filter() {
        let cols = columns();
        let spec = ReadSpec {
            schema: "dbo",
            table: "accounts",
            columns: &cols,
            primary_key: "id",
            year_col: "yr",
            month_col: "mo",
            week_col: None,
            batch_size: 500,
            limit: None,
            record_pk: Some("42"),
        };
        let partition = Partition::new("2021", 1, None);
        let (sql, params) = build_query(&spec, &partition, Dialect::SqlServer);
        assert!(sql.contains("AND row_id = ?"));
        assert_eq!(params.len(), 3);
    }

    #[tokio::test]
    async fn test_read_partition_rekeys_physical_to_logical() {
        let conn = MockConnection::new(Dialect::SqlServer);
        let mut row = BTreeMap::new();
        row.insert("row_id".to_string(), Value::Int(1));
        row.insert("amt".to_string(), Value::Float(10.5));
        row.insert("yr".to_string(), Value::String("2021".to_string()));
        row.insert("mo".to_string(), Value::String("01".to_string()));
        conn.seed_table("dbo.accounts", vec![row]);

        let cols = columns();
        let spec = ReadSpec {
            schema: "dbo",
            table: "accounts",
            columns: &cols,
            primary_key: "id",
            year_col: "yr",
            month_col: "mo",
            week_col: None,
            batch_size: 500,
            limit: None,
            record_pk: None,
        };
        let partition = Partition::new("2021", 1, None);
        let rows = read_partition(&conn, &spec, &partition).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("amount"), Some(&Value::Float(10.5)));
    }
}
