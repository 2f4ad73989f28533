use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::types::chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Decimal;
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use tracing::{info, warn};

use super::{parameters_schema, ToolContext, ToolDefinition};
use crate::error::ToolError;

const DEFAULT_ROW_LIMIT: usize = 10;

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SqlQueryInput {
    #[schemars(description = "A single SQL SELECT statement to run against the database.")]
    query: String,
}

/// Runs a read-only query and renders the rows as a JSON array.
pub(crate) async fn execute_sql_query(ctx: &ToolContext, query: &str) -> String {
    let query = match prepare_query(query) {
        Some(query) => query,
        None => return "Error: Only SELECT queries are allowed.".to_string(),
    };

    match run_query(&ctx.database_url, &query).await {
        Ok(rows) if rows.is_empty() => "No results found.".to_string(),
        Ok(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()).to_string(),
        Err(e) => {
            warn!(error = %e, query = %query, "sql query failed");
            format!("Error executing query: {}", e)
        }
    }
}

/// Accepts only SELECT statements and caps the row count when no limit is given.
fn prepare_query(query: &str) -> Option<String> {
    let query = query.trim().trim_end_matches(';').trim_end();
    let lowered = query.to_lowercase();
    if !lowered.starts_with("select") {
        return None;
    }

    if lowered.contains("limit") {
        Some(query.to_string())
    } else {
        Some(format!("{} LIMIT {}", query, DEFAULT_ROW_LIMIT))
    }
}

async fn run_query(database_url: &str, query: &str) -> Result<Vec<Map<String, Value>>, ToolError> {
    info!(query, "running sql query");
    let mut conn = MySqlConnection::connect(database_url).await?;
    let rows = sqlx::query(query).fetch_all(&mut conn).await?;
    conn.close().await?;
    Ok(rows.iter().map(row_to_json).collect())
}

fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), column_value(row, column.ordinal())))
        .collect()
}

fn column_value(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<u64, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return v.into();
    }
    if let Ok(v) = row.try_get::<Decimal, _>(index) {
        return v.to_string().into();
    }
    if let Ok(v) = row.try_get::<NaiveDateTime, _>(index) {
        return v.to_string().into();
    }
    if let Ok(v) = row.try_get::<NaiveDate, _>(index) {
        return v.to_string().into();
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return String::from_utf8_lossy(&v).into_owned().into();
    }

    Value::String(format!("<{}>", row.column(index).type_info().name()))
}

async fn execute_sql_query_impl(ctx: ToolContext, input: Value) -> String {
    match serde_json::from_value::<SqlQueryInput>(input) {
        Ok(input) => execute_sql_query(&ctx, &input.query).await,
        Err(e) => format!("Error executing query: {}", ToolError::from(e)),
    }
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "execute_sql_query",
        description: "Execute a read-only SQL SELECT query against the Rfam public database of RNA families. Tables include family, clan, taxonomy and rfamseq. Results are limited to 10 rows unless the query sets its own LIMIT.",
        input_schema: parameters_schema::<SqlQueryInput>(),
        handler: |ctx, input| Box::pin(execute_sql_query_impl(ctx, input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use serde_json::json;

    fn context(database_url: &str) -> ToolContext {
        ToolContext {
            http: Client::new(),
            search_url: String::new(),
            database_url: database_url.to_string(),
        }
    }

    #[test]
    fn appends_row_limit_when_missing() {
        assert_eq!(
            prepare_query("  SELECT rfam_acc FROM family; ").as_deref(),
            Some("SELECT rfam_acc FROM family LIMIT 10")
        );
    }

    #[test]
    fn keeps_explicit_limit() {
        assert_eq!(
            prepare_query("select * from clan limit 3").as_deref(),
            Some("select * from clan limit 3")
        );
    }

    #[test]
    fn rejects_non_select_statements() {
        assert_eq!(prepare_query("DELETE FROM family"), None);
        assert_eq!(prepare_query("  update family set type = ''"), None);
        assert_eq!(prepare_query(""), None);
    }

    #[tokio::test]
    async fn non_select_never_touches_the_database() {
        let result = execute_sql_query(&context("mysql://invalid"), "DROP TABLE family").await;
        assert_eq!(result, "Error: Only SELECT queries are allowed.");
    }

    #[tokio::test]
    async fn connection_failure_becomes_error_text() {
        let result =
            execute_sql_query(&context("mysql://nobody@127.0.0.1:1/none"), "SELECT 1").await;
        assert!(result.starts_with("Error executing query: "), "{result}");
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_text() {
        let result = execute_sql_query_impl(context("mysql://invalid"), json!({})).await;
        assert!(result.starts_with("Error executing query: invalid arguments"));
    }
}
