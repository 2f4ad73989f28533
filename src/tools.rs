use futures::future::BoxFuture;
use reqwest::Client;

mod sql_query;
mod web_search;

pub(crate) use sql_query::execute_sql_query;
pub(crate) use web_search::web_search;

/// Shared handles a tool needs for one invocation.
#[derive(Clone)]
pub(crate) struct ToolContext {
    pub(crate) http: Client,
    pub(crate) search_url: String,
    pub(crate) database_url: String,
}

/// Tools never fail outward: errors come back as text the model can relay.
type ToolHandler = fn(ToolContext, serde_json::Value) -> BoxFuture<'static, String>;

pub(crate) struct ToolDefinition {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) input_schema: serde_json::Value,
    pub(crate) handler: ToolHandler,
}

#[derive(Debug, Clone, Copy)]
pub struct EnabledTools {
    pub search: bool,
    pub database: bool,
}

pub(crate) fn get_tools(enabled: EnabledTools) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    if enabled.search {
        tools.push(web_search::definition());
    }
    if enabled.database {
        tools.push(sql_query::definition());
    }
    tools
}

/// JSON schema for `T` in the subset the model API accepts.
pub(crate) fn parameters_schema<T: schemars::JsonSchema>() -> serde_json::Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    schema
}
