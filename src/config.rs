use anyhow::Context;

/// Where the extract step reads from.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// Where the load step writes to. The access token is whatever OAuth bearer
/// token the deployment injects; this crate does not mint or refresh it.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub project: String,
    pub dataset: String,
    pub table: String,
    pub access_token: String,
}

impl WarehouseConfig {
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }
}

pub fn source_from_env() -> anyhow::Result<SourceConfig> {
    let uri = std::env::var("MONGODB_URI")
        .context("MONGODB_URI must be set to the document store connection string")?;

    Ok(SourceConfig {
        uri,
        database: env_or("SOURCE_DATABASE", "gradebook"),
        collection: env_or("SOURCE_COLLECTION", "grades"),
    })
}

pub fn warehouse_from_env() -> anyhow::Result<WarehouseConfig> {
    let project = std::env::var("BQ_PROJECT")
        .context("BQ_PROJECT must be set to the destination project id")?;
    let access_token = std::env::var("BQ_ACCESS_TOKEN")
        .context("BQ_ACCESS_TOKEN must be set to an OAuth bearer token")?;

    Ok(WarehouseConfig {
        project,
        dataset: env_or("BQ_DATASET", "analytics"),
        table: env_or("BQ_TABLE", "grade_rows"),
        access_token,
    })
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
