use std::path::Path;

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::Client;
use tracing::info;

use crate::artifact::{ArtifactRef, ArtifactStore};
use crate::config::SourceConfig;
use crate::error::StepError;
use crate::flatten;
use crate::models::{ExtractOutcome, GradeRow, StudentDocument};

/// Extract step: fetch every document from the source collection, flatten the
/// per-subject grade lists into rows, and publish the CSV artifact for the
/// load step to pick up.
pub async fn run(
    source: &SourceConfig,
    store: &ArtifactStore,
    run_id: &str,
) -> Result<ExtractOutcome, StepError> {
    let documents = fetch_documents(source).await?;
    if documents.is_empty() {
        info!(collection = %source.collection, "source collection returned no documents");
        return Ok(ExtractOutcome::SourceEmpty);
    }

    let rows = flatten::flatten_documents(&documents);
    info!(
        documents = documents.len(),
        rows = rows.len(),
        "flattened grade records"
    );

    let path = store.row_file_path(run_id)?;
    write_rows(&path, &rows)?;

    let artifact = ArtifactRef {
        run_id: run_id.to_string(),
        path,
        rows: rows.len(),
        produced_at: Utc::now(),
    };
    store.publish(&artifact)?;

    Ok(ExtractOutcome::Written(artifact))
}

async fn fetch_documents(source: &SourceConfig) -> Result<Vec<StudentDocument>, StepError> {
    let client = Client::with_uri_str(&source.uri).await?;
    let collection = client
        .database(&source.database)
        .collection::<Document>(&source.collection);

    let raw: Vec<Document> = collection.find(doc! {}).await?.try_collect().await?;

    let mut documents = Vec::with_capacity(raw.len());
    for document in raw {
        let student: StudentDocument =
            bson::from_document(document).map_err(|err| StepError::Shape(err.to_string()))?;
        documents.push(student);
    }

    Ok(documents)
}

/// Writes the flattened rows as delimited text with a header row. `None`
/// fields serialize as empty, which is the null marker the warehouse's CSV
/// ingestion expects.
pub fn write_rows(path: &Path, rows: &[GradeRow]) -> Result<(), StepError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(crate::models::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
