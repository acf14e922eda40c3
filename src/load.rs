use std::fs;

use tracing::info;

use crate::artifact::ArtifactStore;
use crate::error::StepError;
use crate::models::LoadOutcome;
use crate::warehouse::WarehouseSink;

/// Load step: find the artifact the extract step published for this run and
/// hand it to the warehouse under full-replace semantics.
pub async fn run(
    store: &ArtifactStore,
    sink: &dyn WarehouseSink,
    run_id: &str,
) -> Result<LoadOutcome, StepError> {
    let Some(artifact) = store.retrieve(run_id)? else {
        info!(run_id, "no artifact for this run, nothing to load");
        return Ok(LoadOutcome::NothingToLoad);
    };

    let bytes = fs::read(&artifact.path)?;
    info!(
        run_id,
        rows = artifact.rows,
        path = %artifact.path.display(),
        "submitting load job"
    );
    let rows = sink.replace_table(bytes).await?;
    info!(run_id, rows, "load job finished");

    Ok(LoadOutcome::Loaded { rows })
}
