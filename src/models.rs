use std::collections::BTreeMap;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRef;

/// One source document: a student plus their per-subject grade history.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentDocument {
    pub id: String,
    pub grades: Option<BTreeMap<String, Vec<GradeRecord>>>,
}

/// A single grade entry as stored in the document database. The upstream app
/// writes grades as numbers or strings and the timestamp in whatever shape it
/// had on hand, so both stay `Bson` until flattening.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradeRecord {
    pub grade: Option<Bson>,
    pub recorded_at: Option<Bson>,
    pub notes: Option<String>,
    pub grader_id: Option<String>,
    pub activity: Option<String>,
    pub criteria: Option<String>,
    pub subject: Option<String>,
    pub activity_id: Option<String>,
    pub student_name: Option<String>,
    pub grader_name: Option<String>,
    pub grader: Option<String>,
}

/// Column order shared by the row struct, the CSV header, and the warehouse
/// schema.
pub const COLUMNS: [&str; 12] = [
    "grade",
    "recorded_at",
    "notes",
    "grader_id",
    "activity",
    "criteria",
    "subject",
    "activity_id",
    "student_name",
    "grader_name",
    "student_id",
    "grader",
];

/// A flattened grade record tagged with its parent document's id. Field order
/// matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub grade: Option<f64>,
    pub recorded_at: Option<String>,
    pub notes: Option<String>,
    pub grader_id: Option<String>,
    pub activity: Option<String>,
    pub criteria: Option<String>,
    pub subject: Option<String>,
    pub activity_id: Option<String>,
    pub student_name: Option<String>,
    pub grader_name: Option<String>,
    pub student_id: String,
    pub grader: Option<String>,
}

/// Result of the extract step. An empty source collection is a valid state,
/// not a failure, and produces no artifact.
#[derive(Debug)]
pub enum ExtractOutcome {
    Written(ArtifactRef),
    SourceEmpty,
}

/// Result of the load step. A missing artifact means the extract step saw an
/// empty source, so there is nothing to load.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded { rows: u64 },
    NothingToLoad,
}
