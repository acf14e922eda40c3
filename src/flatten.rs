use mongodb::bson::Bson;

use crate::models::{GradeRecord, GradeRow, StudentDocument};

/// Flattens each document's subject -> grade-list mapping into one row per
/// grade record, tagged with the parent document's id. Documents without a
/// grading mapping contribute nothing. Output order is document order, then
/// subject order (sorted, since the mapping is a `BTreeMap`), then list
/// order, so repeated runs over the same input produce identical files.
pub fn flatten_documents(documents: &[StudentDocument]) -> Vec<GradeRow> {
    let mut rows = Vec::new();

    for document in documents {
        let Some(grades) = &document.grades else {
            continue;
        };
        for records in grades.values() {
            for record in records {
                rows.push(flatten_record(record, &document.id));
            }
        }
    }

    rows
}

fn flatten_record(record: &GradeRecord, student_id: &str) -> GradeRow {
    GradeRow {
        grade: coerce_grade(record.grade.as_ref()),
        recorded_at: record.recorded_at.as_ref().and_then(render_scalar),
        notes: normalize_text(record.notes.clone()),
        grader_id: normalize_text(record.grader_id.clone()),
        activity: normalize_text(record.activity.clone()),
        criteria: normalize_text(record.criteria.clone()),
        subject: normalize_text(record.subject.clone()),
        activity_id: normalize_text(record.activity_id.clone()),
        student_name: normalize_text(record.student_name.clone()),
        grader_name: normalize_text(record.grader_name.clone()),
        student_id: student_id.to_string(),
        grader: normalize_text(record.grader.clone()),
    }
}

/// Grades arrive as numbers or strings; anything that does not parse as a
/// float becomes null rather than an error.
pub fn coerce_grade(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Empty and whitespace-only strings become null, never empty string.
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Renders the passthrough timestamp field as text: BSON datetimes become
/// RFC 3339, numeric epochs stay numeric, strings pass through subject to
/// the same blank-to-null rule.
pub fn render_scalar(value: &Bson) -> Option<String> {
    let text = match value {
        Bson::String(s) => s.clone(),
        Bson::Double(v) => v.to_string(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok()?,
        Bson::Null => return None,
        other => other.to_string(),
    };
    normalize_text(Some(text))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn record(grade: Option<Bson>, subject: &str) -> GradeRecord {
        GradeRecord {
            grade,
            subject: Some(subject.to_string()),
            student_name: Some("Avery Lee".to_string()),
            ..GradeRecord::default()
        }
    }

    fn document(id: &str, grades: Option<BTreeMap<String, Vec<GradeRecord>>>) -> StudentDocument {
        StudentDocument {
            id: id.to_string(),
            grades,
        }
    }

    #[test]
    fn rows_per_document_match_record_counts() {
        let mut grades = BTreeMap::new();
        grades.insert(
            "math".to_string(),
            vec![
                record(Some(Bson::String("8.5".to_string())), "math"),
                record(Some(Bson::Double(7.0)), "math"),
            ],
        );
        let documents = vec![
            document("stu-001", Some(grades)),
            document("stu-002", None),
        ];

        let rows = flatten_documents(&documents);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.student_id == "stu-001"));
    }

    #[test]
    fn every_row_carries_its_parent_id() {
        let mut first = BTreeMap::new();
        first.insert("math".to_string(), vec![record(None, "math")]);
        let mut second = BTreeMap::new();
        second.insert("history".to_string(), vec![record(None, "history")]);
        let documents = vec![
            document("stu-001", Some(first)),
            document("stu-002", Some(second)),
        ];

        let rows = flatten_documents(&documents);
        let ids: Vec<&str> = rows.iter().map(|row| row.student_id.as_str()).collect();
        assert_eq!(ids, vec!["stu-001", "stu-002"]);
    }

    #[test]
    fn order_is_document_then_subject_then_list() {
        let mut grades = BTreeMap::new();
        grades.insert(
            "math".to_string(),
            vec![record(Some(Bson::Int32(1)), "math"), record(Some(Bson::Int32(2)), "math")],
        );
        grades.insert("history".to_string(), vec![record(Some(Bson::Int32(3)), "history")]);
        let documents = vec![document("stu-001", Some(grades))];

        let rows = flatten_documents(&documents);
        let grades: Vec<Option<f64>> = rows.iter().map(|row| row.grade).collect();
        // "history" sorts before "math".
        assert_eq!(grades, vec![Some(3.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn numeric_strings_and_numbers_coerce_to_float() {
        assert_eq!(coerce_grade(Some(&Bson::String("8.5".to_string()))), Some(8.5));
        assert_eq!(coerce_grade(Some(&Bson::String("7".to_string()))), Some(7.0));
        assert_eq!(coerce_grade(Some(&Bson::Double(9.25))), Some(9.25));
        assert_eq!(coerce_grade(Some(&Bson::Int32(6))), Some(6.0));
        assert_eq!(coerce_grade(Some(&Bson::Int64(10))), Some(10.0));
    }

    #[test]
    fn unparseable_grades_become_null() {
        assert_eq!(coerce_grade(Some(&Bson::String("A+".to_string()))), None);
        assert_eq!(coerce_grade(Some(&Bson::String(String::new()))), None);
        assert_eq!(coerce_grade(Some(&Bson::Null)), None);
        assert_eq!(coerce_grade(None), None);
    }

    #[test]
    fn whitespace_only_grade_becomes_null() {
        let mut grades = BTreeMap::new();
        grades.insert(
            "math".to_string(),
            vec![record(Some(Bson::String("  ".to_string())), "math")],
        );
        let rows = flatten_documents(&[document("stu-001", Some(grades))]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].grade, None);
    }

    #[test]
    fn blank_text_fields_become_null_not_empty() {
        assert_eq!(normalize_text(Some("   ".to_string())), None);
        assert_eq!(normalize_text(Some("\t".to_string())), None);
        assert_eq!(normalize_text(Some(String::new())), None);
        assert_eq!(
            normalize_text(Some("missed session".to_string())),
            Some("missed session".to_string())
        );

        let blank_record = GradeRecord {
            notes: Some(" ".to_string()),
            grader_name: Some("\t\t".to_string()),
            ..GradeRecord::default()
        };
        let mut grades = BTreeMap::new();
        grades.insert("math".to_string(), vec![blank_record]);
        let rows = flatten_documents(&[document("stu-001", Some(grades))]);
        assert_eq!(rows[0].notes, None);
        assert_eq!(rows[0].grader_name, None);
    }

    #[test]
    fn timestamps_render_as_text() {
        let millis = Bson::Int64(1_725_840_000_000);
        assert_eq!(render_scalar(&millis), Some("1725840000000".to_string()));
        assert_eq!(render_scalar(&Bson::String("  ".to_string())), None);
        assert_eq!(render_scalar(&Bson::Null), None);
    }
}
