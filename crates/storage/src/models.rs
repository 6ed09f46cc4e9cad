use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Face embedding as produced by the extraction model.
pub type Descriptor = Vec<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub reference_descriptor: Descriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    /// Copied from the directory at creation time, never re-validated.
    pub student_name: String,
    pub timestamp: DateTime<Utc>,
    pub validated_by_face: bool,
}

impl AttendanceRecord {
    pub fn for_student(
        id: impl Into<String>,
        student: &Student,
        timestamp: DateTime<Utc>,
        validated_by_face: bool,
    ) -> Self {
        Self {
            id: id.into(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            timestamp,
            validated_by_face,
        }
    }
}
