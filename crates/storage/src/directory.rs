use crate::models::Student;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid directory file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate student id: {0}")]
    DuplicateStudent(String),
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default, rename = "student")]
    students: Vec<Student>,
}

/// Static roster of students and their reference descriptors.
#[derive(Debug, Clone, Default)]
pub struct StudentDirectory {
    students: Vec<Student>,
}

impl StudentDirectory {
    pub fn new(students: Vec<Student>) -> Result<Self, DirectoryError> {
        let mut seen = HashSet::new();
        for s in &students {
            if !seen.insert(s.id.as_str()) {
                return Err(DirectoryError::DuplicateStudent(s.id.clone()));
            }
        }
        Ok(Self { students })
    }

    /// Parses `[[student]]` tables.
    pub fn from_toml_str(content: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile = toml::from_str(content)?;
        Self::new(file.students)
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = Self::from_toml_str(&content)?;
        info!("Loaded {} students from {}", dir.len(), path.display());
        Ok(dir)
    }

    /// Built-in roster used when no directory file is configured.
    pub fn demo() -> Self {
        let names = ["Ana Torres", "Luis Pérez", "María Gómez"];
        let students = names
            .iter()
            .enumerate()
            .map(|(i, name)| Student {
                id: (i + 1).to_string(),
                name: name.to_string(),
                reference_descriptor: vec![0.1 * (i + 1) as f32; 128],
            })
            .collect();
        Self { students }
    }

    pub fn all(&self) -> &[Student] {
        &self.students
    }

    pub fn find(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
