//! Reading class-path project files.
//!
//! A project file is a class-path file plus an optional table of custom marshalers:
//!
//! ```json
//! {
//!   "runtime": { "object": "objc.ObjCObject" },
//!   "types": [ { "name": "app.View", "superclass": "foundation.NSObject" } ],
//!   "marshalers": { "custom": { "app.Color": "ColorMarshaler" } }
//! }
//! ```

use std::path::{Path, PathBuf};

use derive_more::{Display, From};
use msgbridge_model::{ClassPath, ClassPathFile, DefaultMarshalers};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectFile {
    #[serde(flatten)]
    pub class_path: ClassPathFile,
    #[serde(default)]
    pub marshalers: DefaultMarshalers,
}

/// A loaded project: the class path merged over the bootstrap types, and its marshalers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    pub class_path: ClassPath,
    pub marshalers: DefaultMarshalers,
}

#[derive(Debug, Display, From)]
pub enum LoadErrorKind {
    #[display("{_0}")]
    Io(std::io::Error),
    #[display("invalid project file: {_0}")]
    Json(serde_json::Error),
}

#[derive(Debug, Display)]
#[display("{}: {kind}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    pub kind: LoadErrorKind,
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::Io(e) => Some(e),
            LoadErrorKind::Json(e) => Some(e),
        }
    }
}

impl LoadError {
    pub(crate) fn new(path: &Path, kind: impl Into<LoadErrorKind>) -> Self {
        LoadError {
            path: path.to_owned(),
            kind: kind.into(),
        }
    }
}

pub fn parse_project(text: &str) -> Result<Project, serde_json::Error> {
    let file: ProjectFile = serde_json::from_str(text)?;
    Ok(Project {
        class_path: file.class_path.into(),
        marshalers: file.marshalers,
    })
}

pub fn load_project(path: &Path) -> Result<Project, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::new(path, e))?;
    parse_project(&text).map_err(|e| LoadError::new(path, e))
}
