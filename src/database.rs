use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use msgbridge_model::{ClassPath, DefaultMarshalers};
use msgbridge_passes::BridgeConfig;

use crate::loader::{LoadError, Project, load_project};

/// A class path to transform, with the marshalers and configuration it is transformed under.
#[salsa::input(debug)]
pub struct ClassPathSource {
    #[returns(ref)]
    pub path: PathBuf,
    #[returns(ref)]
    pub class_path: ClassPath,
    #[returns(ref)]
    pub marshalers: DefaultMarshalers,
    pub config: BridgeConfig,
}

impl ClassPathSource {
    pub fn from_project(db: &dyn salsa::Database, path: impl Into<PathBuf>, project: Project, config: BridgeConfig) -> Self {
        Self::new(db, path.into(), project.class_path, project.marshalers, config)
    }
}

#[derive(Default, Clone)]
#[salsa::db]
pub struct BridgeDatabaseImpl {
    storage: salsa::Storage<Self>,
    /// Loaded project files, keyed by canonical path and configuration.
    sources: Arc<DashMap<(PathBuf, BridgeConfig), ClassPathSource>>,
}

#[salsa::db]
impl salsa::Database for BridgeDatabaseImpl {}

impl BridgeDatabaseImpl {
    pub fn input(&self, path: PathBuf, config: BridgeConfig) -> Result<ClassPathSource, LoadError> {
        let path = path
            .canonicalize()
            .map_err(|e| LoadError::new(&path, e))?;
        match self.sources.entry((path.clone(), config)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let project = load_project(&path)?;
                let source = ClassPathSource::from_project(self, path, project, config);
                entry.insert(source);
                Ok(source)
            }
        }
    }
}
