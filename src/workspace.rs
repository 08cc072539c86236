//! Filesystem workspace: discovers configuration documents under a root directory and keeps a
//! [CorpusIndex] in sync with them.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use url::Url;
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::{IndexConfig, TomlConfigProvider},
    document::{SourceDocument, TextDocument},
    index::CorpusIndex,
    IndexError,
};

/// Outcome of [Workspace::index_all].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceReport {
    /// Every document found on disk, in path order
    pub documents: Vec<Url>,
    /// Documents that were parsed because they were new or their content changed
    pub reindexed: Vec<Url>,
    /// Tracked documents under the root that no longer exist or could not be read
    pub removed: Vec<Url>,
    /// Discovered files that could not be loaded (unreadable, not UTF-8, vanished)
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    root_uri: Url,
    config: IndexConfig,
}

impl Workspace {
    pub fn new<P: AsRef<Path>>(root: P, config: IndexConfig) -> Result<Self, IndexError> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(IndexError::NotFound(format!(
                "workspace root {root:?} is not a directory"
            )));
        }
        let root_uri = Url::from_directory_path(&root).map_err(|_| {
            IndexError::InvalidUri(format!("cannot express {root:?} as a file URI"))
        })?;
        Ok(Workspace {
            root,
            root_uri,
            config,
        })
    }

    /// Opens `root` with the configuration stored in its [crate::config::CONFIG_FILE_NAME], or
    /// the defaults if there is none.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, IndexError> {
        let config = TomlConfigProvider::in_dir(root.as_ref()).load()?;
        Workspace::new(root, config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_uri(&self) -> &Url {
        &self.root_uri
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Sorted paths of the documents under the root with a configured extension.
    pub fn discover(&self) -> Result<Vec<PathBuf>, IndexError> {
        fn is_hidden(entry: &DirEntry) -> bool {
            entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        }
        let skip_hidden = self.config.skip_hidden;
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !skip_hidden || !is_hidden(e) || e.path() == self.root)
        {
            let entry = entry?;
            if entry.file_type().is_file() && self.config.matches_extension(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort_by(|a, b| a.components().cmp(b.components()));
        tracing::debug!("Discovered {} document(s) under {:?}", paths.len(), self.root);
        Ok(paths)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<SourceDocument, IndexError> {
        SourceDocument::read(path)
    }

    /// Whether `uri` names a file under the workspace root.
    pub fn contains(&self, uri: &Url) -> bool {
        uri.as_str().starts_with(self.root_uri.as_str())
    }

    /// Indexes every discovered document and removes tracked documents under the root that no
    /// longer exist on disk. Unchanged files hit the index's fingerprint fast path.
    ///
    /// A file that fails to load is logged and listed in [WorkspaceReport::skipped]; the scan
    /// continues with the remaining files. Only a failing directory walk aborts.
    #[tracing::instrument(skip_all, fields(root = ?self.root))]
    pub fn index_all(&self, index: &CorpusIndex) -> Result<WorkspaceReport, IndexError> {
        let mut report = WorkspaceReport::default();
        let mut found = BTreeSet::new();
        for path in self.discover()? {
            let doc = match self.load(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {e}", path);
                    report.skipped.push(path);
                    continue;
                }
            };
            let before = index.entry(doc.uri()).map(|e| e.fingerprint.clone());
            let entry = index.get_or_index_document(&doc);
            if before.as_ref() != Some(&entry.fingerprint) {
                report.reindexed.push(entry.uri.clone());
            }
            found.insert(entry.uri.clone());
            report.documents.push(entry.uri.clone());
        }
        for uri in index.documents() {
            if self.contains(&uri) && !found.contains(&uri) {
                index.remove_document(&uri);
                report.removed.push(uri);
            }
        }
        tracing::info!(
            "Indexed {} document(s) under {:?}: {} reindexed, {} removed, {} skipped",
            report.documents.len(),
            self.root,
            report.reindexed.len(),
            report.removed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolveScope;
    use std::fs;
    use test_log::test;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovery_filters_extensions_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.tf", "variable \"a\" {\n}\n");
        write(dir.path(), "modules/vpc/main.tf", "variable \"b\" {\n}\n");
        write(dir.path(), ".terraform/modules/x/main.tf", "variable \"c\" {\n}\n");
        write(dir.path(), "terraform.tfvars", "a = 1\n");

        let workspace = Workspace::new(dir.path(), IndexConfig::default()).unwrap();
        let names: Vec<String> = workspace
            .discover()
            .unwrap()
            .iter()
            .map(|p| {
                p.strip_prefix(workspace.root())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["main.tf", "modules/vpc/main.tf"]);

        let all = Workspace::new(
            dir.path(),
            IndexConfig {
                skip_hidden: false,
                ..IndexConfig::default()
            },
        )
        .unwrap();
        assert_eq!(all.discover().unwrap().len(), 3);
    }

    #[test]
    fn test_unreadable_file_does_not_abort_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.tf", "variable \"a\" {\n}\n");
        write(dir.path(), "c.tf", "output \"c\" {\n  value = var.a\n}\n");
        let workspace = Workspace::new(dir.path(), IndexConfig::default()).unwrap();
        let index = CorpusIndex::new();
        workspace.index_all(&index).unwrap();
        assert_eq!(index.documents().len(), 2);

        fs::write(dir.path().join("b.tf"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("a.tf"), [0xff, 0xfe, 0x00]).unwrap();
        let report = workspace.index_all(&index).unwrap();
        assert_eq!(
            report.skipped,
            vec![workspace.root().join("a.tf"), workspace.root().join("b.tf")]
        );
        assert_eq!(report.documents.len(), 1);
        let c = Url::from_file_path(workspace.root().join("c.tf")).unwrap();
        let a = Url::from_file_path(workspace.root().join("a.tf")).unwrap();
        assert_eq!(report.removed, vec![a]);
        assert_eq!(index.documents(), vec![c.clone()]);
        assert_eq!(index.entry(&c).unwrap().sections.len(), 1);
        index.check_consistency().unwrap();
    }

    #[test]
    fn test_open_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tfindex.toml", "resolve_scope = \"corpus\"\n");
        let workspace = Workspace::open(dir.path()).unwrap();
        assert_eq!(workspace.config().resolve_scope, ResolveScope::Corpus);

        let missing = Workspace::new(dir.path().join("nope"), IndexConfig::default());
        assert!(matches!(missing, Err(IndexError::NotFound(_))));
    }
}
