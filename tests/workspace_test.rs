//! Workspace integration tests
//!
//! These tests index a Terraform workspace on disk and verify that the corpus index follows
//! edits, deletions and repeated scans of the filesystem.

mod common;

use common::{create_test_workspace, init_logging, write_file};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use test_log::test;
use tfindex::{
    config::{IndexConfig, ResolveScope, TomlConfigProvider},
    index::{CorpusIndex, DocumentState},
    lens::ReferenceLensProvider,
    properties::SectionKey,
    query::{ReferenceQuery, Scope, SectionQuery},
    workspace::Workspace,
};
use url::Url;

fn file_uri(root: &Path, rel: &str) -> Url {
    Url::from_file_path(root.join(rel)).unwrap()
}

fn references(index: &CorpusIndex, root: &Path, rel: &str, id: &str) -> Vec<(String, u32)> {
    index
        .query_references(
            &Scope::AllFiles,
            &ReferenceQuery::new(SectionKey::new(file_uri(root, rel), id)),
        )
        .into_iter()
        .map(|r| {
            let path = r.location.uri.to_file_path().unwrap();
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            (rel, r.location.range.start.line)
        })
        .collect()
}

#[test]
fn test_index_all_builds_cross_document_references() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_workspace(&temp_dir);
    let workspace = Workspace::open(&root).unwrap();
    let index = CorpusIndex::with_config(workspace.config().clone());

    let report = workspace.index_all(&index).unwrap();
    assert_eq!(report.documents.len(), 4);
    assert_eq!(report.reindexed.len(), 4);
    assert!(report.removed.is_empty());

    assert_eq!(
        references(&index, &root, "variables.tf", "var.region"),
        vec![("main.tf".to_string(), 1), ("main.tf".to_string(), 19)]
    );
    assert_eq!(
        references(&index, &root, "main.tf", "aws_instance.web"),
        vec![("outputs.tf".to_string(), 1)]
    );
    assert_eq!(
        references(&index, &root, "modules/vpc/main.tf", "var.region"),
        vec![("modules/vpc/main.tf".to_string(), 5)]
    );

    let main = index.entry(&file_uri(&root, "main.tf")).unwrap();
    assert_eq!(main.references.len(), 5);
    assert!(main.unresolved.is_empty());

    let variables = index.query_sections(
        &Scope::AllFiles,
        &SectionQuery::all().with_id("var.region"),
    );
    assert_eq!(variables.len(), 2);
    index.check_consistency().unwrap();
}

#[test]
fn test_rescan_follows_edits_and_deletions() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_workspace(&temp_dir);
    let workspace = Workspace::open(&root).unwrap();
    let index = CorpusIndex::with_config(workspace.config().clone());
    workspace.index_all(&index).unwrap();
    let parsed = index.stats().parsed;

    let unchanged = workspace.index_all(&index).unwrap();
    assert!(unchanged.reindexed.is_empty());
    assert_eq!(index.stats().parsed, parsed);

    write_file(
        &root,
        "outputs.tf",
        "output \"web_ips\" {\n  value = aws_instance.web[*].private_ip\n}\n",
    );
    std::fs::remove_file(root.join("variables.tf")).unwrap();

    let report = workspace.index_all(&index).unwrap();
    assert_eq!(report.reindexed, vec![file_uri(&root, "outputs.tf")]);
    assert_eq!(report.removed, vec![file_uri(&root, "variables.tf")]);
    assert_eq!(
        index.document_state(&file_uri(&root, "main.tf")),
        DocumentState::Stale
    );

    assert!(references(&index, &root, "main.tf", "module.vpc").is_empty());
    assert!(references(&index, &root, "variables.tf", "var.region").is_empty());
    let main = index.entry(&file_uri(&root, "main.tf")).unwrap();
    let unresolved: Vec<&str> = main
        .unresolved
        .iter()
        .map(|u| u.target_id.as_str())
        .collect();
    assert_eq!(unresolved, vec!["var.region", "var.instance_count", "var.region"]);
    index.check_consistency().unwrap();
}

#[test]
fn test_corpus_scope_from_config_file() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_workspace(&temp_dir);
    std::fs::remove_file(root.join("modules/vpc/main.tf")).unwrap();
    write_file(
        &root,
        "modules/vpc/main.tf",
        "output \"region\" {\n  value = var.region\n}\n",
    );

    let module_index = CorpusIndex::new();
    Workspace::open(&root).unwrap().index_all(&module_index).unwrap();
    let child = module_index
        .entry(&file_uri(&root, "modules/vpc/main.tf"))
        .unwrap();
    assert_eq!(child.unresolved.len(), 1);

    TomlConfigProvider::in_dir(&root)
        .store(&IndexConfig {
            resolve_scope: ResolveScope::Corpus,
            ..IndexConfig::default()
        })
        .unwrap();
    let workspace = Workspace::open(&root).unwrap();
    let corpus_index = CorpusIndex::with_config(workspace.config().clone());
    workspace.index_all(&corpus_index).unwrap();
    assert_eq!(
        references(&corpus_index, &root, "variables.tf", "var.region").len(),
        3
    );
}

#[test]
fn test_annotations_over_workspace() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let root = create_test_workspace(&temp_dir);
    let workspace = Workspace::open(&root).unwrap();
    let index = Arc::new(CorpusIndex::with_config(workspace.config().clone()));
    workspace.index_all(&index).unwrap();

    let provider = ReferenceLensProvider::new(index.clone());
    let variables = workspace.load(root.join("variables.tf")).unwrap();
    let titles: Vec<(String, String)> = provider
        .produce_annotations(&variables)
        .into_iter()
        .map(|lens| provider.resolve_annotation(lens))
        .map(|lens| (lens.section.id.clone(), lens.command.unwrap().title))
        .collect();
    assert_eq!(
        titles,
        vec![
            ("var.region".to_string(), "2 references".to_string()),
            ("var.instance_count".to_string(), "1 references".to_string())
        ]
    );
}
