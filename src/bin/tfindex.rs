//! tfindex CLI tool
//!
//! Command-line interface for inspecting the cross-reference index of a Terraform workspace.
//!
//! ## Commands
//!
//! - `sections <path>`: List sections with their reference counts
//! - `references <path> <section-id>`: List references to a section
//! - `check <path>`: Report unresolved references and verify index consistency
//!
//! `<path>` is a workspace directory or a single file. For a file, its directory is indexed and
//! output is limited to that file.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tfindex::{
    codec::UnresolvedReference,
    document::TextDocument,
    index::CorpusIndex,
    properties::{Reference, Section},
    query::{ReferenceQuery, Scope, SectionQuery},
    workspace::Workspace,
    IndexError,
};

#[derive(Parser)]
#[command(name = "tfindex")]
#[command(author, version, about = "Cross-reference index for Terraform configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sections declared under a path
    Sections {
        /// Workspace directory or file
        path: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List every reference to a section
    References {
        /// Workspace directory or file declaring the section
        path: PathBuf,

        /// Section id, e.g. `aws_instance.web` or `var.region`
        section_id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Report unresolved references and verify index consistency
    Check {
        /// Workspace directory or file
        path: PathBuf,

        /// Exit with an error if any reference is unresolved
        #[arg(long)]
        deny_unresolved: bool,
    },
}

#[derive(Serialize)]
struct SectionRow {
    #[serde(flatten)]
    section: Section,
    references: usize,
}

#[derive(Serialize)]
struct ReferenceRow {
    section: Section,
    references: Vec<Reference>,
}

/// Splits `path` into the workspace root to index and, for a file, the file to scope output to.
/// A bare file name (`main.tf`) has an empty parent, which means the current directory.
fn workspace_root(path: &Path, is_file: bool) -> (PathBuf, Option<PathBuf>) {
    if !is_file {
        return (path.to_path_buf(), None);
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    (dir, Some(path.to_path_buf()))
}

/// Indexes the workspace containing `path` and returns the query scope `path` denotes.
fn open(path: &Path) -> Result<(CorpusIndex, Scope), IndexError> {
    let (root, file) = workspace_root(path, path.is_file());
    let workspace = Workspace::open(&root)?;
    let index = CorpusIndex::with_config(workspace.config().clone());
    workspace.index_all(&index)?;
    let scope = match file {
        Some(file) => Scope::Document(workspace.load(file)?.uri().clone()),
        None => Scope::AllFiles,
    };
    Ok((index, scope))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sections { path, json } => {
            let (index, scope) = open(&path)?;
            let rows: Vec<SectionRow> = index
                .query_sections(&scope, &SectionQuery::all())
                .into_iter()
                .map(|section| {
                    let references = index
                        .query_references(&Scope::AllFiles, &ReferenceQuery::target(&section))
                        .len();
                    SectionRow {
                        section,
                        references,
                    }
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows.iter() {
                    println!(
                        "{}\t{}\t{} references",
                        row.section.location, row.section.id, row.references
                    );
                }
            }
            Ok(())
        }

        Commands::References {
            path,
            section_id,
            json,
        } => {
            let (index, scope) = open(&path)?;
            let sections =
                index.query_sections(&scope, &SectionQuery::all().with_id(section_id.as_str()));
            if sections.is_empty() {
                return Err(IndexError::NotFound(format!(
                    "no section {section_id} under {path:?}"
                ))
                .into());
            }
            let rows: Vec<ReferenceRow> = sections
                .into_iter()
                .map(|section| {
                    let references = index
                        .query_references(&Scope::AllFiles, &ReferenceQuery::target(&section));
                    ReferenceRow {
                        section,
                        references,
                    }
                })
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows.iter() {
                    println!("{} ({} references)", row.section, row.references.len());
                    for reference in row.references.iter() {
                        println!("  {}", reference.location);
                    }
                }
            }
            Ok(())
        }

        Commands::Check {
            path,
            deny_unresolved,
        } => {
            let (index, scope) = open(&path)?;
            index.refresh_stale();
            let mut unresolved: Vec<UnresolvedReference> = Vec::new();
            for uri in index.documents() {
                if !scope.includes(&uri) {
                    continue;
                }
                if let Some(entry) = index.entry(&uri) {
                    unresolved.extend(entry.unresolved.iter().cloned());
                }
            }
            for item in unresolved.iter() {
                println!("warning: {item}");
            }
            index.check_consistency()?;
            println!(
                "{} document(s), {} unresolved reference(s)",
                index.documents().len(),
                unresolved.len()
            );
            if deny_unresolved && !unresolved.is_empty() {
                return Err(IndexError::Custom(format!(
                    "{} unresolved reference(s)",
                    unresolved.len()
                ))
                .into());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_of_bare_file_name_is_current_dir() {
        let (root, file) = workspace_root(Path::new("main.tf"), true);
        assert_eq!(root, PathBuf::from("."));
        assert_eq!(file, Some(PathBuf::from("main.tf")));
    }

    #[test]
    fn test_workspace_root_of_nested_file_and_directory() {
        let (root, file) = workspace_root(Path::new("infra/main.tf"), true);
        assert_eq!(root, PathBuf::from("infra"));
        assert_eq!(file, Some(PathBuf::from("infra/main.tf")));

        let (root, file) = workspace_root(Path::new("infra"), false);
        assert_eq!(root, PathBuf::from("infra"));
        assert_eq!(file, None);
    }

    #[test]
    fn test_open_bare_file_name_relative_to_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "variable \"a\" {\n}\n").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let opened = open(Path::new("main.tf"));
        std::env::set_current_dir(previous).unwrap();

        let (index, scope) = opened.unwrap();
        assert_eq!(index.documents().len(), 1);
        assert!(matches!(scope, Scope::Document(_)));
    }
}
