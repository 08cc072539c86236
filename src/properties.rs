//! Core value types shared by the codec, the index and its consumers: source positions,
//! [Section]s, [Reference]s and the [Fingerprint] used for change detection.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    str::FromStr,
};
use url::Url;

use crate::IndexError;

/// A zero-based position within a document. `character` counts UTF-16 code units, the
/// convention used by editor protocols.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// Half-open `[start, end)` span between two [Position]s.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// True when `pos` lies within the span. An empty range contains its start position.
    pub fn contains(&self, pos: Position) -> bool {
        if self.start == self.end {
            return pos == self.start;
        }
        self.start <= pos && pos < self.end
    }

    /// True when `other` lies entirely within this range.
    pub fn encloses(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// A range from `start` to the end of its line, used to place an annotation above a block.
    pub fn first_line(&self) -> Range {
        Range {
            start: self.start,
            end: Position::new(self.start.line, u32::MAX),
        }
    }
}

/// A [Range] within a specific document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: Url,
    pub range: Range,
}

impl Location {
    pub fn new(uri: Url, range: Range) -> Self {
        Location { uri, range }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uri, self.range.start)
    }
}

/// Opaque marker used to decide whether a document changed since it was last indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Monotonic version supplied by an editor.
    Version(i64),
    /// Hex encoded SHA-256 digest of the document content.
    Digest(String),
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Fingerprint::Version(v) => write!(f, "v{v}"),
            Fingerprint::Digest(d) => write!(f, "sha256:{}", &d[..d.len().min(12)]),
        }
    }
}

/// [SectionType] enumerates the syntactic categories of block that become addressable
/// [Section]s.
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(repr = "u32")]
pub enum SectionType {
    /// `resource "TYPE" "NAME" { }`, addressed as `TYPE.NAME`
    Resource,
    /// `data "TYPE" "NAME" { }`, addressed as `data.TYPE.NAME`
    Data,
    /// `module "NAME" { }`, addressed as `module.NAME`
    Module,
    /// `variable "NAME" { }`, addressed as `var.NAME`
    Variable,
    /// `output "NAME" { }`, addressed as `output.NAME`
    Output,
    /// An attribute of a `locals { }` block, addressed as `local.NAME`
    Local,
}

impl SectionType {
    /// Maps a top-level block keyword to its section type. `locals` is not listed: its
    /// attributes, not the block, are the sections.
    pub fn from_keyword(keyword: &str) -> Option<SectionType> {
        match keyword {
            "resource" => Some(SectionType::Resource),
            "data" => Some(SectionType::Data),
            "module" => Some(SectionType::Module),
            "variable" => Some(SectionType::Variable),
            "output" => Some(SectionType::Output),
            _ => None,
        }
    }

    /// Number of labels a block header of this type carries.
    pub fn label_count(&self) -> usize {
        match self {
            SectionType::Resource | SectionType::Data => 2,
            SectionType::Module | SectionType::Variable | SectionType::Output => 1,
            SectionType::Local => 0,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SectionType::Resource => "resource",
            SectionType::Data => "data",
            SectionType::Module => "module",
            SectionType::Variable => "variable",
            SectionType::Output => "output",
            SectionType::Local => "local",
        }
    }

    /// Computes the identity of a section from its type and header labels.
    ///
    /// Returns `None` if the number of labels does not match [SectionType::label_count]
    /// (for [SectionType::Local] a single name is expected).
    pub fn section_id(&self, labels: &[&str]) -> Option<String> {
        match (self, labels) {
            (SectionType::Resource, [kind, name]) => Some(format!("{kind}.{name}")),
            (SectionType::Data, [kind, name]) => Some(format!("data.{kind}.{name}")),
            (SectionType::Module, [name]) => Some(format!("module.{name}")),
            (SectionType::Variable, [name]) => Some(format!("var.{name}")),
            (SectionType::Output, [name]) => Some(format!("output.{name}")),
            (SectionType::Local, [name]) => Some(format!("local.{name}")),
            _ => None,
        }
    }

    pub fn all() -> EnumSet<SectionType> {
        EnumSet::all()
    }
}

impl Display for SectionType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl FromStr for SectionType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim() {
            "local" | "locals" => Ok(SectionType::Local),
            "var" => Ok(SectionType::Variable),
            other => SectionType::from_keyword(other)
                .ok_or_else(|| IndexError::InvalidQuery(format!("Unknown section type '{s}'"))),
        }
    }
}

/// Corpus-wide identity of a [Section]: the declaring document plus the section id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    pub uri: Url,
    pub id: String,
}

impl SectionKey {
    pub fn new(uri: Url, id: impl Into<String>) -> Self {
        SectionKey { uri, id: id.into() }
    }
}

impl Display for SectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.uri, self.id)
    }
}

/// A named, typed, addressable block within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    /// Identity computed from the declared kind and labels, e.g. `aws_instance.web` or
    /// `var.region`. Unique within a document.
    pub id: String,
    pub section_type: SectionType,
    /// The last header label (or attribute name for locals).
    pub name: String,
    /// The first label of `resource` and `data` blocks.
    pub type_label: Option<String>,
    /// Span of the block header, from the keyword through the opening brace.
    pub location: Location,
    /// Span of the whole block.
    pub body: Range,
}

impl Section {
    pub fn key(&self) -> SectionKey {
        SectionKey::new(self.location.uri.clone(), self.id.clone())
    }

    pub fn first_line_range(&self) -> Range {
        self.location.range.first_line()
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) at {}", self.id, self.section_type, self.location)
    }
}

/// An occurrence in source text that denotes another [Section] by identity.
///
/// The target is stored as a [SectionKey] rather than a handle to the section itself; use
/// [crate::index::CorpusIndex::section] to fetch the current declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub target: SectionKey,
    /// Location of the referencing expression.
    pub location: Location,
}

impl Reference {
    pub fn new(target: SectionKey, location: Location) -> Self {
        Reference { target, location }
    }
}

/// References order by referencing document, then source position, then target.
impl Ord for Reference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location
            .uri
            .cmp(&other.location.uri)
            .then_with(|| self.location.range.cmp(&other.location.range))
            .then_with(|| self.target.cmp(&other.target))
    }
}

impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.location, self.target)
    }
}
