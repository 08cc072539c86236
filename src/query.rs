//! Query types for [crate::index::CorpusIndex].

use enumset::EnumSet;
use regex::{escape as re_escape, Regex, RegexBuilder};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
};
use url::Url;

use crate::{
    properties::{Section, SectionKey, SectionType},
    IndexError,
};

/// Token selecting the whole corpus when a [Scope] is parsed from text.
pub const ALL_FILES: &str = "ALL_FILES";

/// Which documents a query reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every tracked document; answered from the inverted index.
    AllFiles,
    /// A single document; answered from that document's own entry.
    Document(Url),
}

impl Scope {
    pub fn includes(&self, uri: &Url) -> bool {
        match self {
            Scope::AllFiles => true,
            Scope::Document(doc) => doc == uri,
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Scope::AllFiles => write!(f, "{ALL_FILES}"),
            Scope::Document(uri) => write!(f, "{uri}"),
        }
    }
}

impl FromStr for Scope {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ALL_FILES => Ok(Scope::AllFiles),
            other => Ok(Scope::Document(Url::parse(other)?)),
        }
    }
}

impl From<Url> for Scope {
    fn from(uri: Url) -> Self {
        Scope::Document(uri)
    }
}

/// "Who refers to `target`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceQuery {
    pub target: SectionKey,
}

impl ReferenceQuery {
    pub fn new(target: SectionKey) -> Self {
        ReferenceQuery { target }
    }

    pub fn target(section: &Section) -> Self {
        ReferenceQuery {
            target: section.key(),
        }
    }
}

/// Section name filter, matched against [Section::name].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedRegex(
    #[serde(serialize_with = "serialize_regex")]
    #[serde(deserialize_with = "deserialize_regex")]
    Regex,
);

impl WrappedRegex {
    /// Compiles `pattern` case-insensitively, failing on invalid syntax.
    pub fn new(pattern: &str) -> Result<Self, IndexError> {
        Ok(WrappedRegex(
            RegexBuilder::new(pattern)
                .unicode(true)
                .case_insensitive(true)
                .build()?,
        ))
    }
}

fn serialize_regex<S>(re: &Regex, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(re.as_str())
}

struct ReVisitor;

impl<'de> de::Visitor<'de> for ReVisitor {
    type Value = Regex;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "A regex string, as validated by the Rust regex crate"
        )
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Regex::new(s).map_err(|_e| E::invalid_value(de::Unexpected::Str(s), &self))
    }
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_str(ReVisitor)
}

impl Hash for WrappedRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl PartialEq for WrappedRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for WrappedRegex {}

/// Lenient conversion: text that is not a valid pattern is matched literally.
impl From<&str> for WrappedRegex {
    fn from(other: &str) -> WrappedRegex {
        WrappedRegex::new(other).unwrap_or_else(|_| {
            WrappedRegex(
                RegexBuilder::new(&re_escape(other))
                    .case_insensitive(true)
                    .build()
                    .expect("An escaped string to always succeed as a regex"),
            )
        })
    }
}

impl Deref for WrappedRegex {
    type Target = Regex;
    fn deref(&self) -> &Regex {
        &self.0
    }
}

/// Filter over the sections of the corpus. All set criteria must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionQuery {
    pub types: EnumSet<SectionType>,
    /// Exact section id, e.g. `aws_instance.web`
    pub id: Option<String>,
    pub name: Option<WrappedRegex>,
}

impl Default for SectionQuery {
    fn default() -> Self {
        SectionQuery {
            types: SectionType::all(),
            id: None,
            name: None,
        }
    }
}

impl SectionQuery {
    pub fn all() -> Self {
        SectionQuery::default()
    }

    pub fn of_types(types: EnumSet<SectionType>) -> Self {
        SectionQuery {
            types,
            ..SectionQuery::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: WrappedRegex) -> Self {
        self.name = Some(name);
        self
    }

    pub fn matches(&self, section: &Section) -> bool {
        self.types.contains(section.section_type)
            && self.id.as_ref().is_none_or(|id| *id == section.id)
            && self
                .name
                .as_ref()
                .is_none_or(|re| re.is_match(&section.name))
    }
}
