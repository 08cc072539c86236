//! Terraform/HCL section parser and reference-expression scanner.
//!
//! ## Sections
//!
//! Top-level blocks whose keyword maps to a [SectionType] become sections:
//!
//! ```hcl
//! resource "aws_instance" "web" { }   # aws_instance.web
//! data "aws_ami" "ubuntu" { }         # data.aws_ami.ubuntu
//! module "vpc" { }                    # module.vpc
//! variable "region" { }               # var.region
//! output "ip" { }                     # output.ip
//! locals {
//!   tags = { }                        # local.tags
//! }
//! ```
//!
//! Malformed input is handled best effort:
//! - headers with an unknown keyword or the wrong number of labels are skipped (their braces
//!   are still tracked);
//! - a block missing its closing brace ends where the next top-level header starts in column
//!   zero, or at the end of the document;
//! - the first declaration of a duplicated id wins.
//!
//! ## References
//!
//! Traversals in expressions, bare or inside `${ }` / `%{ }` interpolations, are mapped to the
//! section id they address: `var.N`, `local.N`, `module.N…`, `data.T.N…` and `T.N…` where `T`
//! looks like a provider resource type (`aws_instance`, `random_id`, …).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::{
    codec::{
        lexer::{tokenize, Token, TokenKind},
        lines::LineIndex,
        DocCodec, ReferenceExpression,
    },
    properties::{Location, Range, Section, SectionType},
};

/// Resource and data source types are `<provider>_<name>`.
static RESOURCE_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*_[a-z0-9_]+$").expect("static pattern compiles"));

/// Traversal roots that are language built-ins, never section references.
const BUILTIN_ROOTS: &[&str] = &["each", "count", "path", "self", "terraform"];

/// Keywords that may start a top-level block. Used to recover from unclosed blocks.
const TOP_LEVEL_KEYWORDS: &[&str] = &[
    "resource",
    "data",
    "module",
    "variable",
    "output",
    "locals",
    "provider",
    "terraform",
    "moved",
    "import",
    "check",
    "removed",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct HclCodec;

impl HclCodec {
    pub fn new() -> Self {
        HclCodec
    }
}

impl DocCodec for HclCodec {
    #[tracing::instrument(skip_all, fields(uri = %uri))]
    fn parse(&self, uri: &Url, text: &str) -> Vec<Section> {
        let lines = LineIndex::new(text);
        let tokens: Vec<Token> = tokenize(text)
            .into_iter()
            .filter(|t| t.template_depth == 0)
            .collect();
        let mut collector = SectionCollector::new(uri, text, &lines);

        let mut depth = 0usize;
        let mut open: Option<OpenBlock> = None;
        let mut open_local: Option<usize> = None;
        // open `[` / `(` within the current local's value
        let mut nesting = 0usize;
        let mut prev_end = 0usize;
        let mut line_start = true;
        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];
            if token.is(TokenKind::Ident) {
                let header = match depth {
                    0 => read_header(&tokens, idx),
                    _ if collector.starts_column_zero(token) => read_header(&tokens, idx)
                        .filter(|h| TOP_LEVEL_KEYWORDS.contains(&h.keyword.as_str())),
                    _ => None,
                };
                if let Some(header) = header {
                    if depth > 0 {
                        tracing::debug!(
                            "Recovering from unclosed block before '{}' at byte {}",
                            header.keyword,
                            token.span.start
                        );
                        if let Some(local) = open_local.take() {
                            collector.close(local, prev_end);
                        }
                        if let Some(OpenBlock::Section(section)) = open.take() {
                            collector.close(section, prev_end);
                        }
                        depth = 0;
                        nesting = 0;
                    }
                    open = Some(collector.open_block(&tokens, &header));
                    // resume at the opening brace
                    prev_end = tokens[header.brace_idx - 1].span.end;
                    idx = header.brace_idx;
                    line_start = false;
                    continue;
                }
                if depth == 1
                    && line_start
                    && nesting == 0
                    && open == Some(OpenBlock::Locals)
                    && tokens.get(idx + 1).is_some_and(|t| t.is(TokenKind::Assign))
                {
                    if let Some(local) = open_local.take() {
                        collector.close(local, prev_end);
                    }
                    open_local = collector.add_local(token, &tokens[idx + 1]);
                }
            }
            match token.kind {
                TokenKind::Newline => {
                    if depth == 1 && nesting == 0 {
                        if let Some(local) = open_local.take() {
                            collector.close(local, prev_end);
                        }
                    }
                    line_start = true;
                    idx += 1;
                    continue;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    if depth == 1 && open == Some(OpenBlock::Locals) {
                        // `locals { a = 1 }`: the first attribute may share the header's line
                        prev_end = token.span.end;
                        line_start = true;
                        idx += 1;
                        continue;
                    }
                }
                TokenKind::LBracket | TokenKind::LParen if depth == 1 => nesting += 1,
                TokenKind::RBracket | TokenKind::RParen if depth == 1 => {
                    nesting = nesting.saturating_sub(1)
                }
                TokenKind::RBrace => {
                    if depth == 1 {
                        if let Some(local) = open_local.take() {
                            collector.close(local, prev_end);
                        }
                        if let Some(OpenBlock::Section(section)) = open.take() {
                            collector.close(section, token.span.end);
                        }
                        nesting = 0;
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            prev_end = token.span.end;
            line_start = false;
            idx += 1;
        }

        if let Some(local) = open_local.take() {
            collector.close(local, prev_end);
        }
        if let Some(OpenBlock::Section(section)) = open.take() {
            tracing::debug!("Block {} is not closed", collector.sections[section].id);
            collector.close(section, text.len());
        }
        collector.sections
    }

    fn reference_expressions(&self, text: &str) -> Vec<ReferenceExpression> {
        let lines = LineIndex::new(text);
        let tokens = tokenize(text);
        let mut expressions = Vec::new();
        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];
            let is_root = token.is(TokenKind::Ident)
                && !(idx > 0 && tokens[idx - 1].is(TokenKind::Dot));
            if is_root {
                if let Some((target_id, last)) = traversal_target(&tokens, idx) {
                    expressions.push(ReferenceExpression {
                        target_id,
                        range: lines.range(&(token.span.start..tokens[last].span.end)),
                    });
                    idx = last + 1;
                    continue;
                }
            }
            idx += 1;
        }
        expressions
    }
}

/// Returns the `n`th attribute name of the traversal rooted at `root` (n >= 1).
fn traversal_attr(tokens: &[Token], root: usize, n: usize) -> Option<&Token> {
    let depth = tokens[root].template_depth;
    let dot = tokens.get(root + 2 * n - 1)?;
    let name = tokens.get(root + 2 * n)?;
    (dot.is(TokenKind::Dot)
        && name.is(TokenKind::Ident)
        && dot.template_depth == depth
        && name.template_depth == depth)
        .then_some(name)
}

/// Maps the traversal rooted at `tokens[root]` to the id of the section it addresses and the
/// index of the last token naming that section.
fn traversal_target(tokens: &[Token], root: usize) -> Option<(String, usize)> {
    let root_name = tokens[root].text.as_str();
    if BUILTIN_ROOTS.contains(&root_name) {
        return None;
    }
    match root_name {
        "var" | "local" | "module" => {
            let name = traversal_attr(tokens, root, 1)?;
            Some((format!("{root_name}.{}", name.text), root + 2))
        }
        "data" => {
            let kind = traversal_attr(tokens, root, 1)?;
            let name = traversal_attr(tokens, root, 2)?;
            Some((format!("data.{}.{}", kind.text, name.text), root + 4))
        }
        kind if RESOURCE_TYPE.is_match(kind) => {
            let name = traversal_attr(tokens, root, 1)?;
            Some((format!("{kind}.{}", name.text), root + 2))
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Header {
    keyword: String,
    keyword_idx: usize,
    labels: Vec<usize>,
    brace_idx: usize,
}

/// Reads `keyword label* {` starting at `tokens[idx]`.
fn read_header(tokens: &[Token], idx: usize) -> Option<Header> {
    let mut labels = Vec::new();
    let mut cursor = idx + 1;
    while let Some(token) = tokens.get(cursor) {
        match token.kind {
            TokenKind::Str | TokenKind::Ident => labels.push(cursor),
            TokenKind::LBrace => {
                return Some(Header {
                    keyword: tokens[idx].text.clone(),
                    keyword_idx: idx,
                    labels,
                    brace_idx: cursor,
                })
            }
            _ => return None,
        }
        cursor += 1;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    /// A block emitted as the section at this index
    Section(usize),
    Locals,
    /// Any other block (unknown keyword, malformed header, duplicate id)
    Other,
}

struct SectionCollector<'a> {
    uri: &'a Url,
    text: &'a str,
    lines: &'a LineIndex<'a>,
    sections: Vec<Section>,
    /// Byte spans of section bodies, converted to positions on close.
    starts: Vec<usize>,
    seen: HashSet<String>,
}

impl<'a> SectionCollector<'a> {
    fn new(uri: &'a Url, text: &'a str, lines: &'a LineIndex<'a>) -> Self {
        SectionCollector {
            uri,
            text,
            lines,
            sections: Vec::new(),
            starts: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn starts_column_zero(&self, token: &Token) -> bool {
        token.span.start == 0 || self.text.as_bytes()[token.span.start - 1] == b'\n'
    }

    fn open_block(&mut self, tokens: &[Token], header: &Header) -> OpenBlock {
        if header.keyword == "locals" && header.labels.is_empty() {
            return OpenBlock::Locals;
        }
        let Some(section_type) = SectionType::from_keyword(&header.keyword) else {
            return OpenBlock::Other;
        };
        let labels: Vec<&str> = header
            .labels
            .iter()
            .map(|idx| tokens[*idx].text.as_str())
            .collect();
        let Some(id) = section_type.section_id(&labels) else {
            tracing::debug!(
                "Skipping {} block with {} label(s), expected {}",
                header.keyword,
                labels.len(),
                section_type.label_count()
            );
            return OpenBlock::Other;
        };
        let start = tokens[header.keyword_idx].span.start;
        let header_end = tokens[header.brace_idx].span.end;
        let type_label = match section_type {
            SectionType::Resource | SectionType::Data => labels.first().map(|l| l.to_string()),
            _ => None,
        };
        let name = labels.last().map(|l| l.to_string()).unwrap_or_default();
        match self.push(id, section_type, name, type_label, start..header_end) {
            Some(idx) => OpenBlock::Section(idx),
            None => OpenBlock::Other,
        }
    }

    fn add_local(&mut self, name: &Token, assign: &Token) -> Option<usize> {
        let id = SectionType::Local.section_id(&[name.text.as_str()])?;
        self.push(
            id,
            SectionType::Local,
            name.text.clone(),
            None,
            name.span.start..assign.span.end,
        )
    }

    fn push(
        &mut self,
        id: String,
        section_type: SectionType,
        name: String,
        type_label: Option<String>,
        header: std::ops::Range<usize>,
    ) -> Option<usize> {
        if !self.seen.insert(id.clone()) {
            tracing::debug!("Duplicate declaration of {id} ignored");
            return None;
        }
        let header_range = self.lines.range(&header);
        self.sections.push(Section {
            id,
            section_type,
            name,
            type_label,
            location: Location::new(self.uri.clone(), header_range),
            body: Range::new(header_range.start, self.lines.position(self.text.len())),
        });
        self.starts.push(header.start);
        Some(self.sections.len() - 1)
    }

    fn close(&mut self, idx: usize, end: usize) {
        let end = end.max(self.starts[idx]);
        self.sections[idx].body.end = self.lines.position(end);
    }
}
