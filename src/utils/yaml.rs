use crate::error::{ChartBumpError, Result};
use std::collections::HashMap;
use std::ops::Range;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// A YAML node that remembers where it starts in the source text.
#[derive(Debug, Clone)]
pub enum MarkedNode {
    Scalar {
        value: String,
        style: TScalarStyle,
        mark: Marker,
    },
    /// `*name`; `target` holds the anchored text when the anchor is a scalar.
    Alias {
        target: Option<String>,
        mark: Marker,
    },
    Sequence {
        items: Vec<MarkedNode>,
        mark: Marker,
    },
    Mapping {
        entries: Vec<(MarkedNode, MarkedNode)>,
        mark: Marker,
    },
}

impl MarkedNode {
    pub fn mark(&self) -> Marker {
        match self {
            MarkedNode::Scalar { mark, .. }
            | MarkedNode::Alias { mark, .. }
            | MarkedNode::Sequence { mark, .. }
            | MarkedNode::Mapping { mark, .. } => *mark,
        }
    }

    /// Text of a scalar (or of the scalar an alias points at).
    pub fn scalar_text(&self) -> Option<&str> {
        match self {
            MarkedNode::Scalar { value, .. } => Some(value),
            MarkedNode::Alias { target, .. } => target.as_deref(),
            _ => None,
        }
    }

    /// Plain `~`/`null` or an empty value.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            MarkedNode::Scalar { value, style: TScalarStyle::Plain, .. }
                if matches!(value.as_str(), "~" | "null" | "Null" | "NULL")
        )
    }

    /// First `key: value` pair of a mapping whose key is the scalar `key`.
    pub fn get(&self, key: &str) -> Option<(&MarkedNode, &MarkedNode)> {
        let MarkedNode::Mapping { entries, .. } = self else {
            return None;
        };
        entries
            .iter()
            .find(|(k, _)| matches!(k, MarkedNode::Scalar { value, .. } if value == key))
            .map(|(k, v)| (k, v))
    }
}

enum Pending {
    Sequence(Marker, Vec<MarkedNode>),
    Mapping(Marker, Vec<MarkedNode>),
}

impl Pending {
    fn finish(self) -> MarkedNode {
        match self {
            Pending::Sequence(mark, items) => MarkedNode::Sequence { items, mark },
            Pending::Mapping(mark, children) => {
                let mut entries = Vec::with_capacity(children.len() / 2);
                let mut children = children.into_iter();
                while let (Some(key), Some(value)) = (children.next(), children.next()) {
                    entries.push((key, value));
                }
                MarkedNode::Mapping { entries, mark }
            }
        }
    }
}

#[derive(Default)]
struct TreeBuilder {
    documents: Vec<MarkedNode>,
    stack: Vec<Pending>,
    anchors: HashMap<usize, String>,
}

impl TreeBuilder {
    fn attach(&mut self, node: MarkedNode) {
        match self.stack.last_mut() {
            Some(Pending::Sequence(_, children) | Pending::Mapping(_, children)) => {
                children.push(node)
            }
            None => self.documents.push(node),
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        match event {
            Event::Scalar(value, style, anchor, _) => {
                if anchor > 0 {
                    self.anchors.insert(anchor, value.clone());
                }
                self.attach(MarkedNode::Scalar { value, style, mark });
            }
            Event::Alias(anchor) => {
                let target = self.anchors.get(&anchor).cloned();
                self.attach(MarkedNode::Alias { target, mark });
            }
            Event::SequenceStart(..) => self.stack.push(Pending::Sequence(mark, Vec::new())),
            Event::MappingStart(..) => self.stack.push(Pending::Mapping(mark, Vec::new())),
            Event::SequenceEnd | Event::MappingEnd => {
                if let Some(pending) = self.stack.pop() {
                    let node = pending.finish();
                    self.attach(node);
                }
            }
            _ => {}
        }
    }
}

/// A single replacement in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// The original document text, addressed by parser markers.
pub struct SourceText<'a> {
    text: &'a str,
    // Markers count characters; this maps a character index to its byte offset.
    offsets: Vec<usize>,
}

impl<'a> SourceText<'a> {
    pub fn new(text: &'a str) -> Self {
        let offsets = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, offsets }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn byte_at(&self, mark: Marker) -> Result<usize> {
        self.offsets.get(mark.index()).copied().ok_or_else(|| {
            ChartBumpError::Descriptor(format!("position {} is outside the document", mark.index()))
        })
    }

    /// Byte range of a scalar or alias token as written, quotes included.
    pub fn span_of(&self, node: &MarkedNode) -> Result<Range<usize>> {
        let start = self.byte_at(node.mark())?;
        let rest = &self.text[start..];

        let len = match node {
            MarkedNode::Scalar {
                value,
                style: TScalarStyle::Plain,
                ..
            } => {
                if value.is_empty() || !rest.starts_with(value.as_str()) {
                    return Err(ChartBumpError::Descriptor(format!(
                        "plain value '{value}' does not sit on one line at line {}",
                        node.mark().line()
                    )));
                }
                value.len()
            }
            MarkedNode::Scalar {
                style: TScalarStyle::SingleQuoted,
                ..
            } => quoted_len(rest, b'\'')?,
            MarkedNode::Scalar {
                style: TScalarStyle::DoubleQuoted,
                ..
            } => quoted_len(rest, b'"')?,
            MarkedNode::Alias { .. } if rest.starts_with('*') => rest[1..]
                .find(|c: char| c.is_whitespace() || ",[]{}".contains(c))
                .map_or(rest.len(), |end| end + 1),
            _ => {
                return Err(ChartBumpError::Descriptor(format!(
                    "value at line {} cannot be rewritten in place",
                    node.mark().line()
                )));
            }
        };

        Ok(start..start + len)
    }

    /// Applies non-overlapping edits, leaving every other byte untouched.
    pub fn apply(&self, mut edits: Vec<TextEdit>) -> String {
        edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
        let mut out = self.text.to_string();
        for edit in edits {
            out.replace_range(edit.range, &edit.replacement);
        }
        out
    }
}

fn quoted_len(rest: &str, quote: u8) -> Result<usize> {
    let bytes = rest.as_bytes();
    if bytes.first() != Some(&quote) {
        return Err(ChartBumpError::Descriptor(
            "quoted value does not start with its quote".to_string(),
        ));
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 2,
            b if b == quote => {
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                } else {
                    return Ok(i + 1);
                }
            }
            _ => i += 1,
        }
    }

    Err(ChartBumpError::Descriptor(
        "unterminated quoted value".to_string(),
    ))
}

/// Helpers for inspecting chart and helmfile YAML structures.
pub struct YamlUtils;

impl YamlUtils {
    /// Parses every document of a (possibly `---` separated) stream.
    pub fn parse_documents(content: &str) -> Result<Vec<MarkedNode>> {
        let mut builder = TreeBuilder::default();
        Parser::new(content.chars()).load(&mut builder, true)?;
        Ok(builder.documents)
    }

    /// The top-level sequence stored under `key` (`dependencies` or `releases`).
    pub fn record_list<'n>(document: &'n MarkedNode, key: &str) -> Option<&'n [MarkedNode]> {
        match document.get(key)?.1 {
            MarkedNode::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Renders `target` for the slot an existing value occupied.
    ///
    /// Quoted values keep their quote style. Plain values stay plain unless the
    /// target would read back as something other than the same string.
    pub fn render_scalar(style: Option<TScalarStyle>, original: &str, target: &str) -> String {
        match style {
            Some(TScalarStyle::SingleQuoted) => format!("'{}'", target.replace('\'', "''")),
            Some(TScalarStyle::DoubleQuoted) => double_quoted(target),
            _ => {
                let keeps_type = looks_numeric(original) || !looks_numeric(target);
                if is_plain_safe(target) && keeps_type {
                    target.to_string()
                } else {
                    double_quoted(target)
                }
            }
        }
    }
}

fn double_quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn looks_numeric(value: &str) -> bool {
    !value.is_empty() && value.parse::<f64>().is_ok()
}

fn is_plain_safe(value: &str) -> bool {
    const RESERVED: &[&str] = &[
        "~", "null", "Null", "NULL", "true", "True", "TRUE", "false", "False", "FALSE", "yes",
        "Yes", "YES", "no", "No", "NO", "on", "On", "ON", "off", "Off", "OFF",
    ];

    let Some(first) = value.chars().next() else {
        return false;
    };

    value.trim() == value
        && !value.contains(['\n', '\r', '\t'])
        && !"-?:,[]{}#&*!|>'\"%@`".contains(first)
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
        && !RESERVED.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_document(text: &str) -> MarkedNode {
        YamlUtils::parse_documents(text).unwrap().remove(0)
    }

    #[test]
    fn finds_dependency_sequence() {
        let doc = first_document("dependencies:\n  - name: db\n    version: 1.0.0\n");
        assert_eq!(YamlUtils::record_list(&doc, "dependencies").unwrap().len(), 1);
    }

    #[test]
    fn missing_null_and_mapping_lists_are_absent() {
        let doc = first_document("name: app\n");
        assert!(YamlUtils::record_list(&doc, "dependencies").is_none());

        let doc = first_document("dependencies:\n");
        assert!(YamlUtils::record_list(&doc, "dependencies").is_none());

        let doc = first_document("dependencies:\n  db: 1.0.0\n");
        assert!(YamlUtils::record_list(&doc, "dependencies").is_none());
    }

    #[test]
    fn parses_every_document_of_a_stream() {
        let docs = YamlUtils::parse_documents("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get("b").unwrap().1.scalar_text(), Some("2"));
    }

    #[test]
    fn alias_resolves_to_anchored_scalar() {
        let doc = first_document("base: &v 1.0.0\nother: *v\n");
        let (_, alias) = doc.get("other").unwrap();
        assert!(matches!(alias, MarkedNode::Alias { .. }));
        assert_eq!(alias.scalar_text(), Some("1.0.0"));
    }

    #[test]
    fn spans_cover_the_written_token() {
        let text = "a: 1.0.0 # pinned\nb: 'it''s'\nc: \"x\\\"y\"\nd: *anchor\n";
        // Anchor must exist for the stream to parse.
        let text = format!("z: &anchor 0\n{text}");
        let source = SourceText::new(&text);
        let doc = first_document(&text);

        for (key, expected) in [
            ("a", "1.0.0"),
            ("b", "'it''s'"),
            ("c", "\"x\\\"y\""),
            ("d", "*anchor"),
        ] {
            let span = source.span_of(doc.get(key).unwrap().1).unwrap();
            assert_eq!(&text[span], expected, "span of {key}");
        }
    }

    #[test]
    fn spans_account_for_multibyte_text() {
        let text = "description: überprüft\nversion: 1.0.0\n";
        let source = SourceText::new(text);
        let doc = first_document(text);
        let span = source.span_of(doc.get("version").unwrap().1).unwrap();
        assert_eq!(&text[span], "1.0.0");
    }

    #[test]
    fn block_scalars_cannot_be_spliced() {
        let text = "version: |\n  1.0.0\n";
        let source = SourceText::new(text);
        let doc = first_document(text);
        assert!(source.span_of(doc.get("version").unwrap().1).is_err());
    }

    #[test]
    fn apply_replaces_only_edited_ranges() {
        let source = SourceText::new("a: 1\nb: 2\n");
        let out = source.apply(vec![
            TextEdit {
                range: 3..4,
                replacement: "10".to_string(),
            },
            TextEdit {
                range: 8..9,
                replacement: "20".to_string(),
            },
        ]);
        assert_eq!(out, "a: 10\nb: 20\n");
    }

    #[test]
    fn render_keeps_quote_style() {
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::SingleQuoted), "1.0.0", "1.1.0"),
            "'1.1.0'"
        );
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::DoubleQuoted), "1.0.0", "1.1.0"),
            "\"1.1.0\""
        );
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::Plain), "1.0.0", "1.1.0"),
            "1.1.0"
        );
    }

    #[test]
    fn render_quotes_plain_values_that_would_change_type() {
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::Plain), "1.0.0", "1.10"),
            "\"1.10\""
        );
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::Plain), "2", "3"),
            "3"
        );
        assert_eq!(
            YamlUtils::render_scalar(Some(TScalarStyle::Plain), "1.0.0", "true"),
            "\"true\""
        );
    }
}
