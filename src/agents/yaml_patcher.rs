use crate::error::{ChartBumpError, Result};
use crate::utils::yaml::{MarkedNode, SourceText, TextEdit, YamlUtils};
use tracing::debug;

/// Outcome of patching one descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub updated: bool,
    pub old_version: Option<String>,
    pub new_content: Option<String>,
    /// Why the document was left alone when it could not be read or edited.
    pub failure: Option<String>,
}

impl UpdateResult {
    pub fn unchanged() -> Self {
        Self::default()
    }

    fn changed(old_version: Option<String>, new_content: String) -> Self {
        Self {
            updated: true,
            old_version,
            new_content: Some(new_content),
            failure: None,
        }
    }

    fn failed(reason: String) -> Self {
        Self {
            failure: Some(reason),
            ..Self::default()
        }
    }
}

/// Which list of versioned records a descriptor carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Chart,
    Helmfile,
}

impl DescriptorKind {
    fn list_key(self) -> &'static str {
        match self {
            DescriptorKind::Chart => "dependencies",
            DescriptorKind::Helmfile => "releases",
        }
    }
}

/// A record whose name matched, with what it currently pins.
struct MatchedRecord<'n> {
    version: Option<String>,
    slot: VersionSlot<'n>,
}

enum VersionSlot<'n> {
    Present {
        key: &'n MarkedNode,
        value: &'n MarkedNode,
    },
    Missing {
        record: &'n MarkedNode,
        name_key: &'n MarkedNode,
        name_value: &'n MarkedNode,
    },
}

/// YamlPatcher rewrites the version of named records inside descriptor documents.
///
/// Only the text of the matched `version` values changes; comments, anchors,
/// quoting and indentation elsewhere are kept byte for byte. Patching never
/// fails: problems come back as an unchanged result carrying `failure`.
pub struct YamlPatcher;

impl YamlPatcher {
    /// Bump every `dependencies` entry called `dependency_name` in a `Chart.yaml` document.
    pub fn patch_chart(content: &str, dependency_name: &str, target_version: &str) -> UpdateResult {
        Self::patch(DescriptorKind::Chart, content, dependency_name, target_version)
    }

    /// Bump every `releases` entry called `release_name` in a `helmfile.yaml` document.
    pub fn patch_helmfile(content: &str, release_name: &str, target_version: &str) -> UpdateResult {
        Self::patch(DescriptorKind::Helmfile, content, release_name, target_version)
    }

    fn patch(kind: DescriptorKind, content: &str, name: &str, target_version: &str) -> UpdateResult {
        Self::try_patch(kind, content, name, target_version).unwrap_or_else(|e| {
            debug!(error = %e, "descriptor left unchanged");
            UpdateResult::failed(e.to_string())
        })
    }

    fn try_patch(
        kind: DescriptorKind,
        content: &str,
        name: &str,
        target_version: &str,
    ) -> Result<UpdateResult> {
        let documents = YamlUtils::parse_documents(content)?;
        let source = SourceText::new(content);

        let mut edits = Vec::new();
        let mut old_version = None;

        for document in &documents {
            let Some(records) = YamlUtils::record_list(document, kind.list_key()) else {
                continue;
            };

            for record in records {
                let Some(matched) = Self::match_record(record, name) else {
                    continue;
                };
                if matched.version.as_deref() == Some(target_version) {
                    continue;
                }

                edits.push(Self::version_edit(&source, &matched.slot, target_version)?);
                old_version = matched.version;
            }
        }

        // Untouched documents are returned as-is.
        if edits.is_empty() {
            return Ok(UpdateResult::unchanged());
        }

        debug!(name, changed = edits.len(), "patched descriptor records");
        Ok(UpdateResult::changed(old_version, source.apply(edits)))
    }

    /// A mapping record whose scalar `name` equals `name`.
    fn match_record<'n>(record: &'n MarkedNode, name: &str) -> Option<MatchedRecord<'n>> {
        let (name_key, name_value) = record.get("name")?;
        if name_value.scalar_text()? != name {
            return None;
        }

        let matched = match record.get("version") {
            Some((key, value)) => MatchedRecord {
                version: (!value.is_null())
                    .then(|| value.scalar_text().map(str::to_string))
                    .flatten(),
                slot: VersionSlot::Present { key, value },
            },
            None => MatchedRecord {
                version: None,
                slot: VersionSlot::Missing {
                    record,
                    name_key,
                    name_value,
                },
            },
        };
        Some(matched)
    }

    fn version_edit(source: &SourceText<'_>, slot: &VersionSlot<'_>, target: &str) -> Result<TextEdit> {
        match slot {
            VersionSlot::Present { key, value } => match source.span_of(value) {
                Ok(range) => {
                    let style = match value {
                        MarkedNode::Scalar { style, .. } => Some(*style),
                        _ => None,
                    };
                    let original = value.scalar_text().unwrap_or_default();
                    Ok(TextEdit {
                        range,
                        replacement: YamlUtils::render_scalar(style, original, target),
                    })
                }
                // `version:` with nothing after it.
                Err(_) if value.is_null() => Self::fill_empty_value(source, key, target),
                Err(e) => Err(e),
            },
            VersionSlot::Missing {
                record,
                name_key,
                name_value,
            } => Self::insert_version(source, record, name_key, name_value, target),
        }
    }

    fn fill_empty_value(source: &SourceText<'_>, key: &MarkedNode, target: &str) -> Result<TextEdit> {
        let key_end = source.span_of(key)?.end;
        let colon = source.text()[key_end..]
            .find(':')
            .map(|offset| key_end + offset + 1)
            .ok_or_else(|| ChartBumpError::Descriptor("version key has no ':'".to_string()))?;

        Ok(TextEdit {
            range: colon..colon,
            replacement: format!(" {}", YamlUtils::render_scalar(None, "", target)),
        })
    }

    /// Adds a `version` line under the record's `name` line, at the same indentation.
    fn insert_version(
        source: &SourceText<'_>,
        record: &MarkedNode,
        name_key: &MarkedNode,
        name_value: &MarkedNode,
        target: &str,
    ) -> Result<TextEdit> {
        let text = source.text();
        if text[source.byte_at(record.mark())?..].starts_with('{') {
            return Err(ChartBumpError::Descriptor(format!(
                "flow-style record at line {} has no version to replace",
                record.mark().line()
            )));
        }

        let name_end = source.span_of(name_value)?.end;
        let line_end = text[name_end..]
            .find('\n')
            .map_or(text.len(), |offset| name_end + offset);
        let (at, newline) = if line_end > 0 && text.as_bytes()[line_end - 1] == b'\r' {
            (line_end - 1, "\r\n")
        } else {
            (line_end, "\n")
        };

        Ok(TextEdit {
            range: at..at,
            replacement: format!(
                "{newline}{}version: {}",
                " ".repeat(name_key.mark().col()),
                YamlUtils::render_scalar(None, "", target)
            ),
        })
    }

    /// Maps a descriptor basename to its kind; other files are not descriptors.
    pub fn kind_for_file(file_name: &str) -> Option<DescriptorKind> {
        if file_name.starts_with("Chart") {
            Some(DescriptorKind::Chart)
        } else if file_name.starts_with("helmfile") {
            Some(DescriptorKind::Helmfile)
        } else {
            None
        }
    }
}
