// src/packages/control.rs

//! Binary package control metadata
//!
//! Parses the single paragraph of a `DEBIAN/control` file, edits the fields
//! this tool cares about (`Description`, `Version`, `Depends`) and writes the
//! paragraph back out.
//!
//! Field values are stored in logical form: the text after `Name:` with
//! continuation lines joined by `\n` and their single leading space removed.
//! Serialization indents every continuation line by one space again, so
//! `parse(serialize(p)) == p`.

use crate::error::{Error, Result};
use crate::provenance::{self, ProvenanceRecord};
use regex::{Captures, Regex};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Matches a version constraint such as `(= 1.0)` or `(>=2.3-1)`
static VERSION_CONSTRAINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\s*)(<<|<=|>=|>>|=|<|>)(\s*)([^\s)]+)(\s*)\)").unwrap());

/// A single `Name: value` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical value, continuation lines joined by `\n`
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Write the field in control file syntax
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut lines = self.value.split('\n');
        let first = lines.next().unwrap_or("");
        if first.is_empty() {
            writeln!(writer, "{}:", self.name)?;
        } else {
            writeln!(writer, "{}: {}", self.name, first)?;
        }
        for line in lines {
            writeln!(writer, " {}", line)?;
        }
        Ok(())
    }
}

/// An ordered control paragraph
///
/// Field lookup is case insensitive, setting preserves the given case and
/// keeps the position of an existing field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    /// Parse control file text containing exactly one paragraph
    pub fn parse(text: &str) -> Result<Self> {
        let mut paragraph = Self::default();
        let mut current: Option<(String, Vec<String>)> = None;
        let mut finished = false;

        for (lineno, line) in text.lines().enumerate() {
            let lineno = lineno + 1;

            if line.trim().is_empty() {
                if let Some((name, lines)) = current.take() {
                    paragraph.push_parsed(name, lines)?;
                }
                finished = !paragraph.is_empty();
                continue;
            }

            if line.starts_with('#') {
                continue;
            }

            if finished {
                return Err(Error::MalformedControl(format!(
                    "line {}: more than one paragraph",
                    lineno
                )));
            }

            if line.starts_with([' ', '\t']) {
                match current.as_mut() {
                    Some((_, lines)) => lines.push(line[1..].to_string()),
                    None => {
                        return Err(Error::MalformedControl(format!(
                            "line {}: continuation line without a field",
                            lineno
                        )));
                    }
                }
                continue;
            }

            if let Some((name, lines)) = current.take() {
                paragraph.push_parsed(name, lines)?;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| {
                Error::MalformedControl(format!("line {}: expected 'Field: value'", lineno))
            })?;
            let name = name.trim_end();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::MalformedControl(format!(
                    "line {}: invalid field name {:?}",
                    lineno, name
                )));
            }
            current = Some((name.to_string(), vec![value.trim().to_string()]));
        }

        if let Some((name, lines)) = current.take() {
            paragraph.push_parsed(name, lines)?;
        }

        if paragraph.is_empty() {
            return Err(Error::MalformedControl("no fields found".to_string()));
        }

        Ok(paragraph)
    }

    /// Parse a control file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read(path)?;
        let text = String::from_utf8(text).map_err(|_| {
            Error::MalformedControl(format!("{} is not valid UTF-8", path.display()))
        })?;
        Self::parse(&text)
    }

    fn push_parsed(&mut self, name: String, lines: Vec<String>) -> Result<()> {
        if self.has_field(&name) {
            return Err(Error::MalformedControl(format!("duplicate field {}", name)));
        }
        self.fields.push(ControlField::new(name, lines.join("\n")));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in file order
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

    pub fn field(&self, name: &str) -> Option<&ControlField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Set a field, replacing an existing one in place or appending
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name.eq_ignore_ascii_case(name)) {
            Some(field) => field.value = value,
            None => self.fields.push(ControlField::new(name, value)),
        }
    }

    /// Write the paragraph in control file syntax
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }
        Ok(())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Serialize to a file, replacing its contents
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

impl fmt::Display for ControlParagraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Replace the version in every constraint pinned to exactly `old`
///
/// Comparison is plain string equality; operators and spacing are kept.
pub fn rewrite_depends(depends: &str, old: &str, new: &str) -> String {
    VERSION_CONSTRAINT
        .replace_all(depends, |caps: &Captures| {
            if &caps[4] == old {
                format!("({}{}{}{}{})", &caps[1], &caps[2], &caps[3], new, &caps[5])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Embed provenance into a paragraph and optionally bump its version
///
/// The original description is kept verbatim as the prefix of the new one,
/// with any block from an earlier run removed first. When `new_version`
/// differs from the current `Version`, `Version` and matching `Depends`
/// constraints are rewritten and the original `Depends` is recorded in the
/// block.
pub fn mutate(
    mut paragraph: ControlParagraph,
    provenance: &ProvenanceRecord,
    new_version: Option<&str>,
    tool_name: &str,
) -> ControlParagraph {
    let mut record = provenance.clone();
    record.depends = None;

    let old_version = paragraph.field_str("Version").map(str::to_string);
    if let (Some(new), Some(old)) = (new_version, old_version.as_deref())
        && new != old
    {
        debug!("Rewriting version {} -> {}", old, new);

        if let Some(depends) = paragraph.field_str("Depends").map(str::to_string) {
            let rewritten = rewrite_depends(&depends, old, new);
            record.depends = Some(depends);
            paragraph.set_field("Depends", rewritten);
        }
        paragraph.set_field("Version", new);
    }

    let block = record.to_block(tool_name);
    let description = match paragraph.field_str("Description") {
        Some(existing) => {
            let base = provenance::strip_block(existing).trim_end_matches('\n');
            if base.is_empty() {
                block
            } else {
                format!("{}\n{}", base, block)
            }
        }
        None => block,
    };
    paragraph.set_field("Description", description);

    paragraph
}
