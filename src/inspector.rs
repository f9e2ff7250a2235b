//! Tools for inspecting the physical structure of encoded envelopes.
//! Useful for debugging surrogates, taxonomy rewriting and wire size issues.

use std::fmt;
use std::path::Path;

use crate::context::Context;
use crate::error::Result;
use crate::format::EnvelopeHeader;
use crate::message::{Field, FieldValue};

/// A structural report of one encoded envelope.
#[derive(Debug)]
pub struct WireReport {
    /// Schema version from the header.
    pub version: u8,
    /// Taxonomy id from the header.
    pub taxonomy_id: i16,
    /// Total envelope size in bytes, header included.
    pub size: usize,
    /// The field tree, one entry per top-level field.
    pub tree: Vec<FieldInfo>,
}

/// Metadata for a single field in the tree.
#[derive(Debug)]
pub struct FieldInfo {
    /// Field name, if present after decoding.
    pub name: Option<String>,
    /// Field ordinal, if present after decoding.
    pub ordinal: Option<i16>,
    /// Wire type id.
    pub type_id: u8,
    /// Short rendering of the value ("\"abc\"", "42", "17 bytes", "3 fields").
    pub summary: String,
    /// Nested fields, for sub-message values.
    pub children: Vec<FieldInfo>,
}

/// The envelope inspector tool.
#[derive(Debug)]
pub struct WireInspector;

impl WireInspector {
    /// Analyzes an encoded envelope and returns a structural report.
    pub fn inspect_bytes(bytes: &[u8], context: &Context) -> Result<WireReport> {
        let header = EnvelopeHeader::from_bytes(bytes)?;
        let envelope = context.deserialize_bytes(bytes)?;
        Ok(WireReport {
            version: envelope.version,
            taxonomy_id: envelope.taxonomy_id,
            size: header.size as usize,
            tree: envelope.message.fields().iter().map(Self::inspect_field).collect(),
        })
    }

    /// Analyzes an envelope file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P, context: &Context) -> Result<WireReport> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len() as usize;
        let envelope = context.load(path)?;
        Ok(WireReport {
            version: envelope.version,
            taxonomy_id: envelope.taxonomy_id,
            size,
            tree: envelope.message.fields().iter().map(Self::inspect_field).collect(),
        })
    }

    fn inspect_field(field: &Field) -> FieldInfo {
        let summary = match field.value() {
            FieldValue::Boolean(v) => v.to_string(),
            FieldValue::Byte(v) => v.to_string(),
            FieldValue::Short(v) => v.to_string(),
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Long(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Double(v) => v.to_string(),
            FieldValue::Str(s) => format!("{s:?}"),
            FieldValue::Bytes(b) => format!("{} bytes", b.len()),
            FieldValue::Message(m) => format!("{} fields", m.len()),
            FieldValue::Unknown { bytes, .. } => format!("{} opaque bytes", bytes.len()),
        };
        let children = match field.value() {
            FieldValue::Message(m) => m.fields().iter().map(Self::inspect_field).collect(),
            _ => Vec::new(),
        };
        FieldInfo {
            name: field.name().map(str::to_owned),
            ordinal: field.ordinal(),
            type_id: field.value().type_id(),
            summary,
            children,
        }
    }
}

impl fmt::Display for WireReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== TAGWIRE INSPECTOR REPORT ===")?;
        writeln!(f, "Version:      {}", self.version)?;
        writeln!(f, "Taxonomy Id:  {}", self.taxonomy_id)?;
        writeln!(f, "Size:         {} bytes", self.size)?;
        writeln!(f, "\n[FIELD LAYOUT]")?;
        for (i, info) in self.tree.iter().enumerate() {
            info.fmt_recursive(f, "", i == self.tree.len() - 1)?;
        }
        Ok(())
    }
}

impl FieldInfo {
    fn fmt_recursive(
        &self,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };

        let key = match (self.name.as_deref(), self.ordinal) {
            (Some(n), Some(o)) => format!("{n}#{o}"),
            (Some(n), None) => n.to_owned(),
            (None, Some(o)) => format!("#{o}"),
            (None, None) => "<anonymous>".to_owned(),
        };

        writeln!(
            f,
            "{}{}{} [type {}] {}",
            prefix, connector, key, self.type_id, self.summary
        )?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i == self.children.len() - 1;
            child.fmt_recursive(f, &format!("{}{}", prefix, child_prefix), is_last_child)?;
        }
        Ok(())
    }
}
