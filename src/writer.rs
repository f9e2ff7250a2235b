//! The streaming envelope encoder.
//!
//! [`WireWriter`] assembles one envelope. Fields are encoded the moment they
//! are added; sub-messages are buffered bottom-up so their encoded size is
//! known by the time the enclosing field's size bytes are written, and the
//! total envelope size lands in the header when [`WireWriter::finish`] hands
//! the bytes to the sink.
//!
//! Two clients drive this type:
//!
//! - the tree encoder ([`WireWriter::write_message`]) walks an in-memory
//!   [`Message`] and adds its fields recursively;
//! - the object-graph serializer opens and closes nested sub-messages with
//!   [`WireWriter::start_message`] / [`WireWriter::end_message`] while
//!   surrogates stream fields into the current one.
//!
//! When a taxonomy is bound, every emitted field is rewritten on the way out:
//! a name-only field whose name the taxonomy maps is emitted as its ordinal,
//! and a field carrying both keys drops the name when the taxonomy agrees
//! with its ordinal. A conflicting mapping leaves the field untouched.

use std::io::Write;

use crate::dictionary::TypeDictionary;
use crate::error::{Result, TagwireError};
use crate::format::{type_ids, EnvelopeHeader, FieldPrefix, ENVELOPE_HEADER_SIZE};
use crate::message::{FieldValue, Message};
use crate::mutf8;
use crate::taxonomy::Taxonomy;

/// Streaming encoder for a single envelope.
#[derive(Debug)]
pub struct WireWriter<'a> {
    dict: &'a TypeDictionary,
    taxonomy: Option<&'a Taxonomy>,
    version: u8,
    taxonomy_id: i16,
    body: Vec<u8>,
    stack: Vec<PendingMessage>,
}

#[derive(Debug)]
struct PendingMessage {
    name: Option<String>,
    ordinal: Option<i16>,
    buf: Vec<u8>,
}

impl<'a> WireWriter<'a> {
    /// Creates a writer for one envelope.
    ///
    /// `taxonomy` must be the taxonomy resolved for `taxonomy_id` (or `None`);
    /// the writer does not consult a resolver itself.
    pub fn new(
        dict: &'a TypeDictionary,
        taxonomy: Option<&'a Taxonomy>,
        taxonomy_id: i16,
        version: u8,
    ) -> Self {
        Self {
            dict,
            taxonomy,
            version,
            taxonomy_id,
            body: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Adds one field to the innermost open sub-message (or the envelope body).
    pub fn add_field(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        value: &FieldValue,
    ) -> Result<()> {
        let dict = self.dict;
        let taxonomy = self.taxonomy;
        let buf = match self.stack.last_mut() {
            Some(top) => &mut top.buf,
            None => &mut self.body,
        };
        encode_field_into(buf, name, ordinal, value, dict, taxonomy)
    }

    /// Opens a nested sub-message; subsequent fields land inside it.
    pub fn start_message(&mut self, name: Option<&str>, ordinal: Option<i16>) {
        self.stack.push(PendingMessage {
            name: name.map(str::to_owned),
            ordinal,
            buf: Vec::new(),
        });
    }

    /// Closes the innermost sub-message and emits it as a field of its parent.
    pub fn end_message(&mut self) -> Result<()> {
        let pending = self.stack.pop().ok_or_else(|| {
            TagwireError::Internal("end_message without a matching start_message".into())
        })?;
        let taxonomy = self.taxonomy;
        let buf = match self.stack.last_mut() {
            Some(top) => &mut top.buf,
            None => &mut self.body,
        };
        emit_field(
            buf,
            pending.name.as_deref(),
            pending.ordinal,
            type_ids::MESSAGE,
            false,
            &pending.buf,
            taxonomy,
        )
    }

    /// Adds every field of a materialized message, recursing into sub-messages.
    pub fn write_message(&mut self, msg: &Message) -> Result<()> {
        for field in msg.fields() {
            self.add_field(field.name(), field.ordinal(), field.value())?;
        }
        Ok(())
    }

    /// Writes the envelope header and body to the sink.
    ///
    /// Returns the total number of bytes written, which equals the size field
    /// in the emitted header.
    pub fn finish(self, sink: &mut dyn Write) -> Result<usize> {
        if !self.stack.is_empty() {
            return Err(TagwireError::Internal(
                "finish with an unclosed sub-message".into(),
            ));
        }
        let total = ENVELOPE_HEADER_SIZE + self.body.len();
        let size = i32::try_from(total).map_err(|_| {
            TagwireError::MalformedEnvelope(format!(
                "envelope size {total} exceeds the 32-bit size field"
            ))
        })?;
        let header = EnvelopeHeader::new(self.version, self.taxonomy_id, size);
        sink.write_all(&header.to_bytes())?;
        sink.write_all(&self.body)?;
        Ok(total)
    }
}

/// Encodes every field of `msg` into `out`, recursing into sub-messages.
pub(crate) fn encode_message_into(
    out: &mut Vec<u8>,
    msg: &Message,
    dict: &TypeDictionary,
    taxonomy: Option<&Taxonomy>,
) -> Result<()> {
    for field in msg.fields() {
        encode_field_into(out, field.name(), field.ordinal(), field.value(), dict, taxonomy)?;
    }
    Ok(())
}

/// Encodes one field record (prefix, type id, keys, size, value) into `out`.
pub(crate) fn encode_field_into(
    out: &mut Vec<u8>,
    name: Option<&str>,
    ordinal: Option<i16>,
    value: &FieldValue,
    dict: &TypeDictionary,
    taxonomy: Option<&Taxonomy>,
) -> Result<()> {
    let mut payload = Vec::new();
    let (type_id, fixed_width) = match value {
        // The seven primitives bypass descriptor dispatch.
        FieldValue::Boolean(v) => {
            payload.push(u8::from(*v));
            (type_ids::BOOLEAN, true)
        }
        FieldValue::Byte(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::BYTE, true)
        }
        FieldValue::Short(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::SHORT, true)
        }
        FieldValue::Int(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::INT, true)
        }
        FieldValue::Long(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::LONG, true)
        }
        FieldValue::Float(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::FLOAT, true)
        }
        FieldValue::Double(v) => {
            payload.extend_from_slice(&v.to_be_bytes());
            (type_ids::DOUBLE, true)
        }

        // Sub-messages recurse here so the taxonomy reaches nested fields.
        FieldValue::Message(m) => {
            encode_message_into(&mut payload, m, dict, taxonomy)?;
            (type_ids::MESSAGE, false)
        }

        // Everything else goes through the type dictionary.
        other => {
            let type_id = other.type_id();
            match dict.get(type_id) {
                Some(field_type) => {
                    field_type.write(other, &mut payload, dict)?;
                    if let Some(fixed) = field_type.fixed_size() {
                        if payload.len() != fixed {
                            return Err(TagwireError::Internal(format!(
                                "descriptor for type id {type_id} wrote {} bytes, fixed size is {fixed}",
                                payload.len()
                            )));
                        }
                    }
                    (type_id, field_type.is_fixed_width())
                }
                // Opaque round-trip: unknown bytes re-encode unchanged.
                None => match other {
                    FieldValue::Unknown { bytes, .. } => {
                        payload.extend_from_slice(bytes);
                        (type_id, false)
                    }
                    _ => {
                        return Err(TagwireError::Internal(format!(
                            "no descriptor registered for value type id {type_id}"
                        )))
                    }
                },
            }
        }
    };
    emit_field(out, name, ordinal, type_id, fixed_width, &payload, taxonomy)
}

/// Emits one complete field record with the given value payload.
fn emit_field(
    out: &mut Vec<u8>,
    name: Option<&str>,
    ordinal: Option<i16>,
    type_id: u8,
    fixed_width: bool,
    payload: &[u8],
    taxonomy: Option<&Taxonomy>,
) -> Result<()> {
    // Taxonomy rewriting: gain the ordinal, drop the redundant name.
    let (name, ordinal) = match taxonomy {
        Some(tax) => match (name, ordinal) {
            (Some(n), None) => match tax.ordinal_of(n) {
                Some(o) => (None, Some(o)),
                None => (Some(n), None),
            },
            (Some(n), Some(o)) if tax.ordinal_of(n) == Some(o) => (None, Some(o)),
            keys => keys,
        },
        None => (name, ordinal),
    };

    let var_size_bytes = if fixed_width {
        0
    } else {
        var_size_width(payload.len())?
    };
    let prefix = FieldPrefix::new(fixed_width, var_size_bytes, ordinal.is_some(), name.is_some());

    out.push(prefix.as_u8());
    out.push(type_id);
    if let Some(o) = ordinal {
        out.extend_from_slice(&o.to_be_bytes());
    }
    if let Some(n) = name {
        mutf8::write_name(out, n)?;
    }
    if !fixed_width {
        match var_size_bytes {
            0 => {}
            1 => out.push(payload.len() as u8),
            2 => out.extend_from_slice(&(payload.len() as u16).to_be_bytes()),
            _ => out.extend_from_slice(&(payload.len() as u32).to_be_bytes()),
        }
    }
    out.extend_from_slice(payload);
    Ok(())
}

/// Picks the minimal size-byte width for a variable value length.
fn var_size_width(len: usize) -> Result<u8> {
    if len == 0 {
        Ok(0)
    } else if len <= 0xFF {
        Ok(1)
    } else if len <= 0xFFFF {
        Ok(2)
    } else if u32::try_from(len).is_ok() {
        Ok(4)
    } else {
        Err(TagwireError::MalformedEnvelope(format!(
            "value of {len} bytes exceeds the 32-bit size field"
        )))
    }
}
