//! The wire decoder: envelope header, field loop, and the byte cursor.
//!
//! Decoding is strict. The envelope declares its total size up front and the
//! field loop must consume exactly that many bytes; any shortfall or overrun
//! is a hard [`TagwireError::TruncatedInput`] / [`TagwireError::MalformedEnvelope`]
//! and no resynchronization is attempted past a malformed field.
//!
//! The seven primitive type ids are decoded through a direct fast path;
//! every other id dispatches through the [`TypeDictionary`]. Unknown
//! variable-width ids decode to opaque [`FieldValue::Unknown`] bytes; unknown
//! fixed-width ids fail because their width cannot be recovered.

use std::io::Read;

use crate::dictionary::TypeDictionary;
use crate::error::{Result, TagwireError};
use crate::format::{type_ids, EnvelopeHeader, FieldPrefix, ENVELOPE_HEADER_SIZE};
use crate::message::{Envelope, Field, FieldValue, Message};
use crate::mutf8;
use crate::taxonomy::{Taxonomy, TaxonomyResolver};

/// Bounds-checked big-endian cursor over a borrowed byte slice.
///
/// Every read past the end fails with [`TagwireError::TruncatedInput`]
/// carrying the number of bytes that were needed and the number available.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a cursor over `buf`, positioned at its start.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns the current offset from the start of the slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consumes exactly `n` bytes and returns them as a sub-slice.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(TagwireError::TruncatedInput {
                expected: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads one unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads one signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a big-endian i16.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian f32.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian f64.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        slice
            .try_into()
            .map_err(|_| TagwireError::Internal("slice length mismatch in ByteReader".into()))
    }
}

/// Reads one envelope from a byte source.
///
/// Consumes exactly the envelope's declared size from the source, leaving any
/// trailing bytes (for example the next envelope of a stream) unread.
pub fn read_envelope(
    src: &mut dyn Read,
    dict: &TypeDictionary,
    resolver: Option<&dyn TaxonomyResolver>,
) -> Result<Envelope> {
    let mut header_bytes = [0u8; ENVELOPE_HEADER_SIZE];
    fill_exact(src, &mut header_bytes)?;
    let header = EnvelopeHeader::from_bytes(&header_bytes)?;

    let body_len = header.size as usize - ENVELOPE_HEADER_SIZE;
    let mut body = vec![0u8; body_len];
    fill_exact(src, &mut body)?;

    decode_body(&header, &body, dict, resolver)
}

/// Reads one envelope from the start of a byte slice.
///
/// Bytes beyond the declared envelope size are ignored; callers framing
/// multiple envelopes in one buffer can advance by the header's size field.
pub fn read_envelope_from_slice(
    buf: &[u8],
    dict: &TypeDictionary,
    resolver: Option<&dyn TaxonomyResolver>,
) -> Result<Envelope> {
    let header = EnvelopeHeader::from_bytes(buf)?;
    let size = header.size as usize;
    if buf.len() < size {
        return Err(TagwireError::TruncatedInput {
            expected: size,
            available: buf.len(),
        });
    }
    decode_body(&header, &buf[ENVELOPE_HEADER_SIZE..size], dict, resolver)
}

fn decode_body(
    header: &EnvelopeHeader,
    body: &[u8],
    dict: &TypeDictionary,
    resolver: Option<&dyn TaxonomyResolver>,
) -> Result<Envelope> {
    let mut reader = ByteReader::new(body);
    let mut message = read_message_body(&mut reader, dict)?;

    // Post-pass: derive the missing half of name/ordinal, never overwriting.
    if header.taxonomy_id != 0 {
        if let Some(taxonomy) = resolver.and_then(|r| r.resolve(header.taxonomy_id)) {
            apply_taxonomy(&mut message, taxonomy);
        }
    }

    Ok(Envelope {
        directives: header.directives,
        version: header.version,
        taxonomy_id: header.taxonomy_id,
        message,
    })
}

/// Reads fields until the cursor is exhausted.
pub(crate) fn read_message_body(r: &mut ByteReader<'_>, dict: &TypeDictionary) -> Result<Message> {
    let mut msg = Message::new();
    while r.remaining() > 0 {
        msg.push(read_field(r, dict)?);
    }
    Ok(msg)
}

/// Reads one complete field record.
fn read_field(r: &mut ByteReader<'_>, dict: &TypeDictionary) -> Result<Field> {
    let prefix = FieldPrefix::from_byte(r.read_u8()?)?;
    let type_id = r.read_u8()?;

    let ordinal = if prefix.has_ordinal() {
        Some(r.read_i16()?)
    } else {
        None
    };
    let name = if prefix.has_name() {
        let len = r.read_u8()? as usize;
        Some(mutf8::decode(r.take(len)?)?)
    } else {
        None
    };

    let value = if prefix.fixed_width() {
        read_fixed_value(r, type_id, dict)?
    } else {
        let size = match prefix.var_size_bytes() {
            0 => 0,
            1 => r.read_u8()? as usize,
            2 => r.read_u16()? as usize,
            _ => r.read_u32()? as usize,
        };
        match dict.get(type_id) {
            Some(field_type) if !field_type.is_fixed_width() => field_type.read(r, size, dict)?,
            Some(_) => {
                return Err(TagwireError::MalformedEnvelope(format!(
                    "fixed-width type id {type_id} encoded as variable-width"
                )))
            }
            None => dict.unknown(type_id).read(r, size, dict)?,
        }
    };

    Ok(Field::new(name.as_deref(), ordinal, value))
}

/// Fast path for the seven primitive ids; descriptor dispatch for the rest.
fn read_fixed_value(
    r: &mut ByteReader<'_>,
    type_id: u8,
    dict: &TypeDictionary,
) -> Result<FieldValue> {
    match type_id {
        type_ids::BOOLEAN => Ok(FieldValue::Boolean(r.read_u8()? != 0)),
        type_ids::BYTE => Ok(FieldValue::Byte(r.read_i8()?)),
        type_ids::SHORT => Ok(FieldValue::Short(r.read_i16()?)),
        type_ids::INT => Ok(FieldValue::Int(r.read_i32()?)),
        type_ids::LONG => Ok(FieldValue::Long(r.read_i64()?)),
        type_ids::FLOAT => Ok(FieldValue::Float(r.read_f32()?)),
        type_ids::DOUBLE => Ok(FieldValue::Double(r.read_f64()?)),
        _ => match dict.get(type_id) {
            Some(field_type) => match field_type.fixed_size() {
                Some(size) => field_type.read(r, size, dict),
                None => Err(TagwireError::MalformedEnvelope(format!(
                    "variable-width type id {type_id} encoded as fixed-width"
                ))),
            },
            None => Err(TagwireError::UnknownType(type_id)),
        },
    }
}

fn apply_taxonomy(msg: &mut Message, taxonomy: &Taxonomy) {
    for field in msg.fields_mut() {
        let ord_from_name = field.name().and_then(|n| taxonomy.ordinal_of(n));
        if let Some(o) = ord_from_name {
            field.fill_ordinal(o);
        }
        let name_from_ord = field
            .ordinal()
            .and_then(|o| taxonomy.name_of(o))
            .map(str::to_owned);
        if let Some(n) = name_from_ord {
            field.fill_name(&n);
        }
        if let FieldValue::Message(sub) = field.value_mut() {
            apply_taxonomy(sub, taxonomy);
        }
    }
}

/// Fills `buf` completely, reporting a truncation with exact counts on EOF.
fn fill_exact(src: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(TagwireError::TruncatedInput {
                    expected: buf.len(),
                    available: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
