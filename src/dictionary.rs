//! Pluggable field-type dictionary.
//!
//! Every field on the wire carries a one-byte type id. The dictionary maps
//! that id to a [`FieldType`] descriptor: fixed-vs-variable width, the fixed
//! size when applicable, and the reader/writer pair for the value bytes.
//!
//! The seven primitive ids (boolean through double) are fast-pathed by the
//! codec and never reach the descriptor dispatch on the hot path, but they are
//! registered here too so generic tooling can resolve any known id. Unknown
//! *variable*-width ids fall back to the opaque placeholder descriptor from
//! [`TypeDictionary::unknown`]; unknown *fixed*-width ids are a hard decode
//! error because their width cannot be recovered.

use crate::error::{Result, TagwireError};
use crate::format::type_ids;
use crate::message::FieldValue;
use crate::reader::ByteReader;
use crate::{mutf8, reader, writer};

/// Reader/writer pair for one wire type.
///
/// `read` consumes exactly the value bytes of one field: `size` is the
/// declared variable size (for fixed-width types it is the fixed size). The
/// dictionary is passed through for types that nest, like sub-messages.
pub trait WireTypeCodec: Send + Sync + std::fmt::Debug {
    /// Reads one value from the source.
    fn read(&self, src: &mut ByteReader<'_>, size: usize, dict: &TypeDictionary)
        -> Result<FieldValue>;

    /// Appends one value's bytes to the output buffer.
    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, dict: &TypeDictionary) -> Result<()>;
}

/// Immutable descriptor for one field type.
#[derive(Debug)]
pub struct FieldType {
    type_id: u8,
    fixed_size: Option<usize>,
    codec: Box<dyn WireTypeCodec>,
}

impl FieldType {
    /// Creates a new descriptor. `fixed_size` is `Some` for fixed-width types.
    pub fn new(type_id: u8, fixed_size: Option<usize>, codec: Box<dyn WireTypeCodec>) -> Self {
        Self {
            type_id,
            fixed_size,
            codec,
        }
    }

    /// Returns the wire type id.
    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    /// Returns true if values of this type have a type-determined width.
    pub fn is_fixed_width(&self) -> bool {
        self.fixed_size.is_some()
    }

    /// Returns the fixed size in bytes, if fixed-width.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }

    /// Reads one value of this type.
    pub fn read(
        &self,
        src: &mut ByteReader<'_>,
        size: usize,
        dict: &TypeDictionary,
    ) -> Result<FieldValue> {
        self.codec.read(src, size, dict)
    }

    /// Writes one value of this type.
    pub fn write(&self, value: &FieldValue, out: &mut Vec<u8>, dict: &TypeDictionary) -> Result<()> {
        self.codec.write(value, out, dict)
    }
}

/// Registry of field-type descriptors, indexed by type id.
#[derive(Debug)]
pub struct TypeDictionary {
    types: Vec<Option<FieldType>>,
}

impl TypeDictionary {
    /// Creates a dictionary pre-loaded with the built-in types.
    pub fn new() -> Self {
        let mut dict = Self {
            types: (0..16).map(|_| None).collect(),
        };

        dict.register(FieldType::new(type_ids::BOOLEAN, Some(1), Box::new(BooleanCodec)));
        dict.register(FieldType::new(type_ids::BYTE, Some(1), Box::new(ByteCodec)));
        dict.register(FieldType::new(type_ids::SHORT, Some(2), Box::new(ShortCodec)));
        dict.register(FieldType::new(type_ids::INT, Some(4), Box::new(IntCodec)));
        dict.register(FieldType::new(type_ids::LONG, Some(8), Box::new(LongCodec)));
        dict.register(FieldType::new(type_ids::FLOAT, Some(4), Box::new(FloatCodec)));
        dict.register(FieldType::new(type_ids::DOUBLE, Some(8), Box::new(DoubleCodec)));
        dict.register(FieldType::new(type_ids::STRING, None, Box::new(StringCodec)));
        dict.register(FieldType::new(type_ids::BYTES, None, Box::new(BytesCodec)));
        dict.register(FieldType::new(type_ids::MESSAGE, None, Box::new(MessageCodec)));

        dict
    }

    /// Registers a descriptor under its type id, replacing any previous one.
    pub fn register(&mut self, field_type: FieldType) {
        let id = field_type.type_id() as usize;
        if id >= self.types.len() {
            self.types.resize_with(id + 1, || None);
        }
        self.types[id] = Some(field_type);
    }

    /// Looks up a descriptor by type id.
    pub fn get(&self, type_id: u8) -> Option<&FieldType> {
        self.types.get(type_id as usize).and_then(Option::as_ref)
    }

    /// Returns the opaque placeholder descriptor for an unknown variable-width id.
    ///
    /// Values read through it decode to [`FieldValue::Unknown`] and re-encode
    /// byte-identically under the original id.
    pub fn unknown(&self, type_id: u8) -> FieldType {
        FieldType::new(type_id, None, Box::new(UnknownCodec { type_id }))
    }
}

impl Default for TypeDictionary {
    fn default() -> Self {
        Self::new()
    }
}

// --- BUILT-IN CODECS ---

macro_rules! expect_variant {
    ($value:expr, $variant:ident) => {
        match $value {
            FieldValue::$variant(v) => Ok(v),
            other => Err(TagwireError::Internal(format!(
                concat!(stringify!($variant), " descriptor received a value of type id {}"),
                other.type_id()
            ))),
        }
    };
}

#[derive(Debug)]
struct BooleanCodec;

impl WireTypeCodec for BooleanCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Boolean(src.read_u8()? != 0))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Boolean)?;
        out.push(u8::from(*v));
        Ok(())
    }
}

#[derive(Debug)]
struct ByteCodec;

impl WireTypeCodec for ByteCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Byte(src.read_i8()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Byte)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct ShortCodec;

impl WireTypeCodec for ShortCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Short(src.read_i16()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Short)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct IntCodec;

impl WireTypeCodec for IntCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Int(src.read_i32()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Int)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct LongCodec;

impl WireTypeCodec for LongCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Long(src.read_i64()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Long)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct FloatCodec;

impl WireTypeCodec for FloatCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Float(src.read_f32()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Float)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct DoubleCodec;

impl WireTypeCodec for DoubleCodec {
    fn read(&self, src: &mut ByteReader<'_>, _: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Double(src.read_f64()?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let v = expect_variant!(value, Double)?;
        out.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct StringCodec;

impl WireTypeCodec for StringCodec {
    fn read(&self, src: &mut ByteReader<'_>, size: usize, _: &TypeDictionary) -> Result<FieldValue> {
        let bytes = src.take(size)?;
        Ok(FieldValue::Str(mutf8::decode(bytes)?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let s = expect_variant!(value, Str)?;
        out.extend_from_slice(&mutf8::encode(s));
        Ok(())
    }
}

#[derive(Debug)]
struct BytesCodec;

impl WireTypeCodec for BytesCodec {
    fn read(&self, src: &mut ByteReader<'_>, size: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Bytes(src.take(size)?.to_vec()))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        let b = expect_variant!(value, Bytes)?;
        out.extend_from_slice(b);
        Ok(())
    }
}

#[derive(Debug)]
struct MessageCodec;

impl WireTypeCodec for MessageCodec {
    fn read(
        &self,
        src: &mut ByteReader<'_>,
        size: usize,
        dict: &TypeDictionary,
    ) -> Result<FieldValue> {
        let bytes = src.take(size)?;
        let mut sub = ByteReader::new(bytes);
        Ok(FieldValue::Message(reader::read_message_body(
            &mut sub, dict,
        )?))
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, dict: &TypeDictionary) -> Result<()> {
        let m = expect_variant!(value, Message)?;
        // Taxonomy rewriting happens in the writer layer; direct descriptor
        // use encodes names and ordinals as-is.
        writer::encode_message_into(out, m, dict, None)
    }
}

#[derive(Debug)]
struct UnknownCodec {
    type_id: u8,
}

impl WireTypeCodec for UnknownCodec {
    fn read(&self, src: &mut ByteReader<'_>, size: usize, _: &TypeDictionary) -> Result<FieldValue> {
        Ok(FieldValue::Unknown {
            type_id: self.type_id,
            bytes: src.take(size)?.to_vec(),
        })
    }

    fn write(&self, value: &FieldValue, out: &mut Vec<u8>, _: &TypeDictionary) -> Result<()> {
        match value {
            FieldValue::Unknown { bytes, .. } => {
                out.extend_from_slice(bytes);
                Ok(())
            }
            other => Err(TagwireError::Internal(format!(
                "opaque descriptor received a known value of type {}",
                other.type_id()
            ))),
        }
    }
}
