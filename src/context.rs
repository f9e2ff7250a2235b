//! The context: the single entry point for encoding and decoding.
//!
//! A [`Context`] bundles the type dictionary and the taxonomy resolver, and
//! hands out the per-operation machinery: tree serialize/deserialize, file
//! save/load, and the object-graph codecs.
//!
//! A context's own state is immutable after construction, so one context can
//! serve any number of concurrent encode/decode operations; everything
//! mutable lives in the per-operation writer, reader, or graph context.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::dictionary::TypeDictionary;
use crate::error::Result;
use crate::format::DEFAULT_VERSION;
use crate::graph::{GraphDecoder, GraphObj, GraphSerializer, SurrogateRegistry};
use crate::message::{Envelope, Message};
use crate::reader;
use crate::taxonomy::{Taxonomy, TaxonomyResolver};
use crate::writer::WireWriter;

/// Bundles the type dictionary, the taxonomy resolver and the codec factories.
#[derive(Debug)]
pub struct Context {
    dictionary: TypeDictionary,
    resolver: Option<Box<dyn TaxonomyResolver>>,
    version: u8,
}

impl Context {
    /// Creates a context with the built-in type dictionary and no resolver.
    pub fn new() -> Self {
        Self {
            dictionary: TypeDictionary::new(),
            resolver: None,
            version: DEFAULT_VERSION,
        }
    }

    /// Installs a taxonomy resolver.
    pub fn with_resolver(mut self, resolver: impl TaxonomyResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Overrides the schema version written into envelope headers.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Returns the type dictionary.
    pub fn dictionary(&self) -> &TypeDictionary {
        &self.dictionary
    }

    /// Returns the type dictionary for registration of additional types.
    pub fn dictionary_mut(&mut self) -> &mut TypeDictionary {
        &mut self.dictionary
    }

    /// Resolves a taxonomy id through the installed resolver. Id 0 is "none".
    pub fn taxonomy(&self, taxonomy_id: i16) -> Option<&Taxonomy> {
        if taxonomy_id == 0 {
            return None;
        }
        self.resolver.as_deref().and_then(|r| r.resolve(taxonomy_id))
    }

    // --- TREE CODEC ---

    /// Encodes a message into one envelope on the sink.
    ///
    /// Returns the envelope size in bytes. When `taxonomy_id` resolves, field
    /// names the taxonomy knows are rewritten to ordinals on the way out.
    pub fn serialize(&self, msg: &Message, taxonomy_id: i16, sink: &mut dyn Write) -> Result<usize> {
        let mut writer = self.wire_writer(taxonomy_id);
        writer.write_message(msg)?;
        writer.finish(sink)
    }

    /// Decodes one envelope from the source.
    ///
    /// Exactly the envelope's declared size is consumed, so envelopes can be
    /// framed back to back on one stream.
    pub fn deserialize(&self, src: &mut dyn Read) -> Result<Envelope> {
        reader::read_envelope(src, &self.dictionary, self.resolver.as_deref())
    }

    /// Decodes one envelope from the start of a byte slice.
    pub fn deserialize_bytes(&self, buf: &[u8]) -> Result<Envelope> {
        reader::read_envelope_from_slice(buf, &self.dictionary, self.resolver.as_deref())
    }

    // --- FILE I/O ---

    /// Encodes a message into a file.
    pub fn save<P: AsRef<Path>>(&self, path: P, msg: &Message, taxonomy_id: i16) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.serialize(msg, taxonomy_id, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Decodes an envelope from a file through a read-only memory mapping.
    #[allow(unsafe_code)]
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Envelope> {
        let file = File::open(path.as_ref())?;
        // The mapping is read-only and dropped before this call returns; the
        // file must not be truncated by another process while it is mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        self.deserialize_bytes(&mmap)
    }

    // --- OBJECT-GRAPH CODEC ---

    /// Creates a per-operation graph serializer over this context.
    pub fn graph_serializer<'a>(
        &'a self,
        registry: &'a SurrogateRegistry,
        taxonomy_id: i16,
    ) -> GraphSerializer<'a> {
        GraphSerializer::new(registry, self.wire_writer(taxonomy_id))
    }

    /// Creates a per-operation graph decoder over this context.
    pub fn graph_decoder<'a>(&'a self, registry: &'a SurrogateRegistry) -> GraphDecoder<'a> {
        GraphDecoder::new(registry)
    }

    /// Serializes an object graph rooted at `root` into one envelope.
    ///
    /// Returns the envelope size in bytes.
    pub fn serialize_graph(
        &self,
        registry: &SurrogateRegistry,
        root: &GraphObj,
        taxonomy_id: i16,
        sink: &mut dyn Write,
    ) -> Result<usize> {
        self.graph_serializer(registry, taxonomy_id).serialize(root, sink)
    }

    /// Decodes one envelope and rebuilds the object graph it carries.
    ///
    /// Returns the root object (message index 0).
    pub fn deserialize_graph(
        &self,
        registry: &SurrogateRegistry,
        src: &mut dyn Read,
    ) -> Result<GraphObj> {
        let envelope = self.deserialize(src)?;
        self.graph_decoder(registry).deserialize(&envelope.message)
    }

    fn wire_writer(&self, taxonomy_id: i16) -> WireWriter<'_> {
        WireWriter::new(
            &self.dictionary,
            self.taxonomy(taxonomy_id),
            taxonomy_id,
            self.version,
        )
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
