//! The serialization context: the heart of the object-graph encoder.
//!
//! One [`GraphSerializer`] exists per `serialize` call. It owns every piece of
//! per-encode state:
//!
//! - the **identity map** from object identity to the message index at which
//!   the object was most recently emitted (later emissions overwrite, so
//!   subsequent back-references stay small);
//! - the **last-type map** from runtime type to the index of its most recent
//!   emission, which compresses repeated type information to one delta;
//! - the **inline stack** of objects currently being inlined, scanned to
//!   detect cycles among inlined objects;
//! - the **encode queue**, a FIFO of objects referenced for later out-of-line
//!   emission as top-level sibling messages.
//!
//! Surrogates never see the serializer directly; they write through
//! [`StreamMessage`], a write-only facade whose mutating operations translate
//! straight into wire output and whose readback accessors fail hard.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::BuildHasherDefault;
use std::io::Write;

use twox_hash::XxHash64;

use crate::error::{Result, TagwireError};
use crate::format::TYPE_ORDINAL;
use crate::message::FieldValue;
use crate::writer::WireWriter;

use super::id::{MessageId, ObjKey};
use super::registry::{Surrogate, SurrogateRegistry, TypeNaming};
use super::GraphObj;

/// Identity map keyed on `Rc` allocation addresses, hashed with XxHash64.
type IdentityMap = HashMap<ObjKey, MessageId, BuildHasherDefault<XxHash64>>;

/// Per-operation object-graph encoder.
///
/// Construct one per graph (via
/// [`Context::serialize_graph`](crate::Context::serialize_graph)); the
/// per-encode state is not reusable across operations.
pub struct GraphSerializer<'a> {
    registry: &'a SurrogateRegistry,
    naming: &'a dyn TypeNaming,
    writer: WireWriter<'a>,
    id_map: IdentityMap,
    last_types: HashMap<TypeId, MessageId>,
    inline_stack: Vec<(ObjKey, MessageId)>,
    queue: VecDeque<GraphObj>,
    next_id: i32,
}

impl<'a> GraphSerializer<'a> {
    pub(crate) fn new(registry: &'a SurrogateRegistry, writer: WireWriter<'a>) -> Self {
        Self {
            registry,
            naming: registry,
            writer,
            id_map: IdentityMap::default(),
            last_types: HashMap::new(),
            inline_stack: Vec::new(),
            queue: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Replaces the default naming strategy (the registry) with a custom one.
    pub fn with_naming(mut self, naming: &'a dyn TypeNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Serializes `root` and everything it reaches, then writes the envelope.
    ///
    /// The root is registered at message index 0. After the root message, the
    /// encode queue is drained in FIFO order, each entry becoming a top-level
    /// sibling message in the same envelope. Returns the envelope size.
    pub fn serialize(mut self, root: &GraphObj, sink: &mut dyn Write) -> Result<usize> {
        if self.next_id != 0 {
            return Err(TagwireError::Internal(
                "graph serializer reused across operations".into(),
            ));
        }
        self.emit_object(None, None, root)?;
        while let Some(obj) = self.queue.pop_front() {
            // Emitted inline since it was queued: nothing left to do.
            if self.id_map.contains_key(&ObjKey::of(&obj)) {
                continue;
            }
            self.emit_object(None, None, &obj)?;
        }
        self.writer.finish(sink)
    }

    /// Emits one object as a sub-message: type info, surrogate fields, framing.
    fn emit_object(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        obj: &GraphObj,
    ) -> Result<()> {
        let ty = (**obj).type_id();
        let registry = self.registry;
        let surrogate = registry
            .surrogate_for(ty)
            .ok_or_else(|| TagwireError::UnregisteredObjectType(self.describe_type(ty)))?;

        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        let key = ObjKey::of(obj);
        // Monotonic: a re-emission overwrites with the later, closer index.
        self.id_map.insert(key, id);

        self.writer.start_message(name, ordinal);
        self.write_type_info(ty, id)?;
        self.inline_stack.push((key, id));
        let encoded = surrogate.encode(obj, &mut StreamMessage { ctx: self });
        self.inline_stack.pop();
        encoded?;
        self.writer.end_message()
    }

    /// Writes the type information for an emission at index `id`.
    ///
    /// A last-type hit emits one integer delta at the reserved ordinal; a miss
    /// emits the full type-name chain as strings, most specific first.
    fn write_type_info(&mut self, ty: TypeId, id: MessageId) -> Result<()> {
        if let Some(&last) = self.last_types.get(&ty) {
            self.writer
                .add_field(None, Some(TYPE_ORDINAL), &FieldValue::Int(last.delta_from(id)))?;
        } else {
            let naming = self.naming;
            let names = naming
                .names_of(ty)
                .filter(|names| !names.is_empty())
                .ok_or_else(|| TagwireError::UnregisteredObjectType(format!("{ty:?}")))?;
            for type_name in names {
                self.writer.add_field(
                    None,
                    Some(TYPE_ORDINAL),
                    &FieldValue::Str(type_name.clone()),
                )?;
            }
        }
        self.last_types.insert(ty, id);
        Ok(())
    }

    /// Reference-eligible object field: back-reference if seen, inline if new.
    fn write_object_field(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        obj: &GraphObj,
    ) -> Result<()> {
        let key = ObjKey::of(obj);
        if let Some(&previous) = self.id_map.get(&key) {
            let container = self.containing_message()?;
            self.writer
                .add_field(name, ordinal, &FieldValue::Int(previous.delta_from(container)))
        } else {
            self.emit_object(name, ordinal, obj)
        }
    }

    /// Inline object field: no back-references, cycle-checked.
    fn write_inline_field(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        obj: &GraphObj,
    ) -> Result<()> {
        let key = ObjKey::of(obj);
        if self.inline_stack.iter().any(|(k, _)| *k == key) {
            return Err(TagwireError::InlineCycle);
        }
        self.emit_object(name, ordinal, obj)
    }

    /// Queues an object for out-of-line emission after the root message.
    ///
    /// Objects already emitted, or already queued, are not queued again.
    fn queue_object(&mut self, obj: &GraphObj) {
        let key = ObjKey::of(obj);
        if self.id_map.contains_key(&key) {
            return;
        }
        if self.queue.iter().any(|queued| ObjKey::of(queued) == key) {
            return;
        }
        self.queue.push_back(obj.clone());
    }

    /// Index of the message currently being written.
    ///
    /// Back-references are relative to the *containing* message, which keeps
    /// them small: it is the top of the inline stack, not the referenced
    /// object's own index.
    fn containing_message(&self) -> Result<MessageId> {
        self.inline_stack
            .last()
            .map(|&(_, id)| id)
            .ok_or_else(|| {
                TagwireError::Internal("object field written outside an object message".into())
            })
    }

    fn describe_type(&self, ty: TypeId) -> String {
        match self.naming.names_of(ty).and_then(|names| names.first()) {
            Some(name) => name.clone(),
            None => format!("{ty:?}"),
        }
    }
}

impl fmt::Debug for GraphSerializer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSerializer")
            .field("emitted", &self.next_id)
            .field("inline_depth", &self.inline_stack.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Write-only streaming view of the message currently being encoded.
///
/// This is the container surrogates populate. Every mutating operation is
/// translated directly into an encoder call; nothing is materialized, so the
/// readback accessors ([`StreamMessage::by_name`],
/// [`StreamMessage::by_ordinal`]) exist only for container-contract parity and
/// always fail with [`TagwireError::InvalidFacadeOperation`].
pub struct StreamMessage<'s, 'a> {
    pub(super) ctx: &'s mut GraphSerializer<'a>,
}

impl StreamMessage<'_, '_> {
    /// Appends a scalar field. Passes straight through to the wire.
    pub fn add(&mut self, name: Option<&str>, ordinal: Option<i16>, value: FieldValue) -> Result<()> {
        self.ctx.writer.add_field(name, ordinal, &value)
    }

    /// Appends an object field, reference-eligible.
    ///
    /// If the object was already emitted this encode, a single integer
    /// back-reference is written; otherwise the object is emitted here as a
    /// nested sub-message and registered for future back-references.
    pub fn add_object(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        obj: &GraphObj,
    ) -> Result<()> {
        self.ctx.write_object_field(name, ordinal, obj)
    }

    /// Appends an object field inline, as a nested sub-message here and now.
    ///
    /// Back-references are not consulted. An object already on the inline
    /// stack fails with [`TagwireError::InlineCycle`].
    pub fn add_inline(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i16>,
        obj: &GraphObj,
    ) -> Result<()> {
        self.ctx.write_inline_field(name, ordinal, obj)
    }

    /// Queues an object for out-of-line emission as a top-level sibling
    /// message, without writing a field here.
    pub fn queue(&mut self, obj: &GraphObj) {
        self.ctx.queue_object(obj);
    }

    /// Unsupported readback; the facade is write-only.
    pub fn by_name(&self, _name: &str) -> Result<&FieldValue> {
        Err(TagwireError::InvalidFacadeOperation("field lookup by name"))
    }

    /// Unsupported readback; the facade is write-only.
    pub fn by_ordinal(&self, _ordinal: i16) -> Result<&FieldValue> {
        Err(TagwireError::InvalidFacadeOperation(
            "field lookup by ordinal",
        ))
    }
}
