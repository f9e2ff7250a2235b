//! The deserialization context: rebuilding object graphs from envelopes.
//!
//! The decoder mirrors the encoder's per-operation state with a growing,
//! index-keyed vector of reconstructed objects. Top-level message fields are
//! walked in order; each one (and each nested object message a surrogate
//! resolves) is assigned the next index, its type is resolved from the
//! reserved-ordinal fields, and its surrogate rebuilds the object.
//!
//! Back-references arrive as integer fields and resolve to
//! `objects[container_index + delta]`. Type deltas resolve the same way
//! against the per-index type record. The decoder does not pre-publish
//! partially built objects: a reference whose target is still being decoded
//! is a hard error.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TagwireError};
use crate::format::TYPE_ORDINAL;
use crate::message::{FieldValue, Message};

use super::registry::{Surrogate, SurrogateRegistry, TypeNaming};
use super::GraphObj;

/// Per-operation object-graph decoder.
pub struct GraphDecoder<'a> {
    registry: &'a SurrogateRegistry,
    naming: &'a dyn TypeNaming,
    objects: Vec<Option<GraphObj>>,
    types: Vec<TypeId>,
    container_stack: Vec<usize>,
}

impl<'a> GraphDecoder<'a> {
    pub(crate) fn new(registry: &'a SurrogateRegistry) -> Self {
        Self {
            registry,
            naming: registry,
            objects: Vec::new(),
            types: Vec::new(),
            container_stack: Vec::new(),
        }
    }

    /// Replaces the default naming strategy (the registry) with a custom one.
    pub fn with_naming(mut self, naming: &'a dyn TypeNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Rebuilds the graph from an envelope's root message.
    ///
    /// Every top-level field must be a sub-message (one emitted object); the
    /// returned object is the one at index 0, the root of the original graph.
    pub fn deserialize(mut self, envelope_message: &Message) -> Result<GraphObj> {
        for field in envelope_message.fields() {
            match field.value() {
                FieldValue::Message(m) => {
                    self.decode_object_message(m)?;
                }
                other => {
                    return Err(TagwireError::MalformedEnvelope(format!(
                        "unexpected top-level field of type id {} in an object stream",
                        other.type_id()
                    )))
                }
            }
        }
        self.objects
            .first()
            .and_then(Clone::clone)
            .ok_or_else(|| TagwireError::MalformedEnvelope("object stream is empty".into()))
    }

    /// Resolves an object-valued field read by a surrogate.
    ///
    /// A nested sub-message decodes a new object at the next index; an
    /// integer is a relative reference to an earlier object.
    pub fn object_field(&mut self, value: &FieldValue) -> Result<GraphObj> {
        match value {
            FieldValue::Message(m) => self.decode_object_message(m),
            FieldValue::Int(delta) => self.resolve_reference(*delta),
            other => Err(TagwireError::MalformedEnvelope(format!(
                "field of type id {} is neither an object nor a reference",
                other.type_id()
            ))),
        }
    }

    /// Like [`GraphDecoder::object_field`], downcast to a concrete type.
    pub fn typed_object<T: Any>(&mut self, value: &FieldValue) -> Result<Rc<T>> {
        self.object_field(value)?.downcast::<T>().map_err(|_| {
            TagwireError::MalformedEnvelope(
                "referenced object has an unexpected runtime type".into(),
            )
        })
    }

    fn decode_object_message(&mut self, msg: &Message) -> Result<GraphObj> {
        let index = self.objects.len();
        self.objects.push(None);
        let ty = self.resolve_type(msg, index)?;
        self.types.push(ty);

        let registry = self.registry;
        let surrogate = registry
            .surrogate_for(ty)
            .ok_or_else(|| TagwireError::UnregisteredObjectType(self.describe_type(ty)))?;

        self.container_stack.push(index);
        let decoded = surrogate.decode(msg, self);
        self.container_stack.pop();
        let obj = decoded?;

        self.objects[index] = Some(obj.clone());
        Ok(obj)
    }

    /// Resolves the runtime type from the reserved-ordinal fields.
    ///
    /// An integer delta points at an earlier emission of the same type; a
    /// chain of names is tried in order until one has a registered surrogate.
    fn resolve_type(&self, msg: &Message, index: usize) -> Result<TypeId> {
        let mut first_name: Option<&str> = None;
        for field in msg.all_by_ordinal(TYPE_ORDINAL) {
            match field.value() {
                FieldValue::Int(delta) => {
                    let target = index as i64 + i64::from(*delta);
                    let in_range =
                        target >= 0 && (target as usize) < self.types.len();
                    if !in_range {
                        return Err(TagwireError::MalformedEnvelope(format!(
                            "type delta {delta} at message {index} is out of range"
                        )));
                    }
                    return Ok(self.types[target as usize]);
                }
                FieldValue::Str(name) => {
                    first_name.get_or_insert(name.as_str());
                    if let Some(ty) = self.naming.type_of(name) {
                        if self.registry.is_registered(ty) {
                            return Ok(ty);
                        }
                    }
                }
                other => {
                    return Err(TagwireError::MalformedEnvelope(format!(
                        "type field at message {index} has type id {}, expected an \
                         integer delta or a name",
                        other.type_id()
                    )))
                }
            }
        }
        match first_name {
            Some(name) => Err(TagwireError::UnregisteredObjectType(name.to_owned())),
            None => Err(TagwireError::MalformedEnvelope(format!(
                "message {index} carries no type information"
            ))),
        }
    }

    fn resolve_reference(&self, delta: i32) -> Result<GraphObj> {
        let container = *self.container_stack.last().ok_or_else(|| {
            TagwireError::Internal("reference resolved outside an object message".into())
        })?;
        let target = container as i64 + i64::from(delta);
        let in_range = target >= 0 && (target as usize) < self.objects.len();
        if !in_range {
            return Err(TagwireError::MalformedEnvelope(format!(
                "reference delta {delta} from message {container} is out of range"
            )));
        }
        self.objects[target as usize].clone().ok_or_else(|| {
            TagwireError::MalformedEnvelope(format!(
                "reference to message {target}, which is still being decoded"
            ))
        })
    }

    fn describe_type(&self, ty: TypeId) -> String {
        match self.naming.names_of(ty).and_then(|names| names.first()) {
            Some(name) => name.clone(),
            None => format!("{ty:?}"),
        }
    }
}

impl fmt::Debug for GraphDecoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDecoder")
            .field("decoded", &self.objects.len())
            .field("container_depth", &self.container_stack.len())
            .finish()
    }
}
