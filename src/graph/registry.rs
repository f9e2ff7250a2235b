//! Surrogate registration and the type-naming strategy.
//!
//! A [`Surrogate`] is the per-type encode/decode pair: the encoder populates a
//! streaming message from an object, the decoder rebuilds an object from a
//! decoded message. The [`SurrogateRegistry`] owns all registrations and maps
//! runtime types to surrogates and to their wire type-name chains.
//!
//! Naming is a pluggable strategy ([`TypeNaming`]) so wire names can differ
//! from Rust paths; the registry itself is the default strategy, serving the
//! names supplied at registration.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::message::Message;

use super::decode::GraphDecoder;
use super::encode::StreamMessage;
use super::GraphObj;

/// The per-type encode/decode pair.
///
/// `encode` must write the object's fields through the facade; it may inline,
/// reference or queue sub-objects. `decode` receives the materialized message
/// and resolves object-valued fields through the decoder context.
///
/// Surrogates must not add fields at the reserved
/// [`TYPE_ORDINAL`](crate::format::TYPE_ORDINAL); the engine owns that ordinal.
pub trait Surrogate: Send + Sync {
    /// Populates `msg` from `obj`.
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> Result<()>;

    /// Builds a new object from `msg`.
    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> Result<GraphObj>;
}

/// Maps runtime types to stable wire type-names and back.
///
/// `names_of` returns the full chain for a type, most specific first; the
/// encoder writes the whole chain the first time a type appears so a decoder
/// lacking the exact registration can fall back to a later name. `type_of`
/// resolves one wire name to a runtime type.
pub trait TypeNaming: Send + Sync {
    /// Returns the wire type-name chain for a runtime type, if known.
    fn names_of(&self, ty: TypeId) -> Option<&[String]>;

    /// Resolves a wire type-name to a runtime type, if known.
    fn type_of(&self, name: &str) -> Option<TypeId>;
}

struct Registration {
    ty: TypeId,
    names: Vec<String>,
    surrogate: Box<dyn Surrogate>,
}

/// Owns all surrogate registrations for one serialization domain.
///
/// Registration is append-only and order-independent. The registry doubles as
/// the default [`TypeNaming`] strategy, serving the names supplied at
/// registration time.
#[derive(Default)]
pub struct SurrogateRegistry {
    entries: Vec<Registration>,
    by_type: HashMap<TypeId, usize>,
    by_name: HashMap<String, usize>,
}

impl SurrogateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a surrogate for `T` under one or more wire type-names.
    ///
    /// `names` must contain at least one entry; the first is the canonical
    /// name, the rest are fallbacks written after it in the type-name chain
    /// (most specific first). Registering the same type or name again
    /// replaces the earlier mapping.
    pub fn register<T: Any>(&mut self, names: &[&str], surrogate: impl Surrogate + 'static) {
        let index = self.entries.len();
        let names: Vec<String> = names.iter().map(|n| (*n).to_owned()).collect();
        self.by_type.insert(TypeId::of::<T>(), index);
        for name in &names {
            self.by_name.insert(name.clone(), index);
        }
        self.entries.push(Registration {
            ty: TypeId::of::<T>(),
            names,
            surrogate: Box::new(surrogate),
        });
    }

    /// Looks up the surrogate for a runtime type.
    pub fn surrogate_for(&self, ty: TypeId) -> Option<&dyn Surrogate> {
        self.by_type
            .get(&ty)
            .map(|&i| self.entries[i].surrogate.as_ref())
    }

    /// Returns true if a surrogate is registered for the type.
    pub fn is_registered(&self, ty: TypeId) -> bool {
        self.by_type.contains_key(&ty)
    }
}

impl TypeNaming for SurrogateRegistry {
    fn names_of(&self, ty: TypeId) -> Option<&[String]> {
        self.by_type
            .get(&ty)
            .map(|&i| self.entries[i].names.as_slice())
    }

    fn type_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).map(|&i| self.entries[i].ty)
    }
}

impl fmt::Debug for SurrogateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrogateRegistry")
            .field("types", &self.entries.len())
            .field(
                "names",
                &self
                    .entries
                    .iter()
                    .flat_map(|e| e.names.iter())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
