//! The object-graph serialization engine.
//!
//! This module turns arbitrary typed object graphs into envelopes and back.
//! Each object is emitted as one sub-message; repeated references to an
//! already-emitted object compress to a single relative back-reference, and
//! repeated types compress to a single integer delta against the last emission
//! of the same type.
//!
//! The engine is driven by per-type [`Surrogate`]s looked up in a
//! [`SurrogateRegistry`]; objects are shared, dynamically typed [`GraphObj`]
//! handles whose identity (reference equality) is what the back-reference
//! machinery tracks.

use std::any::Any;
use std::rc::Rc;

/// Defines the `GraphDecoder` deserialization context.
pub mod decode;
/// Defines the `GraphSerializer` serialization context and its streaming facade.
pub mod encode;
/// Defines the `MessageId` type.
pub mod id;
/// Defines the `Surrogate` trait, its registry and the type-naming strategy.
pub mod registry;

pub use decode::GraphDecoder;
pub use encode::{GraphSerializer, StreamMessage};
pub use id::MessageId;
pub use registry::{Surrogate, SurrogateRegistry, TypeNaming};

/// A shared, dynamically typed object participating in a graph.
///
/// Identity is reference identity: two `GraphObj` handles denote the same
/// object exactly when they point at the same allocation (`Rc::ptr_eq`).
/// Types that override value equality do not alias under the identity map,
/// because the map never consults `Eq`.
pub type GraphObj = Rc<dyn Any>;
