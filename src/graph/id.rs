use std::fmt;
use std::rc::Rc;

use super::GraphObj;

/// A strong type for the monotonic index assigned to each (sub-)message
/// emitted within one graph encode. Message 0 is always the root object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(i32);

impl MessageId {
    /// Creates a new MessageId.
    /// Restrict visibility to the graph module to prevent arbitrary creation.
    pub(crate) fn new(id: i32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Signed distance from `container` to this message.
    ///
    /// This is the value written for back-references and type deltas: the
    /// decoder adds it to the index it is currently processing.
    pub(crate) fn delta_from(&self, container: MessageId) -> i32 {
        self.0 - container.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference-identity key for an object during one graph encode.
///
/// Wraps the `Rc` allocation address so the identity map hashes and compares
/// by reference equality regardless of the object's own `Eq`/`Hash`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObjKey(*const ());

impl ObjKey {
    pub(crate) fn of(obj: &GraphObj) -> Self {
        Self(Rc::as_ptr(obj) as *const ())
    }
}

impl fmt::Debug for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjKey({:p})", self.0)
    }
}
