#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use tagwire::{
    Context, FieldValue, GraphDecoder, GraphObj, Message, StreamMessage, Surrogate,
    SurrogateRegistry, TagwireError, TYPE_ORDINAL,
};

// --- MOCK OBJECT TYPES ---

struct Leaf {
    label: String,
}

/// Holds the same leaf twice: once inline, once as a back-reference.
struct SharedPair {
    first: Rc<Leaf>,
    second: Rc<Leaf>,
}

/// Inlines its `next` object; used to provoke inline cycles.
struct InlineNode {
    label: String,
    next: RefCell<Option<GraphObj>>,
}

/// References its `next` object (reference-eligible); cycles become refs.
struct RefNode {
    label: String,
    next: RefCell<Option<GraphObj>>,
}

/// A collection of same-typed members, for type-delta compression.
struct Team {
    members: Vec<Rc<Leaf>>,
}

/// Inlines one leaf twice and then references it, exercising the id map's
/// later-index-wins behavior.
struct ReEmit {
    one: Rc<Leaf>,
    two: Rc<Leaf>,
    by_ref: Rc<Leaf>,
}

/// Queues its extras for out-of-line emission; writes no field for them.
struct Catalog {
    extras: Vec<Rc<Leaf>>,
}

/// Queues a leaf and also references it in the same message.
struct QueueAndRef {
    leaf: Rc<Leaf>,
}

/// Asserts that facade readback fails, then writes nothing.
struct ReadbackProbe;

// --- SURROGATES ---

fn downcast<T: 'static>(obj: &GraphObj) -> tagwire::Result<&T> {
    obj.downcast_ref::<T>()
        .ok_or_else(|| TagwireError::Internal("surrogate bound to the wrong type".into()))
}

fn require_value<'m>(msg: &'m Message, name: &str) -> tagwire::Result<&'m FieldValue> {
    msg.by_name(name)
        .ok_or_else(|| TagwireError::MalformedEnvelope(format!("missing field {name}")))
}

fn require_str(msg: &Message, name: &str) -> tagwire::Result<String> {
    require_value(msg, name)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| TagwireError::MalformedEnvelope(format!("field {name} is not a string")))
}

struct LeafSurrogate;

impl Surrogate for LeafSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let leaf = downcast::<Leaf>(obj)?;
        msg.add(Some("label"), None, FieldValue::Str(leaf.label.clone()))
    }

    fn decode(&self, msg: &Message, _ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let label = require_str(msg, "label")?;
        let obj: GraphObj = Rc::new(Leaf { label });
        Ok(obj)
    }
}

struct SharedPairSurrogate;

impl Surrogate for SharedPairSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let pair = downcast::<SharedPair>(obj)?;
        let first: GraphObj = pair.first.clone();
        let second: GraphObj = pair.second.clone();
        msg.add_object(Some("first"), None, &first)?;
        msg.add_object(Some("second"), None, &second)
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let first = ctx.typed_object::<Leaf>(require_value(msg, "first")?)?;
        let second = ctx.typed_object::<Leaf>(require_value(msg, "second")?)?;
        let obj: GraphObj = Rc::new(SharedPair { first, second });
        Ok(obj)
    }
}

struct InlineNodeSurrogate;

impl Surrogate for InlineNodeSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let node = downcast::<InlineNode>(obj)?;
        msg.add(Some("label"), None, FieldValue::Str(node.label.clone()))?;
        if let Some(next) = &*node.next.borrow() {
            msg.add_inline(Some("next"), None, next)?;
        }
        Ok(())
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let label = require_str(msg, "label")?;
        let next = match msg.by_name("next") {
            Some(value) => Some(ctx.object_field(value)?),
            None => None,
        };
        let obj: GraphObj = Rc::new(InlineNode {
            label,
            next: RefCell::new(next),
        });
        Ok(obj)
    }
}

struct RefNodeSurrogate;

impl Surrogate for RefNodeSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let node = downcast::<RefNode>(obj)?;
        msg.add(Some("label"), None, FieldValue::Str(node.label.clone()))?;
        if let Some(next) = &*node.next.borrow() {
            msg.add_object(Some("next"), None, next)?;
        }
        Ok(())
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let label = require_str(msg, "label")?;
        let next = match msg.by_name("next") {
            Some(value) => Some(ctx.object_field(value)?),
            None => None,
        };
        let obj: GraphObj = Rc::new(RefNode {
            label,
            next: RefCell::new(next),
        });
        Ok(obj)
    }
}

struct TeamSurrogate;

impl Surrogate for TeamSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let team = downcast::<Team>(obj)?;
        for member in &team.members {
            let member: GraphObj = member.clone();
            msg.add_object(Some("member"), None, &member)?;
        }
        Ok(())
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let mut members = Vec::new();
        for field in msg.all_by_name("member") {
            members.push(ctx.typed_object::<Leaf>(field.value())?);
        }
        let obj: GraphObj = Rc::new(Team { members });
        Ok(obj)
    }
}

struct ReEmitSurrogate;

impl Surrogate for ReEmitSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let node = downcast::<ReEmit>(obj)?;
        let shared: GraphObj = node.one.clone();
        msg.add_inline(Some("one"), None, &shared)?;
        msg.add_inline(Some("two"), None, &shared)?;
        msg.add_object(Some("by_ref"), None, &shared)
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let one = ctx.typed_object::<Leaf>(require_value(msg, "one")?)?;
        let two = ctx.typed_object::<Leaf>(require_value(msg, "two")?)?;
        let by_ref = ctx.typed_object::<Leaf>(require_value(msg, "by_ref")?)?;
        let obj: GraphObj = Rc::new(ReEmit { one, two, by_ref });
        Ok(obj)
    }
}

struct CatalogSurrogate;

impl Surrogate for CatalogSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let catalog = downcast::<Catalog>(obj)?;
        for extra in &catalog.extras {
            let extra: GraphObj = extra.clone();
            msg.queue(&extra);
        }
        msg.add(
            Some("extra_count"),
            None,
            FieldValue::Int(catalog.extras.len() as i32),
        )
    }

    fn decode(&self, msg: &Message, _ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let count = require_value(msg, "extra_count")?
            .as_int()
            .unwrap_or_default();
        let obj: GraphObj = Rc::new(Catalog {
            extras: Vec::with_capacity(count as usize),
        });
        Ok(obj)
    }
}

struct QueueAndRefSurrogate;

impl Surrogate for QueueAndRefSurrogate {
    fn encode(&self, obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        let node = downcast::<QueueAndRef>(obj)?;
        let leaf: GraphObj = node.leaf.clone();
        msg.queue(&leaf);
        msg.add_object(Some("leaf"), None, &leaf)
    }

    fn decode(&self, msg: &Message, ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let leaf = ctx.typed_object::<Leaf>(require_value(msg, "leaf")?)?;
        let obj: GraphObj = Rc::new(QueueAndRef { leaf });
        Ok(obj)
    }
}

struct ReadbackProbeSurrogate;

impl Surrogate for ReadbackProbeSurrogate {
    fn encode(&self, _obj: &GraphObj, msg: &mut StreamMessage<'_, '_>) -> tagwire::Result<()> {
        assert!(matches!(
            msg.by_name("anything"),
            Err(TagwireError::InvalidFacadeOperation(_))
        ));
        assert!(matches!(
            msg.by_ordinal(7),
            Err(TagwireError::InvalidFacadeOperation(_))
        ));
        msg.add(Some("probed"), None, FieldValue::Boolean(true))
    }

    fn decode(&self, _msg: &Message, _ctx: &mut GraphDecoder<'_>) -> tagwire::Result<GraphObj> {
        let obj: GraphObj = Rc::new(ReadbackProbe);
        Ok(obj)
    }
}

fn demo_registry() -> SurrogateRegistry {
    let mut registry = SurrogateRegistry::new();
    registry.register::<Leaf>(&["demo.Leaf"], LeafSurrogate);
    registry.register::<SharedPair>(&["demo.SharedPair"], SharedPairSurrogate);
    registry.register::<InlineNode>(&["demo.InlineNode"], InlineNodeSurrogate);
    registry.register::<RefNode>(&["demo.RefNode"], RefNodeSurrogate);
    registry.register::<Team>(&["demo.Team"], TeamSurrogate);
    registry.register::<ReEmit>(&["demo.ReEmit"], ReEmitSurrogate);
    registry.register::<Catalog>(&["demo.Catalog"], CatalogSurrogate);
    registry.register::<QueueAndRef>(&["demo.QueueAndRef"], QueueAndRefSurrogate);
    registry.register::<ReadbackProbe>(&["demo.ReadbackProbe"], ReadbackProbeSurrogate);
    registry
}

fn leaf(label: &str) -> Rc<Leaf> {
    Rc::new(Leaf {
        label: label.to_owned(),
    })
}

fn encode_graph(
    context: &Context,
    registry: &SurrogateRegistry,
    root: &GraphObj,
) -> tagwire::Result<Vec<u8>> {
    let mut wire = Vec::new();
    context.serialize_graph(registry, root, 0, &mut wire)?;
    Ok(wire)
}

/// Collects the engine's type-metadata fields across the whole envelope.
fn collect_type_fields(msg: &Message, names: &mut Vec<String>, deltas: &mut Vec<i32>) {
    for field in msg.fields() {
        if field.ordinal() == Some(TYPE_ORDINAL) {
            match field.value() {
                FieldValue::Str(s) => names.push(s.clone()),
                FieldValue::Int(d) => deltas.push(*d),
                _ => {}
            }
        }
        if let FieldValue::Message(sub) = field.value() {
            collect_type_fields(sub, names, deltas);
        }
    }
}

// --- TESTS ---

/// Shared leaf: first occurrence inlines, second becomes the back-reference
/// `previous_id - containing_index` = 1 - 0 = 1; decoding restores identity.
#[test]
fn test_shared_leaf_back_reference() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let shared = leaf("shared");
    let root: GraphObj = Rc::new(SharedPair {
        first: shared.clone(),
        second: shared,
    });
    let wire = encode_graph(&context, &registry, &root)?;

    // Wire level: one top-level message; "second" is a single Int field.
    let envelope = context.deserialize_bytes(&wire)?;
    assert_eq!(envelope.message.len(), 1);
    let root_msg = envelope
        .message
        .field_at(0)
        .and_then(|f| f.value().as_message())
        .expect("root message");
    assert!(matches!(
        root_msg.by_name("first"),
        Some(FieldValue::Message(_))
    ));
    assert_eq!(root_msg.by_name("second"), Some(&FieldValue::Int(1)));

    // Graph level: reference identity between the two fields.
    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    let pair = decoded.downcast_ref::<SharedPair>().expect("SharedPair");
    assert!(Rc::ptr_eq(&pair.first, &pair.second));
    assert_eq!(pair.first.label, "shared");
    Ok(())
}

/// A cycle among inlined objects is detected and fails the encode.
#[test]
fn test_inline_cycle_detected() {
    let context = Context::new();
    let registry = demo_registry();

    let a = Rc::new(InlineNode {
        label: "a".into(),
        next: RefCell::new(None),
    });
    let b = Rc::new(InlineNode {
        label: "b".into(),
        next: RefCell::new(Some(a.clone() as GraphObj)),
    });
    a.next.replace(Some(b as GraphObj));

    let root: GraphObj = a;
    let mut sink = Vec::new();
    assert!(matches!(
        context.serialize_graph(&registry, &root, 0, &mut sink),
        Err(TagwireError::InlineCycle)
    ));
}

/// An acyclic inline chain is fine.
#[test]
fn test_inline_chain() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let c = Rc::new(InlineNode {
        label: "c".into(),
        next: RefCell::new(None),
    });
    let b = Rc::new(InlineNode {
        label: "b".into(),
        next: RefCell::new(Some(c as GraphObj)),
    });
    let a = Rc::new(InlineNode {
        label: "a".into(),
        next: RefCell::new(Some(b as GraphObj)),
    });

    let root: GraphObj = a;
    let wire = encode_graph(&context, &registry, &root)?;
    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;

    let a = decoded.downcast_ref::<InlineNode>().expect("InlineNode");
    let b_obj = a.next.borrow().clone().expect("a.next");
    let b = b_obj.downcast_ref::<InlineNode>().expect("InlineNode");
    assert_eq!(b.label, "b");
    Ok(())
}

/// A cycle through reference-eligible fields encodes as a back-reference,
/// not an error. Decoding it fails cleanly: the target is still in flight
/// when the reference is resolved, and no placeholder is pre-published.
#[test]
fn test_reference_cycle_encodes_as_back_reference() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let a = Rc::new(RefNode {
        label: "a".into(),
        next: RefCell::new(None),
    });
    let b = Rc::new(RefNode {
        label: "b".into(),
        next: RefCell::new(Some(a.clone() as GraphObj)),
    });
    a.next.replace(Some(b as GraphObj));

    let root: GraphObj = a;
    let wire = encode_graph(&context, &registry, &root)?;

    // b sits inline at index 1 and points back at a: 0 - 1 = -1.
    let envelope = context.deserialize_bytes(&wire)?;
    let a_msg = envelope
        .message
        .field_at(0)
        .and_then(|f| f.value().as_message())
        .expect("root message");
    let b_msg = a_msg
        .by_name("next")
        .and_then(FieldValue::as_message)
        .expect("b inline");
    assert_eq!(b_msg.by_name("next"), Some(&FieldValue::Int(-1)));

    assert!(matches!(
        context.deserialize_graph(&registry, &mut wire.as_slice()),
        Err(TagwireError::MalformedEnvelope(_))
    ));
    Ok(())
}

/// Repeated type: one type-name chain, N-1 integer deltas, identical types
/// after decoding.
#[test]
fn test_repeated_type_deltas() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = Rc::new(Team {
        members: vec![leaf("m1"), leaf("m2"), leaf("m3")],
    });
    let wire = encode_graph(&context, &registry, &root)?;

    let envelope = context.deserialize_bytes(&wire)?;
    let mut names = Vec::new();
    let mut deltas = Vec::new();
    collect_type_fields(&envelope.message, &mut names, &mut deltas);

    assert_eq!(
        names.iter().filter(|n| n.as_str() == "demo.Leaf").count(),
        1
    );
    assert_eq!(deltas, vec![-1, -1]);

    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    let team = decoded.downcast_ref::<Team>().expect("Team");
    let labels: Vec<&str> = team.members.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, ["m1", "m2", "m3"]);
    Ok(())
}

/// Re-emitting an inlined object updates the id map to the later index, so
/// the following back-reference resolves to the most recent copy.
#[test]
fn test_re_emission_updates_id_map() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = Rc::new(ReEmit {
        one: leaf("again"),
        two: leaf("unused"),
        by_ref: leaf("unused"),
    });
    let wire = encode_graph(&context, &registry, &root)?;

    // The ref is relative to the root container: latest emission is index 2.
    let envelope = context.deserialize_bytes(&wire)?;
    let root_msg = envelope
        .message
        .field_at(0)
        .and_then(|f| f.value().as_message())
        .expect("root message");
    assert_eq!(root_msg.by_name("by_ref"), Some(&FieldValue::Int(2)));

    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    let node = decoded.downcast_ref::<ReEmit>().expect("ReEmit");
    assert!(Rc::ptr_eq(&node.two, &node.by_ref));
    assert!(!Rc::ptr_eq(&node.one, &node.two));
    Ok(())
}

/// Queued objects drain FIFO as top-level siblings after the root message.
#[test]
fn test_queue_drains_fifo() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = Rc::new(Catalog {
        extras: vec![leaf("q1"), leaf("q2"), leaf("q3")],
    });
    let wire = encode_graph(&context, &registry, &root)?;

    let envelope = context.deserialize_bytes(&wire)?;
    assert_eq!(envelope.message.len(), 4);
    let queued_labels: Vec<String> = envelope.message.fields()[1..]
        .iter()
        .filter_map(|f| f.value().as_message())
        .filter_map(|m| m.by_name("label").and_then(FieldValue::as_str))
        .map(str::to_owned)
        .collect();
    assert_eq!(queued_labels, ["q1", "q2", "q3"]);

    // Deserialization walks every sibling and still returns index 0.
    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    assert!(decoded.downcast_ref::<Catalog>().is_some());
    Ok(())
}

/// An object both queued and referenced is emitted exactly once.
#[test]
fn test_queue_skips_already_emitted() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = Rc::new(QueueAndRef { leaf: leaf("once") });
    let wire = encode_graph(&context, &registry, &root)?;

    // The reference inlined the leaf inside the root; the queue drain must
    // not emit a second copy.
    let envelope = context.deserialize_bytes(&wire)?;
    assert_eq!(envelope.message.len(), 1);

    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    let node = decoded.downcast_ref::<QueueAndRef>().expect("QueueAndRef");
    assert_eq!(node.leaf.label, "once");
    Ok(())
}

/// The streaming facade rejects readback with InvalidFacadeOperation.
#[test]
fn test_facade_is_write_only() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = Rc::new(ReadbackProbe);
    let wire = encode_graph(&context, &registry, &root)?;
    let decoded = context.deserialize_graph(&registry, &mut wire.as_slice())?;
    assert!(decoded.downcast_ref::<ReadbackProbe>().is_some());
    Ok(())
}

/// Encoding a type with no surrogate fails up front.
#[test]
fn test_unregistered_type_on_encode() {
    let context = Context::new();
    let registry = demo_registry();

    struct Stranger;
    let root: GraphObj = Rc::new(Stranger);
    let mut sink = Vec::new();
    assert!(matches!(
        context.serialize_graph(&registry, &root, 0, &mut sink),
        Err(TagwireError::UnregisteredObjectType(_))
    ));
}

/// Decoding against a registry that lacks the wire name reports it.
#[test]
fn test_unregistered_type_on_decode() -> tagwire::Result<()> {
    let context = Context::new();
    let registry = demo_registry();

    let root: GraphObj = leaf("lonely");
    let wire = encode_graph(&context, &registry, &root)?;

    let empty = SurrogateRegistry::new();
    match context.deserialize_graph(&empty, &mut wire.as_slice()) {
        Err(TagwireError::UnregisteredObjectType(name)) => assert_eq!(name, "demo.Leaf"),
        Err(other) => panic!("expected UnregisteredObjectType, got {other:?}"),
        Ok(_) => panic!("expected UnregisteredObjectType, got a decoded object"),
    }
    Ok(())
}

/// A type registered under a chain of names falls back to the first name the
/// decoder's registry recognizes.
#[test]
fn test_type_name_chain_fallback() -> tagwire::Result<()> {
    let context = Context::new();

    let mut writer_registry = SurrogateRegistry::new();
    writer_registry.register::<Leaf>(&["demo.LeafV2", "demo.Leaf"], LeafSurrogate);

    let root: GraphObj = leaf("portable");
    let mut wire = Vec::new();
    context.serialize_graph(&writer_registry, &root, 0, &mut wire)?;

    // The reader only knows the older name, second in the chain.
    let mut reader_registry = SurrogateRegistry::new();
    reader_registry.register::<Leaf>(&["demo.Leaf"], LeafSurrogate);

    let decoded = context.deserialize_graph(&reader_registry, &mut wire.as_slice())?;
    let restored = decoded.downcast_ref::<Leaf>().expect("Leaf");
    assert_eq!(restored.label, "portable");
    Ok(())
}
