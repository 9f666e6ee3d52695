//! Graph marshaller: self-describing, cycle-safe binary frames.
//!
//! Node layout (depth-first from the root):
//!
//! ```text
//! [presence u8]                      0 = absent, stop here
//! [back-ref u8]                      1 = seen before:
//!     [handle i32]                       index into this session's table
//!                                    0 = new node:
//!     [type name str][field count i32]
//!     {[field name str][declared type str]} x N
//!     {field value} x N
//! ```
//!
//! A new node takes the next handle *before* its fields are written or read,
//! so a field pointing back at an ancestor resolves to that handle. Handle
//! tables live in a per-call session and never span two frames. The finished
//! body is sealed with the parity trailer from [`crate::integrity`].

pub mod graph;
pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{Result, RpcError};
use crate::integrity;

pub use graph::{Node, NodeId, ObjectGraph, Value};
pub use schema::{FieldDef, FieldType, Schema, TypeDef};

const ABSENT: u8 = 0;
const PRESENT: u8 = 1;
const NEW_NODE: u8 = 0;
const BACK_REF: u8 = 1;

/// Nesting limit for both directions. Encode refuses deeper graphs so every
/// frame it emits decodes; decode rejects deeper frames as malformed.
pub const MAX_DEPTH: usize = 128;

/// Typed values that map onto graph nodes through an explicit field table.
pub trait Persist: Sized {
    fn type_def() -> TypeDef;

    /// Add `self` (and anything it owns) to `graph`, returning its node.
    fn store(&self, graph: &mut ObjectGraph) -> Result<NodeId>;

    /// Rebuild a value from a decoded node.
    fn load(graph: &ObjectGraph, id: NodeId) -> Result<Self>;
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub graph: ObjectGraph,
    pub root: Option<NodeId>,
}

/// Encoder/decoder bound to a schema. Cheap to clone; holds no session state.
#[derive(Debug, Clone)]
pub struct Marshaller {
    schema: Arc<Schema>,
}

impl Marshaller {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encode the graph reachable from `root` into a sealed frame.
    pub fn encode(&self, graph: &ObjectGraph, root: Option<NodeId>) -> Result<Bytes> {
        let mut session = EncodeSession {
            schema: &self.schema,
            graph,
            out: ByteWriter::new(),
            handles: HashMap::new(),
        };
        session.write_node(root, 0)?;

        let mut frame = session.out.into_bytes().to_vec();
        integrity::seal(&mut frame);
        Ok(Bytes::from(frame))
    }

    /// Verify the trailer and rebuild the graph.
    pub fn decode(&self, frame: &[u8]) -> Result<Decoded> {
        let body = integrity::verify(frame)?;
        let mut session = DecodeSession {
            schema: &self.schema,
            graph: ObjectGraph::new(),
            input: ByteReader::new(body.to_vec()),
            table: Vec::new(),
        };
        let root = session.read_node(0)?;
        if session.input.remaining() != 0 {
            return Err(RpcError::Framing(format!(
                "{} trailing bytes after root node",
                session.input.remaining()
            )));
        }
        tracing::trace!(nodes = session.graph.len(), bytes = frame.len(), "frame decoded");
        Ok(Decoded {
            graph: session.graph,
            root,
        })
    }

    pub fn encode_value<T: Persist>(&self, value: &T) -> Result<Bytes> {
        let mut graph = ObjectGraph::new();
        let root = value.store(&mut graph)?;
        self.encode(&graph, Some(root))
    }

    pub fn decode_value<T: Persist>(&self, frame: &[u8]) -> Result<T> {
        let decoded = self.decode(frame)?;
        let root = decoded.root.ok_or_else(|| {
            RpcError::Schema(format!("expected {}, frame holds null", T::type_def().name))
        })?;
        T::load(&decoded.graph, root)
    }
}

struct EncodeSession<'a> {
    schema: &'a Schema,
    graph: &'a ObjectGraph,
    out: ByteWriter,
    handles: HashMap<NodeId, i32>,
}

impl EncodeSession<'_> {
    fn write_node(&mut self, id: Option<NodeId>, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(RpcError::Framing(format!("nesting deeper than {MAX_DEPTH}")));
        }
        let Some(id) = id else {
            self.out.write_byte(ABSENT);
            return Ok(());
        };
        self.out.write_byte(PRESENT);

        if let Some(&handle) = self.handles.get(&id) {
            self.out.write_byte(BACK_REF);
            self.out.write_i32(handle);
            return Ok(());
        }
        self.out.write_byte(NEW_NODE);
        let handle = i32::try_from(self.handles.len())
            .map_err(|_| RpcError::Framing("too many nodes in one frame".into()))?;
        self.handles.insert(id, handle);

        let (graph, schema) = (self.graph, self.schema);
        let node = graph.node(id)?;
        let def = schema.resolve(&node.type_name)?;
        if node.fields.len() != def.fields.len() {
            return Err(RpcError::Schema(format!(
                "node of type {} has {} fields, schema declares {}",
                def.name,
                node.fields.len(),
                def.fields.len()
            )));
        }

        self.out.write_string(&def.name)?;
        self.out.write_i32(def.persisted_count() as i32);
        for (_, f) in def.persisted() {
            self.out.write_string(&f.name)?;
            self.out.write_string(&f.ty.wire_name())?;
        }
        for (i, f) in def.persisted() {
            let (name, value) = &node.fields[i];
            if name != &f.name || !value.conforms_to(&f.ty) {
                return Err(RpcError::Schema(format!(
                    "field {}.{} does not match its declared type {}",
                    def.name,
                    f.name,
                    f.ty.wire_name()
                )));
            }
            self.write_value(value, &f.ty, depth)?;
        }
        Ok(())
    }

    fn write_value(&mut self, value: &Value, ty: &FieldType, depth: usize) -> Result<()> {
        match (value, ty) {
            (Value::Bool(v), _) => self.out.write_byte(u8::from(*v)),
            (Value::Byte(v), _) => self.out.write_byte(*v as u8),
            (Value::Int(v), _) => self.out.write_i32(*v),
            (Value::Long(v), _) => self.out.write_i64(*v),
            (Value::Double(v), _) => self.out.write_f64(*v),
            (Value::Str(None), _) => self.out.write_byte(ABSENT),
            (Value::Str(Some(s)), _) => {
                self.out.write_byte(PRESENT);
                self.out.write_string(s)?;
            }
            (Value::Array(None), _) => self.out.write_i32(-1),
            (Value::Array(Some(items)), FieldType::Array(elem)) => {
                let len = i32::try_from(items.len())
                    .map_err(|_| RpcError::Framing("array too long".into()))?;
                self.out.write_i32(len);
                for item in items {
                    self.write_value(item, elem, depth + 1)?;
                }
            }
            (Value::Ref(id), _) => self.write_node(*id, depth + 1)?,
            (Value::Array(Some(_)), other) => {
                return Err(RpcError::Schema(format!(
                    "array value declared as {}",
                    other.wire_name()
                )))
            }
        }
        Ok(())
    }
}

struct DecodeSession<'a> {
    schema: &'a Schema,
    graph: ObjectGraph,
    input: ByteReader,
    table: Vec<NodeId>,
}

impl DecodeSession<'_> {
    fn read_node(&mut self, depth: usize) -> Result<Option<NodeId>> {
        if depth > MAX_DEPTH {
            return Err(RpcError::Framing(format!("nesting deeper than {MAX_DEPTH}")));
        }
        match self.input.read_byte()? {
            ABSENT => return Ok(None),
            PRESENT => {}
            other => return Err(RpcError::Framing(format!("bad presence flag {other}"))),
        }
        match self.input.read_byte()? {
            BACK_REF => {
                let handle = self.input.read_i32()?;
                let id = usize::try_from(handle)
                    .ok()
                    .and_then(|h| self.table.get(h).copied())
                    .ok_or_else(|| RpcError::Framing(format!("unknown handle {handle}")))?;
                return Ok(Some(id));
            }
            NEW_NODE => {}
            other => return Err(RpcError::Framing(format!("bad back-reference flag {other}"))),
        }

        let type_name = self.input.read_string()?;
        let schema = self.schema;
        let def = schema.resolve(&type_name)?;

        // Register before reading fields so back-references to this node resolve.
        let id = self.graph.instantiate(def);
        self.table.push(id);

        let count = self.input.read_i32()?;
        let count = usize::try_from(count)
            .map_err(|_| RpcError::Framing(format!("negative field count {count}")))?;
        if count != def.persisted_count() {
            return Err(RpcError::Schema(format!(
                "type {type_name}: frame carries {count} fields, receiver expects {}",
                def.persisted_count()
            )));
        }

        let mut layout: Vec<(usize, FieldType)> = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.input.read_string()?;
            let declared = FieldType::parse_wire_name(&self.input.read_string()?)?;
            let slot = def
                .index_of(&name)
                .filter(|&i| !def.fields[i].transient)
                .ok_or_else(|| {
                    RpcError::Schema(format!("type {type_name} has no field {name}"))
                })?;
            if layout.iter().any(|(i, _)| *i == slot) {
                return Err(RpcError::Schema(format!(
                    "type {type_name}: field {name} repeated"
                )));
            }
            if declared != def.fields[slot].ty {
                return Err(RpcError::Schema(format!(
                    "type {type_name}: field {name} is {} on the wire, {} here",
                    declared.wire_name(),
                    def.fields[slot].ty.wire_name()
                )));
            }
            layout.push((slot, declared));
        }

        for (slot, ty) in layout {
            let value = self.read_value(&ty, depth)?;
            let name = def.fields[slot].name.clone();
            self.graph.set(id, &name, value)?;
        }
        Ok(Some(id))
    }

    fn read_value(&mut self, ty: &FieldType, depth: usize) -> Result<Value> {
        Ok(match ty {
            FieldType::Bool => Value::Bool(self.input.read_byte()? != 0),
            FieldType::Byte => Value::Byte(self.input.read_byte()? as i8),
            FieldType::Int => Value::Int(self.input.read_i32()?),
            FieldType::Long => Value::Long(self.input.read_i64()?),
            FieldType::Double => Value::Double(self.input.read_f64()?),
            FieldType::Str => match self.input.read_byte()? {
                ABSENT => Value::Str(None),
                PRESENT => Value::Str(Some(self.input.read_string()?)),
                other => return Err(RpcError::Framing(format!("bad string presence flag {other}"))),
            },
            FieldType::Array(elem) => {
                let len = self.input.read_i32()?;
                if len == -1 {
                    return Ok(Value::Array(None));
                }
                let len = usize::try_from(len)
                    .map_err(|_| RpcError::Framing(format!("bad array length {len}")))?;
                // every element takes at least one byte
                if len > self.input.remaining() {
                    return Err(RpcError::Framing(format!(
                        "array of {len} elements exceeds remaining {} bytes",
                        self.input.remaining()
                    )));
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_value(elem, depth + 1)?);
                }
                Value::Array(Some(items))
            }
            FieldType::Object(_) => Value::Ref(self.read_node(depth + 1)?),
        })
    }
}
