//! Arena-backed object graphs.
//!
//! Composite nodes live in an [`ObjectGraph`] and refer to each other by
//! [`NodeId`]. The id is the node's identity: two nodes with equal fields are
//! still distinct, and a field may point back at an ancestor to form a cycle.

use crate::error::{Result, RpcError};
use crate::marshal::schema::{FieldType, TypeDef};

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A field or array element value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Option<String>),
    Array(Option<Vec<Value>>),
    Ref(Option<NodeId>),
}

impl Value {
    /// Zero value for a declared type: `false`/`0` for primitives, absent otherwise.
    pub fn zero(ty: &FieldType) -> Self {
        match ty {
            FieldType::Bool => Value::Bool(false),
            FieldType::Byte => Value::Byte(0),
            FieldType::Int => Value::Int(0),
            FieldType::Long => Value::Long(0),
            FieldType::Double => Value::Double(0.0),
            FieldType::Str => Value::Str(None),
            FieldType::Array(_) => Value::Array(None),
            FieldType::Object(_) => Value::Ref(None),
        }
    }

    /// Shape check against a declared type (element types checked recursively).
    pub fn conforms_to(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Value::Bool(_), FieldType::Bool)
            | (Value::Byte(_), FieldType::Byte)
            | (Value::Int(_), FieldType::Int)
            | (Value::Long(_), FieldType::Long)
            | (Value::Double(_), FieldType::Double)
            | (Value::Str(_), FieldType::Str)
            | (Value::Ref(_), FieldType::Object(_)) => true,
            (Value::Array(None), FieldType::Array(_)) => true,
            (Value::Array(Some(items)), FieldType::Array(elem)) => {
                items.iter().all(|v| v.conforms_to(elem))
            }
            _ => false,
        }
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Some(s.into()))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// `Some(None)` for a null string, `None` when the value is not a string.
    pub fn as_str(&self) -> Option<Option<&str>> {
        match self {
            Value::Str(v) => Some(v.as_deref()),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<Option<NodeId>> {
        match self {
            Value::Ref(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<Option<&[Value]>> {
        match self {
            Value::Array(v) => Some(v.as_deref()),
            _ => None,
        }
    }
}

/// One composite instance: its type name and field values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Node {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Arena of composite nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a zero-initialized instance of `def`.
    pub fn instantiate(&mut self, def: &TypeDef) -> NodeId {
        let fields = def
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::zero(&f.ty)))
            .collect();
        self.nodes.push(Node {
            type_name: def.name.clone(),
            fields,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| RpcError::Internal(format!("dangling node id {}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| RpcError::Internal(format!("dangling node id {}", id.0)))
    }

    pub fn field(&self, id: NodeId, name: &str) -> Result<&Value> {
        let node = self.node(id)?;
        node.get(name).ok_or_else(|| {
            RpcError::Schema(format!("type {} has no field {name}", node.type_name))
        })
    }

    /// Overwrite a field; the slot must exist and keep its variant.
    pub fn set(&mut self, id: NodeId, name: &str, value: Value) -> Result<()> {
        let node = self.node_mut(id)?;
        let type_name = node.type_name.clone();
        let slot = node
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| RpcError::Schema(format!("type {type_name} has no field {name}")))?;
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            return Err(RpcError::Schema(format!(
                "field {type_name}.{name} cannot hold {value:?}"
            )));
        }
        *slot = value;
        Ok(())
    }

    pub fn int(&self, id: NodeId, name: &str) -> Result<i32> {
        self.field(id, name)?
            .as_int()
            .ok_or_else(|| RpcError::Schema(format!("field {name} is not an int")))
    }

    pub fn string(&self, id: NodeId, name: &str) -> Result<Option<String>> {
        self.field(id, name)?
            .as_str()
            .map(|s| s.map(str::to_owned))
            .ok_or_else(|| RpcError::Schema(format!("field {name} is not a string")))
    }

    pub fn reference(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        self.field(id, name)?
            .as_ref_id()
            .ok_or_else(|| RpcError::Schema(format!("field {name} is not a reference")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn link_def() -> TypeDef {
        TypeDef::new("Link")
            .field("label", FieldType::Str)
            .field("next", FieldType::object("Link"))
    }

    #[test]
    fn instantiate_is_zeroed() {
        let mut g = ObjectGraph::new();
        let id = g.instantiate(&link_def());
        assert_eq!(g.field(id, "label").unwrap(), &Value::Str(None));
        assert_eq!(g.field(id, "next").unwrap(), &Value::Ref(None));
    }

    #[test]
    fn set_rejects_wrong_variant_and_unknown_field() {
        let mut g = ObjectGraph::new();
        let id = g.instantiate(&link_def());
        assert!(g.set(id, "label", Value::Int(3)).is_err());
        assert!(g.set(id, "missing", Value::Int(3)).is_err());
        g.set(id, "next", Value::Ref(Some(id))).unwrap();
        assert_eq!(g.reference(id, "next").unwrap(), Some(id));
    }

    #[test]
    fn conformance_checks_array_elements() {
        let ints = FieldType::array_of(FieldType::Int);
        assert!(Value::Array(None).conforms_to(&ints));
        assert!(Value::Array(Some(vec![Value::Int(1)])).conforms_to(&ints));
        assert!(!Value::Array(Some(vec![Value::Long(1)])).conforms_to(&ints));
    }
}
