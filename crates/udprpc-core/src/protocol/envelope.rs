//! The three-field message shared by requests, responses and notifications.

use std::fmt;

use crate::error::Result;
use crate::marshal::{FieldType, NodeId, ObjectGraph, Persist, TypeDef, Value};
use crate::protocol::operation::Operation;

/// Wire type name of [`Envelope`].
pub const ENVELOPE_TYPE: &str = "Server.RequestMessage";

const F_OP: &str = "requestType";
const F_ID: &str = "requestID";
const F_DATA: &str = "data";

/// Immutable request/response message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Envelope {
    op_code: i32,
    request_id: i32,
    payload: String,
}

impl Envelope {
    pub fn new(op: Operation, request_id: i32, payload: impl Into<String>) -> Self {
        Self::from_raw(op.code(), request_id, payload)
    }

    /// Keeps the raw code as received, even when it is not a known operation.
    pub fn from_raw(op_code: i32, request_id: i32, payload: impl Into<String>) -> Self {
        Self {
            op_code,
            request_id,
            payload: payload.into(),
        }
    }

    pub fn op_code(&self) -> i32 {
        self.op_code
    }

    pub fn operation(&self) -> Operation {
        Operation::from_code(self.op_code)
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    /// Comma-separated microformat owned by the handler.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Reply carrying the same operation and request id.
    pub fn reply(&self, payload: impl Into<String>) -> Self {
        Self::from_raw(self.op_code, self.request_id, payload)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} {:?}",
            self.operation(),
            self.request_id,
            self.payload
        )
    }
}

impl Persist for Envelope {
    fn type_def() -> TypeDef {
        TypeDef::new(ENVELOPE_TYPE)
            .field(F_OP, FieldType::Int)
            .field(F_ID, FieldType::Int)
            .field(F_DATA, FieldType::Str)
    }

    fn store(&self, graph: &mut ObjectGraph) -> Result<NodeId> {
        let id = graph.instantiate(&Self::type_def());
        graph.set(id, F_OP, Value::Int(self.op_code))?;
        graph.set(id, F_ID, Value::Int(self.request_id))?;
        graph.set(id, F_DATA, Value::str(self.payload.as_str()))?;
        Ok(id)
    }

    /// A null payload reads back as the empty string.
    fn load(graph: &ObjectGraph, id: NodeId) -> Result<Self> {
        Ok(Self {
            op_code: graph.int(id, F_OP)?,
            request_id: graph.int(id, F_ID)?,
            payload: graph.string(id, F_DATA)?.unwrap_or_default(),
        })
    }
}
