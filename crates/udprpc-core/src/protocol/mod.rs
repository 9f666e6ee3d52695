//! Request/response envelope and the operation model.
//!
//! Every datagram carries exactly one [`Envelope`] encoded by the graph
//! marshaller. Decoding is panic-free: malformed input is reported as
//! `RpcError` so the dispatch loop can answer with an error reply instead of
//! crashing on hostile traffic.

pub mod envelope;
pub mod operation;

pub use envelope::{Envelope, ENVELOPE_TYPE};
pub use operation::Operation;

use crate::error::Result;
use crate::marshal::{Marshaller, Persist, Schema};

/// Schema holding every type that may appear on the wire.
pub fn wire_schema() -> Result<Schema> {
    let mut schema = Schema::new();
    schema.register(Envelope::type_def())?;
    Ok(schema)
}

/// Marshaller over [`wire_schema`].
pub fn wire_marshaller() -> Result<Marshaller> {
    Ok(Marshaller::new(wire_schema()?))
}
