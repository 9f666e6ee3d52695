//! Dispatch loop body and the handler seam.
//!
//! Re-exports the dispatcher and handler types so the transport and the
//! services can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{
    CallContext, Dispatched, Dispatcher, Disposition, HandlerOutcome, OperationHandler,
};
