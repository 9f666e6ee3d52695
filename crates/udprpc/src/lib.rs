//! Top-level facade crate for udprpc.
//!
//! Re-exports the core wire types and the server runtime so users can depend on a single crate.

pub mod core {
    pub use udprpc_core::*;
}

pub mod server {
    pub use udprpc_server::*;
}
