//! Request-scoped identity types shared between the server's auth layer, the gateway's
//! client-identification layer, and everything downstream that needs to know who's calling.

mod authentication;
mod client_identity;

pub use authentication::{Authentication, Claims, GatewayToken};
pub use client_identity::ClientIdentity;
