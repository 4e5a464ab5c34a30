//! SQL Server integration and connection bridging for the Runar ecosystem.
//!
//! # Intention
//!
//! - Own a table of live database sessions keyed by opaque integer
//!   handles, so callers never manage raw driver connections.
//! - Serialize driver result sets into transport-neutral rows.
//! - Dispatch every operation onto its own task so one slow database
//!   call never stalls the others.
//!
//! # Architectural Boundaries
//!
//! - Only SQL Server bridging code belongs here: sessions, dispatch, row
//!   serialization, and their error taxonomy.
//! - Callers bring their own transport and marshaling; this crate speaks
//!   typed [`Request`]s or method-name-plus-JSON calls and returns
//!   [`Payload`]s or structured [`BridgeError`]s.

pub mod bridge;
pub mod error;
pub mod registry;
pub mod request;
pub mod session;
pub mod value;

pub use bridge::{Bridge, BridgeConfig, ConnectedPayload, Payload};
pub use error::{BridgeError, BridgeResult, ErrorPayload};
pub use registry::{ConnectionId, SessionRegistry, SessionSlot};
pub use request::Request;
pub use session::{ConnectionParams, MssqlSession, ResultSet, Row};
pub use value::CellValue;
