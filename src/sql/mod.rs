//! SQL surface (spec §6): statement dispatch, session state, and the
//! scan-operator selection glue sitting between the catalog and the
//! execution operators in `crate::execution`.

pub mod handler;
pub mod planner;
pub mod session;

pub use handler::{execute, QueryResult};
pub use session::Session;
