//! Postgres wire-protocol front end (spec §6 "External interface:
//! Postgres wire protocol v3, simple query flow only").

pub mod pg_handler;
