//! Persistence queries over a borrowed connection.
//!
//! Services acquire one pooled connection per operation and pass it down;
//! nothing here opens connections or transactions of its own.

pub mod appointments;
pub mod users;
