//! Per-message-type cell layout.
//!
//! Every message cell is laid out from a [`LayoutConfig`] picked by the
//! message kind and its direction. Entries start from a per-direction base
//! and override only the fields that differ, so a custom theme can adjust a
//! single kind without touching the rest.

mod model;
mod table;

pub use model::{Direction, EdgeInsets, LayoutConfig, MessageKind, Size};
pub use table::LayoutTable;
