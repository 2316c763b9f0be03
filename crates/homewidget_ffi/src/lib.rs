//! Flutter-facing FFI surface for the widget core.

pub mod api;
