//! Core contracts for wes: the pluggable secret-store seam consumed by
//! the credential security crates. Intentionally small to keep
//! dependency surface minimal.

pub mod secrets;
