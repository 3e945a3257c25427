//! Utility modules for xmlweave.
//!
//! Contains the string interning dictionary backing the name registry.

pub mod dict;
