//! Core types for lazyql.
//!
//! This crate provides the foundational types shared by the schema and runtime crates:
//! - `selection`: Selection nodes and the interning selection manager

pub mod selection;

pub use selection::{
    ArgTypes, ArgValues, Selection, SelectionId, SelectionKey, SelectionManager, SelectionSpec,
    SelectionType,
};
