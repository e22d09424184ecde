//! Decode and encode plans for tagged sum types.
//!
//! A [`decl::SumTypeDecl`] describes the cases of a sum type and where its
//! tag lives. [`plan::assemble`] turns it into a [`plan::Plan`], which
//! [`runtime`] executes against JSON documents.
pub mod case;
pub mod cli;
pub mod decl;
pub mod error;
pub mod ir;
pub mod keys;
pub mod plan;
pub mod runtime;
pub mod switcher;
pub mod tree;
pub mod variable;

pub use decl::SumTypeDecl;
pub use error::{AssemblyError, DecodeError, Diagnostic, EncodeError};
pub use plan::{Assembly, Plan, assemble};
pub use runtime::{EnumValue, decode, encode};
