//! valgo: semantic lowering for a Scala-like language targeting Go
//!
//! Takes a parsed source tree plus metadata about imported packages and
//! produces a target tree in which immutability, pattern matching and
//! generic methods have been expressed with plain Go constructs and the
//! `valgo/std` runtime package.

pub mod ast;
pub mod config;
pub mod error;
pub mod immut;
pub mod infer;
pub mod lower;
pub mod metadata;
pub mod names;
pub mod pattern;
pub mod scope;
pub mod specialize;
pub mod target;
pub mod types;
pub mod util;

pub use ast::Span;
pub use config::LowerConfig;
pub use error::{CompileError, Result};
pub use lower::lower_program;
pub use metadata::Metadata;
