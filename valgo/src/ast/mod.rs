//! Source syntax tree
//!
//! The parser hands these trees over already well-formed. Types inside the
//! tree use the shared [`crate::types::Type`] model; a type parameter is
//! written as an unqualified leaf (`Type::basic("T")`).

pub mod build;
mod check;
mod expr;
mod span;

pub use check::check_types;
pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// A compilation unit: one package worth of declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub package: String,
    pub decls: Vec<Spanned<Decl>>,
}

/// Top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Val(ValDecl),
    Func(FuncDecl),
    Struct(StructDecl),
    Sealed(SealedDecl),
    TypeAlias(TypeAlias),
}

/// `val name: T = value` or `var name: T = value`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValDecl {
    pub name: Spanned<String>,
    /// `var` when true, `val` otherwise
    pub mutable: bool,
    pub ty: Option<Type>,
    pub value: Spanned<Expr>,
}

/// Generic type parameter with an optional constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Option<Type>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Type,
}

/// Method receiver: `(b Box[T])`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    pub ty: Type,
}

/// Function or method definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    /// `None` for functions evaluated for effect only
    pub result: Option<Type>,
    pub body: Spanned<Expr>,
    pub span: Span,
}

/// Struct field; fields are value bindings unless declared `var`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructField {
    pub name: Spanned<String>,
    pub ty: Type,
    pub mutable: bool,
}

/// Struct (case-class style) definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<StructField>,
    pub span: Span,
}

/// Closed variant set: `sealed type Shape { case Circle(r: float64) ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedDecl {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub variants: Vec<Variant>,
    pub span: Span,
}

/// One constructible shape of a sealed type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: Spanned<String>,
    pub fields: Vec<StructField>,
}

/// `type Name[T] = Target`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAlias {
    pub name: Spanned<String>,
    pub type_params: Vec<TypeParam>,
    pub ty: Type,
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Val(v) => &v.name.node,
            Decl::Func(f) => &f.name.node,
            Decl::Struct(s) => &s.name.node,
            Decl::Sealed(s) => &s.name.node,
            Decl::TypeAlias(a) => &a.name.node,
        }
    }
}
