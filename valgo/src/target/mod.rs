//! Target syntax tree
//!
//! The lowered program in the target language's own abstract syntax:
//! every type reference concrete or explicitly parameterized, every
//! immutability wrapper explicit, every match reduced to plain conditionals.
//! The external generator owns formatting; [`display`] only renders a
//! readable approximation for debugging and tests.

pub mod display;

use serde::{Deserialize, Serialize};

pub use crate::ast::{BinOp, UnOp};
use crate::types::Type;

/// A lowered compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraint: Type,
}

/// Named and typed slot: parameter, receiver or struct field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Func(FuncDecl),
    Struct {
        name: String,
        type_params: Vec<TypeParam>,
        fields: Vec<Field>,
    },
    Alias {
        name: String,
        type_params: Vec<TypeParam>,
        ty: Type,
    },
    Var {
        name: String,
        ty: Option<Type>,
        value: Option<Expr>,
    },
    Const {
        name: String,
        ty: Option<Type>,
        value: Expr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    /// Methods carry a receiver; an anonymous receiver has an empty name
    pub receiver: Option<Field>,
    pub params: Vec<Field>,
    pub results: Vec<Type>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `a, b := x, y`
    Define { names: Vec<String>, values: Vec<Expr> },
    /// `var name T = value`
    Var {
        name: String,
        ty: Type,
        value: Option<Expr>,
    },
    /// `a = b` or `a op= b`
    Assign {
        targets: Vec<Expr>,
        op: Option<BinOp>,
        values: Vec<Expr>,
    },
    Expr(Expr),
    Return(Vec<Expr>),
    /// `if cond { then } else { els }`; an empty `els` has no else branch
    If {
        cond: Expr,
        then: Vec<Stmt>,
        els: Vec<Stmt>,
    },
    /// `for cond { body }`; no condition loops forever
    For { cond: Option<Expr>, body: Vec<Stmt> },
    Block(Vec<Stmt>),
}

impl Stmt {
    pub fn define(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Define {
            names: vec![name.into()],
            values: vec![value],
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            op: None,
            values: vec![value],
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(vec![value])
    }

    /// True when control never falls off the end of this statement
    pub fn is_terminating(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::Expr(Expr::Call { fun, .. }) => {
                matches!(fun.as_ref(), Expr::Ident(name) if name == "panic")
            }
            Stmt::If { then, els, .. } => {
                !els.is_empty() && terminates(then) && terminates(els)
            }
            Stmt::For { cond: None, .. } => true,
            Stmt::Block(stmts) => terminates(stmts),
            _ => false,
        }
    }
}

/// True when the statement list ends in a terminating statement
pub fn terminates(stmts: &[Stmt]) -> bool {
    stmts.last().map(Stmt::is_terminating).unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    Bool(bool),
    Nil,
}

/// Composite literal element, keyed for structs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub key: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident(String),
    Lit(Lit),
    /// A type in expression position, e.g. the callee of a conversion
    Type(Type),
    Selector {
        x: Box<Expr>,
        sel: String,
    },
    Call {
        fun: Box<Expr>,
        type_args: Vec<Type>,
        args: Vec<Expr>,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        x: Box<Expr>,
    },
    FuncLit {
        params: Vec<Field>,
        results: Vec<Type>,
        body: Vec<Stmt>,
    },
    /// `T{k: v, ...}`
    Composite {
        ty: Type,
        elts: Vec<Element>,
    },
    /// Checked downcast `x.(T)`
    TypeAssert {
        x: Box<Expr>,
        ty: Type,
    },
    Paren(Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn int(n: i64) -> Self {
        Expr::Lit(Lit::Int(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Lit(Lit::String(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Lit(Lit::Bool(b))
    }

    pub fn select(x: Expr, sel: impl Into<String>) -> Self {
        Expr::Selector {
            x: Box::new(x),
            sel: sel.into(),
        }
    }

    /// `pkg.name` with an empty package meaning the bare name
    pub fn qualified(package: &str, name: impl Into<String>) -> Self {
        if package.is_empty() {
            Expr::Ident(name.into())
        } else {
            Expr::select(Expr::ident(package), name)
        }
    }

    pub fn call(fun: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            fun: Box::new(fun),
            type_args: vec![],
            args,
        }
    }

    pub fn call_generic(fun: Expr, type_args: Vec<Type>, args: Vec<Expr>) -> Self {
        Expr::Call {
            fun: Box::new(fun),
            type_args,
            args,
        }
    }

    /// `recv.name(args)`
    pub fn method(recv: Expr, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::call(Expr::select(recv, name), args)
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(x: Expr) -> Self {
        Expr::Unary {
            op: UnOp::Not,
            x: Box::new(x),
        }
    }

    /// `T{}`: zero value of a companion or struct type
    pub fn zero(ty: Type) -> Self {
        Expr::Composite { ty, elts: vec![] }
    }

    /// `func() T { body }()`
    pub fn immediately_invoked(results: Vec<Type>, body: Vec<Stmt>) -> Self {
        Expr::call(
            Expr::FuncLit {
                params: vec![],
                results,
                body,
            },
            vec![],
        )
    }

    /// The receiver of a parameterless `recv.Get()` call
    pub fn get_receiver(&self) -> Option<&Expr> {
        match self {
            Expr::Call {
                fun,
                type_args,
                args,
            } if type_args.is_empty() && args.is_empty() => match fun.as_ref() {
                Expr::Selector { x, sel } if sel == "Get" => Some(x),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for expressions that can be evaluated repeatedly without effects
    pub fn is_pure_read(&self) -> bool {
        match self {
            Expr::Ident(_) | Expr::Lit(_) | Expr::Type(_) => true,
            Expr::Selector { x, .. } => x.is_pure_read(),
            Expr::Paren(x) => x.is_pure_read(),
            _ => self
                .get_receiver()
                .map(Expr::is_pure_read)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_receiver() {
        let get = Expr::method(Expr::ident("x"), "Get", vec![]);
        assert_eq!(get.get_receiver(), Some(&Expr::ident("x")));
        let other = Expr::method(Expr::ident("x"), "Size", vec![]);
        assert_eq!(other.get_receiver(), None);
    }

    #[test]
    fn test_pure_reads() {
        assert!(Expr::select(Expr::ident("p"), "name").is_pure_read());
        assert!(Expr::method(Expr::ident("p"), "Get", vec![]).is_pure_read());
        assert!(!Expr::call(Expr::ident("f"), vec![]).is_pure_read());
    }

    #[test]
    fn test_terminating_statements() {
        assert!(Stmt::ret(Expr::int(1)).is_terminating());
        let panic = Stmt::Expr(Expr::call(Expr::ident("panic"), vec![Expr::string("x")]));
        assert!(panic.is_terminating());
        let half_if = Stmt::If {
            cond: Expr::bool(true),
            then: vec![Stmt::ret(Expr::int(1))],
            els: vec![],
        };
        assert!(!half_if.is_terminating());
        assert!(terminates(&[Stmt::Block(vec![Stmt::ret(Expr::int(1))])]));
    }
}
