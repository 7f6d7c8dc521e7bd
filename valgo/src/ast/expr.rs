//! Expression, statement and pattern nodes

use super::{Spanned, ValDecl};
use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    CharLit(char),
    BoolLit(bool),
    /// `nil`
    Nil,

    /// Variable, function, type or package reference
    Ident(String),

    /// Call: `callee[type_args](args)`; arguments may be named
    Call {
        callee: Box<Spanned<Expr>>,
        type_args: Vec<Type>,
        args: Vec<Arg>,
    },

    /// Member access: `target.member`
    Select {
        target: Box<Spanned<Expr>>,
        member: Spanned<String>,
    },

    /// Indexing: `target[index]`
    Index {
        target: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },

    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },

    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },

    /// `(x: T, y) => body`
    Lambda {
        params: Vec<LambdaParam>,
        body: Box<Spanned<Expr>>,
    },

    /// `if cond then_branch else else_branch`
    If {
        cond: Box<Spanned<Expr>>,
        then_branch: Box<Spanned<Expr>>,
        else_branch: Option<Box<Spanned<Expr>>>,
    },

    /// `subject match { case ... }`
    Match {
        subject: Box<Spanned<Expr>>,
        clauses: Vec<CaseClause>,
    },

    /// `(a, b, ...)`
    Tuple(Vec<Spanned<Expr>>),

    /// `{ case p => e ... }` used as a one-argument function
    PartialFunction(Vec<CaseClause>),

    /// `{ stmt; ...; tail }`; a trailing expression statement is the value
    Block(Vec<Spanned<Stmt>>),
}

/// Call argument, optionally named (`age = 31`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arg {
    pub name: Option<Spanned<String>>,
    pub value: Spanned<Expr>,
}

/// Lambda parameter; the type may come from the expected function type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaParam {
    pub name: String,
    pub ty: Option<Type>,
}

/// One `case pattern if guard => body`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseClause {
    pub pattern: Spanned<Pattern>,
    pub guard: Option<Spanned<Expr>>,
    pub body: Spanned<Expr>,
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// Local `val`/`var` declaration
    Val(ValDecl),
    /// `target = value` or `target op= value`
    Assign {
        target: Spanned<Expr>,
        op: Option<BinOp>,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
    Return(Option<Spanned<Expr>>),
    While {
        cond: Spanned<Expr>,
        body: Vec<Spanned<Stmt>>,
    },
}

/// Pattern for case clauses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// Binds the matched value
    Ident(String),
    Literal(LiteralPattern),
    /// `name: Type`
    Typed { name: String, ty: Type },
    /// `Head[T](p1, p2)`; `head` may be package-qualified
    Extractor {
        head: String,
        type_args: Vec<Type>,
        args: Vec<Spanned<Pattern>>,
    },
    /// `(p1, p2)`
    Tuple(Vec<Spanned<Pattern>>),
    /// `rest @ _*` (named) or `_*`
    Rest(Option<String>),
}

/// Literal patterns for match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralPattern {
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    Bool(bool),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        };
        write!(f, "{token}")
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not (!)
    Not,
    /// Bitwise complement (^)
    BitNot,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
            UnOp::BitNot => write!(f, "^"),
        }
    }
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::IntLit(_)
                | Expr::FloatLit(_)
                | Expr::StringLit(_)
                | Expr::CharLit(_)
                | Expr::BoolLit(_)
        )
    }

    pub fn is_numeric_literal(&self) -> bool {
        matches!(self, Expr::IntLit(_) | Expr::FloatLit(_))
    }

    /// Conservative check: does `name` occur as an identifier anywhere inside?
    ///
    /// Shadowing is ignored, so a `true` answer may be a false positive but a
    /// `false` answer is always exact.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Expr::Ident(n) => n == name,
            Expr::IntLit(_)
            | Expr::FloatLit(_)
            | Expr::StringLit(_)
            | Expr::CharLit(_)
            | Expr::BoolLit(_)
            | Expr::Nil => false,
            Expr::Call { callee, args, .. } => {
                callee.node.references(name) || args.iter().any(|a| a.value.node.references(name))
            }
            Expr::Select { target, .. } => target.node.references(name),
            Expr::Index { target, index } => {
                target.node.references(name) || index.node.references(name)
            }
            Expr::Binary { left, right, .. } => {
                left.node.references(name) || right.node.references(name)
            }
            Expr::Unary { expr, .. } => expr.node.references(name),
            Expr::Lambda { body, .. } => body.node.references(name),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.node.references(name)
                    || then_branch.node.references(name)
                    || else_branch
                        .as_ref()
                        .map(|e| e.node.references(name))
                        .unwrap_or(false)
            }
            Expr::Match { subject, clauses } => {
                subject.node.references(name) || clauses.iter().any(|c| c.references(name))
            }
            Expr::Tuple(elems) => elems.iter().any(|e| e.node.references(name)),
            Expr::PartialFunction(clauses) => clauses.iter().any(|c| c.references(name)),
            Expr::Block(stmts) => stmts.iter().any(|s| s.node.references(name)),
        }
    }
}

impl CaseClause {
    pub fn references(&self, name: &str) -> bool {
        self.body.node.references(name)
            || self
                .guard
                .as_ref()
                .map(|g| g.node.references(name))
                .unwrap_or(false)
    }
}

impl Stmt {
    pub fn references(&self, name: &str) -> bool {
        match self {
            Stmt::Val(decl) => decl.value.node.references(name),
            Stmt::Assign { target, value, .. } => {
                target.node.references(name) || value.node.references(name)
            }
            Stmt::Expr(e) => e.node.references(name),
            Stmt::Return(value) => value
                .as_ref()
                .map(|v| v.node.references(name))
                .unwrap_or(false),
            Stmt::While { cond, body } => {
                cond.node.references(name) || body.iter().any(|s| s.node.references(name))
            }
        }
    }
}

impl Pattern {
    /// True for `_` and bare identifiers, which match every value
    pub fn is_irrefutable(&self) -> bool {
        matches!(self, Pattern::Wildcard | Pattern::Ident(_))
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Pattern::Rest(_))
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Wildcard => write!(f, "_"),
            Pattern::Ident(name) => write!(f, "{name}"),
            Pattern::Literal(lit) => write!(f, "{lit}"),
            Pattern::Typed { name, ty } => write!(f, "{name}: {ty}"),
            Pattern::Extractor {
                head,
                type_args,
                args,
            } => {
                write!(f, "{head}")?;
                if !type_args.is_empty() {
                    let targs: Vec<String> = type_args.iter().map(Type::render).collect();
                    write!(f, "[{}]", targs.join(", "))?;
                }
                let args: Vec<String> = args.iter().map(|a| a.node.to_string()).collect();
                write!(f, "({})", args.join(", "))
            }
            Pattern::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|e| e.node.to_string()).collect();
                write!(f, "({})", elems.join(", "))
            }
            Pattern::Rest(Some(name)) => write!(f, "{name} @ _*"),
            Pattern::Rest(None) => write!(f, "_*"),
        }
    }
}

impl std::fmt::Display for LiteralPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralPattern::Int(n) => write!(f, "{n}"),
            LiteralPattern::Float(x) => write!(f, "{x:?}"),
            LiteralPattern::String(s) => write!(f, "{s:?}"),
            LiteralPattern::Char(c) => write!(f, "{c:?}"),
            LiteralPattern::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_references_finds_nested_identifier() {
        let e = binary(ident("a"), BinOp::Add, call(ident("f"), vec![ident("b")]));
        assert!(e.node.references("a"));
        assert!(e.node.references("b"));
        assert!(e.node.references("f"));
        assert!(!e.node.references("c"));
    }

    #[test]
    fn test_references_inside_match_guard() {
        let e = match_expr(
            ident("x"),
            vec![
                case_if(pident("y"), ident("limit"), int(1)),
                case(wildcard(), int(0)),
            ],
        );
        assert!(e.node.references("limit"));
        assert!(!e.node.references("y2"));
    }

    #[test]
    fn test_pattern_display() {
        let p = extractor("Some", vec![ptuple(vec![pident("a"), wildcard()])]);
        assert_eq!(p.node.to_string(), "Some((a, _))");
        assert_eq!(rest(Some("tail")).node.to_string(), "tail @ _*");
    }

    #[test]
    fn test_binop_classes() {
        assert!(BinOp::Le.is_comparison());
        assert!(BinOp::Or.is_logical());
        assert!(!BinOp::Add.is_comparison());
        assert_eq!(BinOp::And.to_string(), "&&");
    }
}
