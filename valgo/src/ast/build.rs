//! Builders for source trees
//!
//! The parser is an external collaborator, so tools and tests that need a
//! tree without source text build one here. Every node gets a synthetic span.

use super::*;
use crate::types::Type;

fn node<T>(value: T) -> Spanned<T> {
    Spanned::bare(value)
}

fn boxed(e: Spanned<Expr>) -> Box<Spanned<Expr>> {
    Box::new(e)
}

// ============================================================================
// Expressions
// ============================================================================

pub fn int(n: i64) -> Spanned<Expr> {
    node(Expr::IntLit(n))
}

pub fn float(x: f64) -> Spanned<Expr> {
    node(Expr::FloatLit(x))
}

pub fn string(s: &str) -> Spanned<Expr> {
    node(Expr::StringLit(s.to_string()))
}

pub fn boolean(b: bool) -> Spanned<Expr> {
    node(Expr::BoolLit(b))
}

pub fn nil() -> Spanned<Expr> {
    node(Expr::Nil)
}

pub fn ident(name: &str) -> Spanned<Expr> {
    node(Expr::Ident(name.to_string()))
}

pub fn arg(value: Spanned<Expr>) -> Arg {
    Arg { name: None, value }
}

pub fn named(name: &str, value: Spanned<Expr>) -> Arg {
    Arg {
        name: Some(node(name.to_string())),
        value,
    }
}

pub fn call(callee: Spanned<Expr>, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    call_args(callee, vec![], args.into_iter().map(arg).collect())
}

pub fn call_targs(
    callee: Spanned<Expr>,
    type_args: Vec<Type>,
    args: Vec<Spanned<Expr>>,
) -> Spanned<Expr> {
    call_args(callee, type_args, args.into_iter().map(arg).collect())
}

pub fn call_args(callee: Spanned<Expr>, type_args: Vec<Type>, args: Vec<Arg>) -> Spanned<Expr> {
    node(Expr::Call {
        callee: boxed(callee),
        type_args,
        args,
    })
}

pub fn select(target: Spanned<Expr>, member: &str) -> Spanned<Expr> {
    node(Expr::Select {
        target: boxed(target),
        member: node(member.to_string()),
    })
}

/// `recv.name(args)`
pub fn method_call(recv: Spanned<Expr>, name: &str, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    call(select(recv, name), args)
}

pub fn index(target: Spanned<Expr>, idx: Spanned<Expr>) -> Spanned<Expr> {
    node(Expr::Index {
        target: boxed(target),
        index: boxed(idx),
    })
}

pub fn binary(left: Spanned<Expr>, op: BinOp, right: Spanned<Expr>) -> Spanned<Expr> {
    node(Expr::Binary {
        left: boxed(left),
        op,
        right: boxed(right),
    })
}

pub fn unary(op: UnOp, expr: Spanned<Expr>) -> Spanned<Expr> {
    node(Expr::Unary {
        op,
        expr: boxed(expr),
    })
}

pub fn lambda(params: Vec<(&str, Option<Type>)>, body: Spanned<Expr>) -> Spanned<Expr> {
    node(Expr::Lambda {
        params: params
            .into_iter()
            .map(|(name, ty)| LambdaParam {
                name: name.to_string(),
                ty,
            })
            .collect(),
        body: boxed(body),
    })
}

pub fn if_else(
    cond: Spanned<Expr>,
    then_branch: Spanned<Expr>,
    else_branch: Spanned<Expr>,
) -> Spanned<Expr> {
    node(Expr::If {
        cond: boxed(cond),
        then_branch: boxed(then_branch),
        else_branch: Some(boxed(else_branch)),
    })
}

pub fn if_then(cond: Spanned<Expr>, then_branch: Spanned<Expr>) -> Spanned<Expr> {
    node(Expr::If {
        cond: boxed(cond),
        then_branch: boxed(then_branch),
        else_branch: None,
    })
}

pub fn match_expr(subject: Spanned<Expr>, clauses: Vec<CaseClause>) -> Spanned<Expr> {
    node(Expr::Match {
        subject: boxed(subject),
        clauses,
    })
}

pub fn tuple(elems: Vec<Spanned<Expr>>) -> Spanned<Expr> {
    node(Expr::Tuple(elems))
}

pub fn partial(clauses: Vec<CaseClause>) -> Spanned<Expr> {
    node(Expr::PartialFunction(clauses))
}

pub fn block(stmts: Vec<Spanned<Stmt>>) -> Spanned<Expr> {
    node(Expr::Block(stmts))
}

// ============================================================================
// Statements
// ============================================================================

pub fn let_val(name: &str, value: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Val(val_decl(name, false, None, value)))
}

pub fn let_val_typed(name: &str, ty: Type, value: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Val(val_decl(name, false, Some(ty), value)))
}

pub fn let_var(name: &str, value: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Val(val_decl(name, true, None, value)))
}

pub fn assign(target: Spanned<Expr>, value: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Assign {
        target,
        op: None,
        value,
    })
}

pub fn compound_assign(target: Spanned<Expr>, op: BinOp, value: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Assign {
        target,
        op: Some(op),
        value,
    })
}

pub fn expr_stmt(e: Spanned<Expr>) -> Spanned<Stmt> {
    node(Stmt::Expr(e))
}

pub fn ret(value: Option<Spanned<Expr>>) -> Spanned<Stmt> {
    node(Stmt::Return(value))
}

pub fn while_loop(cond: Spanned<Expr>, body: Vec<Spanned<Stmt>>) -> Spanned<Stmt> {
    node(Stmt::While { cond, body })
}

// ============================================================================
// Patterns and clauses
// ============================================================================

pub fn wildcard() -> Spanned<Pattern> {
    node(Pattern::Wildcard)
}

pub fn pident(name: &str) -> Spanned<Pattern> {
    node(Pattern::Ident(name.to_string()))
}

pub fn plit_int(n: i64) -> Spanned<Pattern> {
    node(Pattern::Literal(LiteralPattern::Int(n)))
}

pub fn plit_str(s: &str) -> Spanned<Pattern> {
    node(Pattern::Literal(LiteralPattern::String(s.to_string())))
}

pub fn typed(name: &str, ty: Type) -> Spanned<Pattern> {
    node(Pattern::Typed {
        name: name.to_string(),
        ty,
    })
}

pub fn extractor(head: &str, args: Vec<Spanned<Pattern>>) -> Spanned<Pattern> {
    extractor_targs(head, vec![], args)
}

pub fn extractor_targs(
    head: &str,
    type_args: Vec<Type>,
    args: Vec<Spanned<Pattern>>,
) -> Spanned<Pattern> {
    node(Pattern::Extractor {
        head: head.to_string(),
        type_args,
        args,
    })
}

pub fn ptuple(elems: Vec<Spanned<Pattern>>) -> Spanned<Pattern> {
    node(Pattern::Tuple(elems))
}

pub fn rest(name: Option<&str>) -> Spanned<Pattern> {
    node(Pattern::Rest(name.map(str::to_string)))
}

pub fn case(pattern: Spanned<Pattern>, body: Spanned<Expr>) -> CaseClause {
    CaseClause {
        pattern,
        guard: None,
        body,
    }
}

pub fn case_if(pattern: Spanned<Pattern>, guard: Spanned<Expr>, body: Spanned<Expr>) -> CaseClause {
    CaseClause {
        pattern,
        guard: Some(guard),
        body,
    }
}

// ============================================================================
// Declarations
// ============================================================================

fn val_decl(name: &str, mutable: bool, ty: Option<Type>, value: Spanned<Expr>) -> ValDecl {
    ValDecl {
        name: node(name.to_string()),
        mutable,
        ty,
        value,
    }
}

fn type_params(names: &[&str]) -> Vec<TypeParam> {
    names.iter().map(|n| TypeParam::new(*n)).collect()
}

fn params(list: Vec<(&str, Type)>) -> Vec<Param> {
    list.into_iter()
        .map(|(name, ty)| Param {
            name: node(name.to_string()),
            ty,
        })
        .collect()
}

pub fn val(name: &str, value: Spanned<Expr>) -> Spanned<Decl> {
    node(Decl::Val(val_decl(name, false, None, value)))
}

pub fn val_typed(name: &str, ty: Type, value: Spanned<Expr>) -> Spanned<Decl> {
    node(Decl::Val(val_decl(name, false, Some(ty), value)))
}

pub fn var(name: &str, value: Spanned<Expr>) -> Spanned<Decl> {
    node(Decl::Val(val_decl(name, true, None, value)))
}

pub fn func(
    name: &str,
    params_list: Vec<(&str, Type)>,
    result: Option<Type>,
    body: Spanned<Expr>,
) -> Spanned<Decl> {
    generic_func(name, &[], params_list, result, body)
}

pub fn generic_func(
    name: &str,
    tparams: &[&str],
    params_list: Vec<(&str, Type)>,
    result: Option<Type>,
    body: Spanned<Expr>,
) -> Spanned<Decl> {
    node(Decl::Func(FuncDecl {
        name: node(name.to_string()),
        type_params: type_params(tparams),
        receiver: None,
        params: params(params_list),
        result,
        body,
        span: Span::synthetic(),
    }))
}

pub fn method(
    receiver: (&str, Type),
    name: &str,
    tparams: &[&str],
    params_list: Vec<(&str, Type)>,
    result: Option<Type>,
    body: Spanned<Expr>,
) -> Spanned<Decl> {
    node(Decl::Func(FuncDecl {
        name: node(name.to_string()),
        type_params: type_params(tparams),
        receiver: Some(Receiver {
            name: receiver.0.to_string(),
            ty: receiver.1,
        }),
        params: params(params_list),
        result,
        body,
        span: Span::synthetic(),
    }))
}

pub fn field(name: &str, ty: Type) -> StructField {
    StructField {
        name: node(name.to_string()),
        ty,
        mutable: false,
    }
}

pub fn var_field(name: &str, ty: Type) -> StructField {
    StructField {
        name: node(name.to_string()),
        ty,
        mutable: true,
    }
}

pub fn struct_decl(name: &str, tparams: &[&str], fields: Vec<StructField>) -> Spanned<Decl> {
    node(Decl::Struct(StructDecl {
        name: node(name.to_string()),
        type_params: type_params(tparams),
        fields,
        span: Span::synthetic(),
    }))
}

pub fn variant(name: &str, fields: Vec<StructField>) -> Variant {
    Variant {
        name: node(name.to_string()),
        fields,
    }
}

pub fn sealed(name: &str, tparams: &[&str], variants: Vec<Variant>) -> Spanned<Decl> {
    node(Decl::Sealed(SealedDecl {
        name: node(name.to_string()),
        type_params: type_params(tparams),
        variants,
        span: Span::synthetic(),
    }))
}

pub fn type_alias(name: &str, tparams: &[&str], ty: Type) -> Spanned<Decl> {
    node(Decl::TypeAlias(TypeAlias {
        name: node(name.to_string()),
        type_params: type_params(tparams),
        ty,
    }))
}

pub fn program(decls: Vec<Spanned<Decl>>) -> Program {
    Program {
        package: "main".to_string(),
        decls,
    }
}
