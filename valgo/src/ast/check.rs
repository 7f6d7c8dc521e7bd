//! Type-model checks on trees that arrive deserialized
//!
//! Trees built in-process go through the checked constructors. Trees read
//! from JSON do not, so every type annotation is validated once up front.

use super::{CaseClause, Decl, Expr, Pattern, Program, Span, Spanned, Stmt, TypeParam, ValDecl};
use crate::error::{CompileError, Result};
use crate::types::Type;

/// Reject any type in `program` that breaks the type model
pub fn check_types(program: &Program) -> Result<()> {
    for decl in &program.decls {
        check_decl(&decl.node, decl.span)?;
    }
    Ok(())
}

fn check(ty: &Type, span: Span) -> Result<()> {
    ty.validate().map_err(|e| CompileError::from_type_error(e, span))
}

fn check_params(params: &[TypeParam], span: Span) -> Result<()> {
    params
        .iter()
        .filter_map(|p| p.constraint.as_ref())
        .try_for_each(|c| check(c, span))
}

fn check_decl(decl: &Decl, span: Span) -> Result<()> {
    match decl {
        Decl::Val(v) => check_val(v),
        Decl::Func(f) => {
            check_params(&f.type_params, f.span)?;
            if let Some(recv) = &f.receiver {
                check(&recv.ty, f.span)?;
            }
            for p in &f.params {
                check(&p.ty, p.name.span)?;
            }
            if let Some(result) = &f.result {
                check(result, f.span)?;
            }
            check_expr(&f.body)
        }
        Decl::Struct(s) => {
            check_params(&s.type_params, s.span)?;
            s.fields.iter().try_for_each(|f| check(&f.ty, f.name.span))
        }
        Decl::Sealed(s) => {
            check_params(&s.type_params, s.span)?;
            s.variants
                .iter()
                .flat_map(|v| &v.fields)
                .try_for_each(|f| check(&f.ty, f.name.span))
        }
        Decl::TypeAlias(a) => {
            check_params(&a.type_params, span)?;
            check(&a.ty, a.name.span)
        }
    }
}

fn check_val(decl: &ValDecl) -> Result<()> {
    if let Some(ty) = &decl.ty {
        check(ty, decl.name.span)?;
    }
    check_expr(&decl.value)
}

fn check_expr(expr: &Spanned<Expr>) -> Result<()> {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || check_expr_inner(expr))
}

fn check_expr_inner(expr: &Spanned<Expr>) -> Result<()> {
    match &expr.node {
        Expr::IntLit(_)
        | Expr::FloatLit(_)
        | Expr::StringLit(_)
        | Expr::CharLit(_)
        | Expr::BoolLit(_)
        | Expr::Nil
        | Expr::Ident(_) => Ok(()),
        Expr::Call {
            callee,
            type_args,
            args,
        } => {
            type_args.iter().try_for_each(|t| check(t, expr.span))?;
            check_expr(callee)?;
            args.iter().try_for_each(|a| check_expr(&a.value))
        }
        Expr::Select { target, .. } => check_expr(target),
        Expr::Index { target, index } => {
            check_expr(target)?;
            check_expr(index)
        }
        Expr::Binary { left, right, .. } => {
            check_expr(left)?;
            check_expr(right)
        }
        Expr::Unary { expr: inner, .. } => check_expr(inner),
        Expr::Lambda { params, body } => {
            params
                .iter()
                .filter_map(|p| p.ty.as_ref())
                .try_for_each(|t| check(t, expr.span))?;
            check_expr(body)
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            check_expr(cond)?;
            check_expr(then_branch)?;
            match else_branch {
                Some(e) => check_expr(e),
                None => Ok(()),
            }
        }
        Expr::Match { subject, clauses } => {
            check_expr(subject)?;
            clauses.iter().try_for_each(check_clause)
        }
        Expr::Tuple(elems) => elems.iter().try_for_each(check_expr),
        Expr::PartialFunction(clauses) => clauses.iter().try_for_each(check_clause),
        Expr::Block(stmts) => stmts.iter().try_for_each(check_stmt),
    }
}

fn check_clause(clause: &CaseClause) -> Result<()> {
    check_pattern(&clause.pattern)?;
    if let Some(guard) = &clause.guard {
        check_expr(guard)?;
    }
    check_expr(&clause.body)
}

fn check_pattern(pattern: &Spanned<Pattern>) -> Result<()> {
    match &pattern.node {
        Pattern::Typed { ty, .. } => check(ty, pattern.span),
        Pattern::Extractor { type_args, args, .. } => {
            type_args.iter().try_for_each(|t| check(t, pattern.span))?;
            args.iter().try_for_each(check_pattern)
        }
        Pattern::Tuple(elems) => elems.iter().try_for_each(check_pattern),
        Pattern::Wildcard | Pattern::Ident(_) | Pattern::Literal(_) | Pattern::Rest(_) => Ok(()),
    }
}

fn check_stmt(stmt: &Spanned<Stmt>) -> Result<()> {
    match &stmt.node {
        Stmt::Val(decl) => check_val(decl),
        Stmt::Assign { target, value, .. } => {
            check_expr(target)?;
            check_expr(value)
        }
        Stmt::Expr(e) => check_expr(e),
        Stmt::Return(value) => match value {
            Some(v) => check_expr(v),
            None => Ok(()),
        },
        Stmt::While { cond, body } => {
            check_expr(cond)?;
            body.iter().try_for_each(check_stmt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    fn double() -> Type {
        let once = Type::generic(Type::named("std", "Immutable"), vec![Type::int()]);
        Type::generic(Type::named("std", "Immutable"), vec![once])
    }

    #[test]
    fn test_well_formed_program_passes() {
        let prog = program(vec![
            struct_decl("Person", &[], vec![field("name", Type::string())]),
            func("id", vec![("n", Type::int())], Some(Type::int()), ident("n")),
        ]);
        assert!(check_types(&prog).is_ok());
    }

    #[test]
    fn test_double_wrap_in_field_is_rejected() {
        let prog = program(vec![struct_decl("Bad", &[], vec![field("x", double())])]);
        let err = check_types(&prog).unwrap_err();
        assert!(matches!(err, CompileError::Invariant { .. }));
    }

    #[test]
    fn test_double_wrap_deep_in_body_is_rejected() {
        let prog = program(vec![func(
            "f",
            vec![],
            Some(Type::int()),
            block(vec![
                let_val_typed("x", Type::array(double()), nil()),
                expr_stmt(int(1)),
            ]),
        )]);
        assert!(check_types(&prog).is_err());
    }
}
