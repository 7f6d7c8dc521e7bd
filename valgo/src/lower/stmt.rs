//! Statement and block lowering

use super::Lowerer;
use crate::ast::{self, Span, Spanned, ValDecl};
use crate::error::{CompileError, Result};
use crate::immut;
use crate::scope::Mutability;
use crate::target::{self, Expr, Stmt};
use crate::types::Type;

impl<'a> Lowerer<'a> {
    /// Lower a block in its own scope. A non-void `result` makes the last
    /// expression statement the block's value.
    pub(super) fn lower_block(
        &mut self,
        stmts: &[Spanned<ast::Stmt>],
        result: &Type,
        span: Span,
    ) -> Result<Vec<Stmt>> {
        self.with_scope(|this| {
            let mut out = Vec::new();
            for (i, stmt) in stmts.iter().enumerate() {
                let last = i + 1 == stmts.len();
                match &stmt.node {
                    ast::Stmt::Expr(e) if last && !result.is_void() => {
                        out.extend(this.lower_tail(e, result)?);
                    }
                    _ => out.extend(this.lower_stmt(stmt, &stmts[i + 1..])?),
                }
            }
            if !result.is_void() && !target::terminates(&out) {
                return Err(CompileError::inference(
                    format!("block must end in a value of type `{result}`"),
                    span,
                ));
            }
            Ok(out)
        })
    }

    /// Lower one statement; `rest` are the statements after it in the block
    fn lower_stmt(&mut self, stmt: &Spanned<ast::Stmt>, rest: &[Spanned<ast::Stmt>]) -> Result<Vec<Stmt>> {
        match &stmt.node {
            ast::Stmt::Val(decl) => {
                let mut out = self.lower_local(decl)?;
                let name = &decl.name.node;
                if !rest.iter().any(|s| s.node.references(name)) {
                    out.push(Stmt::assign(Expr::ident("_"), Expr::ident(name.as_str())));
                }
                Ok(out)
            }
            ast::Stmt::Assign { target, op, value } => self.lower_assign(target, *op, value, stmt.span),
            ast::Stmt::Expr(e) => self.lower_effect(e),
            ast::Stmt::Return(value) => self.lower_return(value.as_ref(), stmt.span),
            ast::Stmt::While { cond, body } => {
                let cond = self.lower_expr(cond, Some(&Type::bool()))?;
                let body = self.lower_block(body, &Type::Void, stmt.span)?;
                Ok(vec![Stmt::For {
                    cond: Some(cond),
                    body,
                }])
            }
        }
    }

    /// `val x = e` becomes `x := NewImmutable[T](e)`; `var x = e` stays a
    /// plain variable
    fn lower_local(&mut self, decl: &ValDecl) -> Result<Vec<Stmt>> {
        let ty = self.binding_type(decl)?;
        let value = self.lower_expr(&decl.value, Some(&ty))?;
        let name = decl.name.node.clone();
        if decl.mutable {
            self.scope.bind(name.clone(), Mutability::Var, ty.clone());
            return Ok(vec![Stmt::Var {
                name,
                ty,
                value: Some(value),
            }]);
        }
        let value = self.store_value(&decl.value, value, &ty)?;
        let wrapped = immut::wrapper_type(&self.env, &ty, decl.name.span)?;
        self.scope.bind(name.clone(), Mutability::Val, wrapped);
        Ok(vec![Stmt::define(name, value)])
    }

    /// Wrap a lowered value for storage in a value binding, reusing the
    /// wrapper when the source already reads one
    pub(super) fn store_value(&mut self, source: &Spanned<ast::Expr>, value: Expr, ty: &Type) -> Result<Expr> {
        if self.is_wrapper_read(source) {
            immut::rewrap(&self.env, value, ty, source.span)
        } else {
            immut::wrap(&self.env, value, ty, source.span)
        }
    }

    fn lower_assign(
        &mut self,
        target: &Spanned<ast::Expr>,
        op: Option<ast::BinOp>,
        value: &Spanned<ast::Expr>,
        span: Span,
    ) -> Result<Vec<Stmt>> {
        let (lhs, ty) = match &target.node {
            ast::Expr::Ident(name) => {
                immut::check_assign_binding(&self.scope, name, target.span)?;
                (Expr::ident(name.as_str()), self.scope.lookup_type(name))
            }
            ast::Expr::Select { target: recv, member } => {
                let recv_ty = self.type_of(recv);
                immut::check_assign_field(&self.env, &recv_ty, &member.node, member.span)?;
                let ty = self
                    .env
                    .field(&recv_ty, &member.node)
                    .map(|f| f.ty)
                    .unwrap_or(Type::Nil);
                let recv = self.lower_expr(recv, None)?;
                (Expr::select(recv, member.node.clone()), ty)
            }
            ast::Expr::Index { target: seq, index } => {
                let seq_ty = self.type_of(seq);
                let elem = match &seq_ty {
                    Type::Array { elem } | Type::Map { elem, .. } => elem.as_ref().clone(),
                    _ => {
                        return Err(CompileError::immutability(
                            format!("cannot assign through an index of `{seq_ty}`"),
                            target.span,
                        ));
                    }
                };
                let x = self.lower_expr(seq, None)?;
                let index = self.lower_expr(index, None)?;
                (
                    Expr::Index {
                        x: Box::new(x),
                        index: Box::new(index),
                    },
                    elem,
                )
            }
            _ => {
                return Err(CompileError::pattern("invalid assignment target", span));
            }
        };
        let expected = if ty.is_nil() { None } else { Some(&ty) };
        let value = self.lower_expr(value, expected)?;
        Ok(vec![Stmt::Assign {
            targets: vec![lhs],
            op,
            values: vec![value],
        }])
    }

    fn lower_return(&mut self, value: Option<&Spanned<ast::Expr>>, span: Span) -> Result<Vec<Stmt>> {
        let Some(frame) = self.frames.last().cloned() else {
            return Err(CompileError::pattern("`return` outside of a function", span));
        };
        if frame.synthetic {
            return Err(CompileError::pattern(
                "`return` is not allowed inside an `if`, `match` or block used as a value",
                span,
            ));
        }
        match value {
            None if frame.result.is_void() => Ok(vec![Stmt::Return(vec![])]),
            None => Err(CompileError::inference(
                format!("missing return value of type `{}`", frame.result),
                span,
            )),
            Some(value) if frame.result.is_void() => {
                let mut out = self.lower_effect(value)?;
                out.push(Stmt::Return(vec![]));
                Ok(out)
            }
            Some(value) => self.lower_tail(value, &frame.result),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;
    use crate::ast::{BinOp, Decl, Spanned};
    use crate::config::LowerConfig;
    use crate::error::CompileError;
    use crate::lower::lower_program;
    use crate::metadata::Metadata;
    use crate::types::Type;

    fn lower_last(decls: Vec<Spanned<Decl>>) -> crate::error::Result<String> {
        let file = lower_program(
            &program(decls),
            &Metadata::with_prelude("std"),
            &LowerConfig::default(),
        )?;
        Ok(file.decls.last().map(ToString::to_string).unwrap_or_default())
    }

    #[test]
    fn test_local_val_is_wrapped_and_read() {
        let out = lower_last(vec![func(
            "inc",
            vec![],
            Some(Type::int()),
            block(vec![
                let_val("x", int(5)),
                expr_stmt(binary(ident("x"), BinOp::Add, int(1))),
            ]),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func inc() int {\n\tx := std.NewImmutable[int](5)\n\treturn x.Get() + 1\n}\n"
        );
    }

    #[test]
    fn test_val_copy_reuses_wrapper() {
        let out = lower_last(vec![func(
            "same",
            vec![],
            Some(Type::int()),
            block(vec![
                let_val("x", int(5)),
                let_val("y", ident("x")),
                expr_stmt(ident("y")),
            ]),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func same() int {\n\tx := std.NewImmutable[int](5)\n\ty := x\n\treturn y.Get()\n}\n"
        );
    }

    #[test]
    fn test_unused_val_is_marked_used() {
        let out = lower_last(vec![func(
            "noop",
            vec![],
            None,
            block(vec![let_val("x", int(1))]),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func noop() {\n\tx := std.NewImmutable[int](1)\n\t_ = x\n}\n"
        );
    }

    #[test]
    fn test_var_assignment_and_loop() {
        let out = lower_last(vec![func(
            "count",
            vec![],
            Some(Type::int()),
            block(vec![
                let_var("i", int(0)),
                while_loop(
                    binary(ident("i"), BinOp::Lt, int(3)),
                    vec![compound_assign(ident("i"), BinOp::Add, int(1))],
                ),
                expr_stmt(ident("i")),
            ]),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func count() int {\n\tvar i int = 0\n\tfor i < 3 {\n\t\ti += 1\n\t}\n\treturn i\n}\n"
        );
    }

    #[test]
    fn test_assign_to_val_is_rejected() {
        let err = lower_last(vec![func(
            "bad",
            vec![],
            None,
            block(vec![let_val("x", int(1)), assign(ident("x"), int(2))]),
        )])
        .unwrap_err();
        assert!(matches!(err, CompileError::Immutability { .. }));
        assert!(err.message().contains("`x`"));
    }

    #[test]
    fn test_assign_to_param_is_rejected() {
        let err = lower_last(vec![func(
            "bad",
            vec![("n", Type::int())],
            None,
            assign_block("n"),
        )])
        .unwrap_err();
        assert!(matches!(err, CompileError::Immutability { .. }));
    }

    fn assign_block(name: &str) -> Spanned<crate::ast::Expr> {
        block(vec![assign(ident(name), int(2))])
    }

    #[test]
    fn test_field_assignment_respects_var() {
        let person = struct_decl(
            "Person",
            &[],
            vec![field("name", Type::string()), var_field("age", Type::int())],
        );
        let ok = lower_last(vec![
            person.clone(),
            func(
                "birthday",
                vec![("p", Type::local("Person"))],
                None,
                block(vec![compound_assign(select(ident("p"), "age"), BinOp::Add, int(1))]),
            ),
        ])
        .unwrap();
        assert_eq!(ok, "func birthday(p Person) {\n\tp.age += 1\n}\n");

        let err = lower_last(vec![
            person,
            func(
                "rename",
                vec![("p", Type::local("Person"))],
                None,
                block(vec![assign(select(ident("p"), "name"), string("x"))]),
            ),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::Immutability { .. }));
    }

    #[test]
    fn test_block_without_value_is_rejected() {
        let err = lower_last(vec![func(
            "nothing",
            vec![],
            Some(Type::int()),
            block(vec![let_var("i", int(0))]),
        )])
        .unwrap_err();
        assert!(err.message().contains("must end in a value"));
    }
}
