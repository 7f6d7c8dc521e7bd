//! Expression lowering in value, tail and effect positions

use super::Lowerer;
use super::matching::Position;
use crate::ast::{self, CaseClause, LambdaParam, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::immut;
use crate::infer::results_of;
use crate::metadata::TypeKind;
use crate::scope::Mutability;
use crate::target::{Element, Expr, Field, Lit, Stmt};
use crate::types::{self, Type};
use crate::util;

/// Target builtins callable without a declaration
pub const BUILTINS: &[&str] = &[
    "append", "cap", "copy", "delete", "len", "make", "max", "min", "new", "panic", "print",
    "println",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

impl<'a> Lowerer<'a> {
    /// Lower `expr` in value position. `expected` is the type the context
    /// wants, used to type lambdas and empty generic constructions.
    pub(super) fn lower_expr(&mut self, expr: &Spanned<ast::Expr>, expected: Option<&Type>) -> Result<Expr> {
        self.nested(expr.span, |this| this.lower_expr_inner(expr, expected))
    }

    fn lower_expr_inner(&mut self, expr: &Spanned<ast::Expr>, expected: Option<&Type>) -> Result<Expr> {
        match &expr.node {
            ast::Expr::IntLit(n) => Ok(Expr::int(*n)),
            ast::Expr::FloatLit(x) => Ok(Expr::Lit(Lit::Float(*x))),
            ast::Expr::StringLit(s) => Ok(Expr::string(s.clone())),
            ast::Expr::CharLit(c) => Ok(Expr::Lit(Lit::Char(*c))),
            ast::Expr::BoolLit(b) => Ok(Expr::bool(*b)),
            ast::Expr::Nil => Ok(Expr::Lit(Lit::Nil)),
            ast::Expr::Ident(name) => self.lower_ident(name, expected, expr.span),
            ast::Expr::Select { target, member } => self.lower_select(target, member),
            ast::Expr::Index { target, index } => {
                let target_ty = self.type_of(target);
                let x = self.lower_expr(target, None)?;
                let index = self.lower_expr(index, None)?;
                if is_sequence(&target_ty) && self.env.method(&target_ty, "Get").is_some() {
                    return Ok(Expr::method(x, "Get", vec![index]));
                }
                Ok(Expr::Index {
                    x: Box::new(x),
                    index: Box::new(index),
                })
            }
            ast::Expr::Binary { left, op, right } => {
                let left = self.lower_expr(left, None)?;
                let right = self.lower_expr(right, None)?;
                Ok(Expr::binary(*op, left, right))
            }
            ast::Expr::Unary { op, expr: inner } => {
                let x = self.lower_expr(inner, None)?;
                Ok(Expr::Unary {
                    op: *op,
                    x: Box::new(x),
                })
            }
            ast::Expr::Call {
                callee,
                type_args,
                args,
            } => self.lower_call(callee, type_args, args, expected, expr.span),
            ast::Expr::Lambda { params, body } => self.lower_lambda(params, body, expected, expr.span),
            ast::Expr::Tuple(elems) => self.lower_tuple(elems, expected, expr.span),
            ast::Expr::PartialFunction(clauses) => self.lower_partial(clauses, expected, expr.span),
            ast::Expr::Block(stmts) => match stmts.as_slice() {
                [Spanned {
                    node: ast::Stmt::Expr(inner),
                    ..
                }] => self.lower_expr(inner, expected),
                _ => self.invoke_in_place(expr, expected),
            },
            ast::Expr::If { .. } | ast::Expr::Match { .. } => self.invoke_in_place(expr, expected),
        }
    }

    /// Statement-shaped construct in value position: `func() T { ... }()`
    fn invoke_in_place(&mut self, expr: &Spanned<ast::Expr>, expected: Option<&Type>) -> Result<Expr> {
        let ty = match expected {
            Some(ty) if ty.is_concrete() => ty.clone(),
            _ => self.type_of(expr),
        };
        if ty.is_void() {
            return Err(CompileError::inference(
                "this expression has no value but is used as one",
                expr.span,
            ));
        }
        let ty = if ty.is_nil() { Type::Any } else { ty };
        let body = self.with_frame(ty.clone(), true, |this| this.lower_tail(expr, &ty))?;
        Ok(Expr::immediately_invoked(results_of(&ty), body))
    }

    /// Lower `expr` so that it returns its value of type `result` from the
    /// enclosing function
    pub(super) fn lower_tail(&mut self, expr: &Spanned<ast::Expr>, result: &Type) -> Result<Vec<Stmt>> {
        if result.is_void() {
            return self.lower_effect(expr);
        }
        self.nested(expr.span, |this| match &expr.node {
            ast::Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let Some(else_branch) = else_branch else {
                    return Err(CompileError::inference(
                        format!("`if` without `else` cannot produce a value of type `{result}`"),
                        expr.span,
                    ));
                };
                let cond = this.lower_expr(cond, Some(&Type::bool()))?;
                let then = this.lower_tail(then_branch, result)?;
                let els = this.lower_tail(else_branch, result)?;
                Ok(vec![Stmt::If { cond, then, els }])
            }
            ast::Expr::Match { subject, clauses } => {
                this.lower_match(subject, clauses, Position::Tail(result), expr.span)
            }
            ast::Expr::Block(stmts) => {
                let body = this.lower_block(stmts, result, expr.span)?;
                Ok(vec![Stmt::Block(body)])
            }
            _ if is_panic(expr) => this.lower_effect(expr),
            _ => {
                let value = this.lower_expr(expr, Some(result))?;
                Ok(vec![Stmt::ret(value)])
            }
        })
    }

    /// Lower `expr` for its side effects only
    pub(super) fn lower_effect(&mut self, expr: &Spanned<ast::Expr>) -> Result<Vec<Stmt>> {
        self.nested(expr.span, |this| match &expr.node {
            ast::Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = this.lower_expr(cond, Some(&Type::bool()))?;
                let then = this.lower_effect(then_branch)?;
                let els = match else_branch {
                    Some(e) => this.lower_effect(e)?,
                    None => vec![],
                };
                Ok(vec![Stmt::If { cond, then, els }])
            }
            ast::Expr::Match { subject, clauses } => {
                this.lower_match(subject, clauses, Position::Effect, expr.span)
            }
            ast::Expr::Block(stmts) => {
                let body = this.lower_block(stmts, &Type::Void, expr.span)?;
                Ok(vec![Stmt::Block(body)])
            }
            _ => {
                let value = this.lower_expr(expr, None)?;
                Ok(vec![discard(value)])
            }
        })
    }

    fn lower_ident(&mut self, name: &str, expected: Option<&Type>, span: Span) -> Result<Expr> {
        if self.scope.contains(name) {
            let ty = self.scope.lookup_type(name);
            let ident = Expr::ident(name);
            return Ok(if ty.is_immutable() { immut::read(ident) } else { ident });
        }
        if let Some(func) = self.env.lookup_function(name).cloned() {
            if !func.type_params.is_empty() {
                return Err(CompileError::inference(
                    format!("generic function `{name}` cannot be used as a value"),
                    span,
                ));
            }
            self.note_package(&func.package);
            return Ok(Expr::qualified(&self.env.qualifier(&func.package), func.name));
        }
        if let Some(meta) = self.env.lookup_type(name).cloned() {
            if meta.kind == TypeKind::Companion {
                let apply = meta.method("Apply").filter(|m| m.params.is_empty());
                if let Some(apply) = apply {
                    let targs = match expected {
                        Some(wanted) if !meta.type_params.is_empty() => {
                            crate::infer::unify_all(&meta.type_params, &apply.result, wanted)
                        }
                        _ => Some(vec![]),
                    };
                    let Some(targs) = targs else {
                        return Err(CompileError::inference(
                            format!("cannot infer the type arguments of `{name}`"),
                            span,
                        ));
                    };
                    if targs.len() != meta.type_params.len() {
                        return Err(CompileError::inference(
                            format!("cannot infer the type arguments of `{name}`"),
                            span,
                        ));
                    }
                    self.note_package(&meta.package);
                    let ty = Type::generic(self.env.type_ref(&meta), targs);
                    return Ok(Expr::method(Expr::zero(ty), "Apply", vec![]));
                }
            }
        }
        if is_builtin(name) {
            return Ok(Expr::ident(name));
        }
        let suggestion = util::find_similar_name(
            name,
            self.env.index.functions.keys().map(String::as_str),
            util::suggestion_threshold(name),
        );
        Err(CompileError::inference(
            format!(
                "unknown name `{name}`{}",
                util::format_suggestion_hint(suggestion)
            ),
            span,
        ))
    }

    fn lower_select(&mut self, target: &Spanned<ast::Expr>, member: &Spanned<String>) -> Result<Expr> {
        if let ast::Expr::Ident(qualifier) = &target.node {
            if !self.scope.contains(qualifier) && self.env.is_package(qualifier) {
                return Ok(Expr::select(Expr::ident(qualifier.as_str()), member.node.clone()));
            }
        }
        let recv_ty = self.type_of(target);
        if recv_ty.is_nil() || recv_ty.is_any() {
            return Err(CompileError::inference(
                format!("cannot resolve the type of the receiver of `.{}`", member.node),
                target.span,
            ));
        }
        let recv = self.lower_expr(target, None)?;
        if let Some((value, _)) = immut::read_field(&self.env, recv.clone(), &recv_ty, &member.node) {
            return Ok(value);
        }
        if self.env.method(&recv_ty, &member.node).is_some() {
            return Ok(Expr::select(recv, member.node.clone()));
        }
        Err(immut::unknown_field(&self.env, &recv_ty, &member.node, member.span))
    }

    fn lower_lambda(
        &mut self,
        params: &[LambdaParam],
        body: &Spanned<ast::Expr>,
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let (expected_params, expected_results) = match expected {
            Some(Type::Func { params, results }) => (params.as_slice(), Some(results.as_slice())),
            _ => (&[][..], None),
        };
        let mut fields = Vec::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            let ty = p
                .ty
                .clone()
                .or_else(|| expected_params.get(i).filter(|t| t.is_concrete()).cloned())
                .ok_or_else(|| {
                    CompileError::inference(
                        format!("cannot infer the type of lambda parameter `{}`", p.name),
                        span,
                    )
                })?;
            fields.push(Field::new(p.name.clone(), ty));
        }

        self.with_scope(|this| {
            for f in &fields {
                this.scope.bind(f.name.clone(), Mutability::Val, f.ty.clone());
            }
            let result = match expected_results {
                Some([single]) if single.is_concrete() && !this.is_type_param(single) => single.clone(),
                Some([]) => Type::Void,
                _ => {
                    let ty = this.type_of(body);
                    if ty.is_nil() { Type::Any } else { ty }
                }
            };
            let stmts = this.with_frame(result.clone(), false, |this| match &body.node {
                ast::Expr::Block(stmts) => this.lower_block(stmts, &result, body.span),
                _ => this.lower_tail(body, &result),
            })?;
            Ok(Expr::FuncLit {
                params: fields.clone(),
                results: results_of(&result),
                body: stmts,
            })
        })
    }

    fn is_type_param(&self, ty: &Type) -> bool {
        ty.leaf_name()
            .map(|n| self.type_params.iter().any(|p| p == n))
            .unwrap_or(false)
    }

    fn lower_tuple(&mut self, elems: &[Spanned<ast::Expr>], expected: Option<&Type>, span: Span) -> Result<Expr> {
        let (min, max) = (self.env.config.min_tuple_arity, self.env.config.max_tuple_arity);
        if elems.len() < min || elems.len() > max {
            return Err(CompileError::pattern(
                format!(
                    "tuples have between {min} and {max} elements, found {}",
                    elems.len()
                ),
                span,
            ));
        }
        let hinted: &[Type] = match expected {
            Some(ty) if ty.tuple_arity() == Some(elems.len()) => ty.generic_args(),
            _ => &[],
        };
        let mut types_out = Vec::with_capacity(elems.len());
        let mut elts = Vec::with_capacity(elems.len());
        for (i, elem) in elems.iter().enumerate() {
            let ty = match hinted.get(i) {
                Some(t) if t.is_concrete() => t.clone(),
                _ => self.type_of(elem),
            };
            if !ty.is_concrete() {
                return Err(CompileError::inference(
                    format!("cannot infer the type of tuple element {}", i + 1),
                    elem.span,
                ));
            }
            let value = self.lower_expr(elem, Some(&ty))?;
            types_out.push(ty);
            elts.push(Element {
                key: Some(types::tuple_field(i)),
                value,
            });
        }
        Ok(Expr::Composite {
            ty: self.env.tuple_type(types_out),
            elts,
        })
    }

    /// `{ case ... }` as a one-argument function literal
    fn lower_partial(&mut self, clauses: &[CaseClause], expected: Option<&Type>, span: Span) -> Result<Expr> {
        let Some(Type::Func { params, results }) = expected else {
            return Err(CompileError::inference(
                "a case-function literal needs an expected function type",
                span,
            ));
        };
        let [param] = params.as_slice() else {
            return Err(CompileError::inference(
                format!(
                    "a case-function literal takes one argument, the expected type has {}",
                    params.len()
                ),
                span,
            ));
        };
        let result = results.first().cloned().unwrap_or(Type::Void);
        let arg = self.names.fresh();
        let subject = Spanned::new(ast::Expr::Ident(arg.clone()), span);
        let body = self.with_scope(|this| {
            this.scope.bind(arg.clone(), Mutability::Val, param.clone());
            this.with_frame(result.clone(), false, |this| {
                let position = if result.is_void() {
                    Position::Effect
                } else {
                    Position::Tail(&result)
                };
                this.lower_match(&subject, clauses, position, span)
            })
        })?;
        Ok(Expr::FuncLit {
            params: vec![Field::new(arg, param.clone())],
            results: results.clone(),
            body,
        })
    }

    /// True when `expr` reads a value that is already stored wrapped
    pub(super) fn is_wrapper_read(&mut self, expr: &Spanned<ast::Expr>) -> bool {
        match &expr.node {
            ast::Expr::Ident(name) => {
                self.scope.contains(name) && self.scope.lookup_type(name).is_immutable()
            }
            ast::Expr::Select { target, member } => {
                if let ast::Expr::Ident(q) = &target.node {
                    if !self.scope.contains(q) && self.env.is_package(q) {
                        return false;
                    }
                }
                let recv_ty = self.type_of(target);
                self.env
                    .field(&recv_ty, &member.node)
                    .map(|f| f.immutable)
                    .unwrap_or(false)
            }
            _ => false,
        }
    }
}

/// `panic(...)` never returns, so it needs no `return` in tail position
fn is_panic(expr: &Spanned<ast::Expr>) -> bool {
    match &expr.node {
        ast::Expr::Call { callee, .. } => {
            matches!(&callee.node, ast::Expr::Ident(name) if name == "panic")
        }
        _ => false,
    }
}

/// A sequence type indexed through its `Get` method
fn is_sequence(ty: &Type) -> bool {
    !matches!(ty, Type::Array { .. } | Type::Map { .. } | Type::Pointer { .. })
        && !ty.is_string()
        && !ty.is_builtin()
}

/// Statement evaluating `value` and dropping its result
pub(super) fn discard(value: Expr) -> Stmt {
    match value {
        call @ Expr::Call { .. } => Stmt::Expr(call),
        other => Stmt::assign(Expr::ident("_"), other),
    }
}
