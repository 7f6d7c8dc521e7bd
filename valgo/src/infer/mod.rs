//! Type inference for source expressions
//!
//! Two tiers. The first reads a type off the node's shape: literals, scope
//! lookups, declared field and return types. The second unifies declared
//! parameter types with argument types, and only runs when the first tier
//! yields nothing usable (`Nil`, `Any`, or a type still mentioning the
//! callee's own type parameters).
//!
//! Inference never fails. A node whose type cannot be determined is `Nil`;
//! the lowering driver decides whether that is an error.

pub mod unify;

use tracing::debug;

use crate::ast::{Arg, BinOp, CaseClause, Expr, LambdaParam, Spanned, Stmt, UnOp};
use crate::error::{CompileError, Result};
use crate::metadata::{Env, FunctionMetadata, MethodMetadata, TypeKind, TypeMetadata};
use crate::pattern;
use crate::scope::{Mutability, ScopeStack};
use crate::types::{self, Type};
use crate::util;

pub use unify::{Unifier, unify_all};

/// Fixed type of a literal node
pub fn literal_type(expr: &Expr) -> Option<Type> {
    match expr {
        Expr::IntLit(_) => Some(Type::int()),
        Expr::FloatLit(_) => Some(Type::float64()),
        Expr::StringLit(_) => Some(Type::string()),
        Expr::CharLit(_) => Some(Type::basic("rune")),
        Expr::BoolLit(_) => Some(Type::bool()),
        Expr::Nil => Some(Type::Nil),
        _ => None,
    }
}

/// What a call's callee resolves to
#[derive(Debug, Clone)]
pub enum Callee<'x> {
    /// Top-level function, own or imported
    Function(FunctionMetadata),
    /// Struct constructor
    Constructor(TypeMetadata),
    /// Companion object; the call goes through its `Apply`
    Companion(TypeMetadata),
    /// Method on a receiver expression
    Method {
        recv: &'x Spanned<Expr>,
        recv_ty: Type,
        owner: TypeMetadata,
        name: String,
        sig: MethodMetadata,
    },
    /// Generated struct copy with named overrides
    Copy {
        recv: &'x Spanned<Expr>,
        recv_ty: Type,
        owner: TypeMetadata,
    },
    /// Builtin conversion such as `float64(x)`
    Conversion(Type),
    /// Any other func-valued expression
    Value(Type),
    Unknown,
}

/// Arrange call arguments in declared parameter order.
///
/// Arguments are all positional or all named. Missing named arguments are
/// `None`; the caller decides whether that is allowed.
pub fn arrange_args<'x>(
    names: &[String],
    args: &'x [Arg],
    span: crate::ast::Span,
) -> Result<Vec<Option<&'x Spanned<Expr>>>> {
    let named = args.iter().filter(|a| a.name.is_some()).count();
    if named == 0 {
        return Ok(args.iter().map(|a| Some(&a.value)).collect());
    }
    if named != args.len() {
        return Err(CompileError::pattern(
            "cannot mix named and positional arguments",
            span,
        ));
    }
    let mut slots: Vec<Option<&Spanned<Expr>>> = vec![None; names.len()];
    for arg in args {
        let Some(name) = &arg.name else { continue };
        match names.iter().position(|n| *n == name.node) {
            Some(idx) if slots[idx].is_none() => slots[idx] = Some(&arg.value),
            Some(_) => {
                return Err(CompileError::pattern(
                    format!("argument `{}` given twice", name.node),
                    name.span,
                ));
            }
            None => {
                let suggestion = util::find_similar_name(
                    &name.node,
                    names.iter().map(String::as_str),
                    util::suggestion_threshold(&name.node),
                );
                return Err(CompileError::pattern(
                    format!(
                        "unknown argument `{}`{}",
                        name.node,
                        util::format_suggestion_hint(suggestion)
                    ),
                    name.span,
                ));
            }
        }
    }
    Ok(slots)
}

/// Inference context: the lookup environment and the type parameters in scope
pub struct Infer<'e, 'a> {
    env: &'e Env<'a>,
    type_params: &'e [String],
}

impl<'e, 'a> Infer<'e, 'a> {
    pub fn new(env: &'e Env<'a>, type_params: &'e [String]) -> Self {
        Self { env, type_params }
    }

    /// True when `ty` is one of the enclosing declaration's type parameters
    pub fn is_type_param(&self, ty: &Type) -> bool {
        ty.leaf_name()
            .map(|n| self.type_params.iter().any(|p| p == n))
            .unwrap_or(false)
    }

    /// Type of `expr` in `scope`. Frames pushed here are popped before return.
    pub fn expr_type(&self, scope: &mut ScopeStack, expr: &Spanned<Expr>) -> Type {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.expr_type_inner(scope, expr))
    }

    fn expr_type_inner(&self, scope: &mut ScopeStack, expr: &Spanned<Expr>) -> Type {
        if let Some(ty) = literal_type(&expr.node) {
            return ty;
        }
        match &expr.node {
            Expr::Ident(name) => self.ident_type(scope, name),
            Expr::Select { target, member } => self.select_type(scope, target, &member.node),
            Expr::Call {
                callee,
                type_args,
                args,
            } => self.call_type(scope, callee, type_args, args, None),
            Expr::Index { target, .. } => self.index_type(scope, target),
            Expr::Binary { left, op, right } => self.binary_type(scope, left, *op, right),
            Expr::Unary { op, expr } => match op {
                UnOp::Not => Type::bool(),
                UnOp::Neg | UnOp::BitNot => self.expr_type(scope, expr),
            },
            Expr::Lambda { params, body } => self.lambda_type(scope, params, body, &[]),
            Expr::If {
                then_branch,
                else_branch,
                ..
            } => {
                let Some(else_branch) = else_branch else {
                    return Type::Void;
                };
                let then_ty = self.expr_type(scope, then_branch);
                if then_ty.is_nil() {
                    self.expr_type(scope, else_branch)
                } else {
                    then_ty
                }
            }
            Expr::Match { subject, clauses } => self.match_type(scope, subject, clauses, None),
            Expr::Tuple(elems) => {
                let elems: Vec<Type> = elems.iter().map(|e| self.expr_type(scope, e)).collect();
                self.env.tuple_type(elems)
            }
            // Only typeable against an expected function type
            Expr::PartialFunction(_) => Type::Nil,
            Expr::Block(stmts) => self.block_type(scope, stmts),
            _ => Type::Nil,
        }
    }

    /// Scope type with the wrapper looked through; reads insert `Get`
    pub fn ident_type(&self, scope: &ScopeStack, name: &str) -> Type {
        let ty = scope.lookup_type(name);
        if !ty.is_nil() {
            return ty.strip_immutable();
        }
        match self.env.lookup_function(name) {
            Some(func) if func.type_params.is_empty() => Type::func(
                func.params.clone(),
                results_of(&func.result),
            ),
            _ => Type::Nil,
        }
    }

    fn select_type(&self, scope: &mut ScopeStack, target: &Spanned<Expr>, member: &str) -> Type {
        if let Expr::Ident(qualifier) = &target.node {
            if !scope.contains(qualifier) && self.env.is_package(qualifier) {
                return match self.env.lookup_function(&format!("{qualifier}.{member}")) {
                    Some(func) if func.type_params.is_empty() => {
                        Type::func(func.params.clone(), results_of(&func.result))
                    }
                    _ => Type::Nil,
                };
            }
        }
        let recv = self.expr_type(scope, target).strip_immutable();
        if let Some(field) = self.env.field(&recv, member) {
            return field.ty;
        }
        match self.env.method_signature(&recv, member) {
            Some(sig) if sig.type_params.is_empty() => {
                Type::func(sig.params, results_of(&sig.result))
            }
            _ => Type::Nil,
        }
    }

    fn index_type(&self, scope: &mut ScopeStack, target: &Spanned<Expr>) -> Type {
        let ty = self.expr_type(scope, target).strip_immutable();
        match &ty {
            Type::Array { elem } | Type::Map { elem, .. } => elem.as_ref().clone(),
            t if t.is_string() => Type::basic("byte"),
            t => self
                .env
                .method_signature(t, "Get")
                .filter(|sig| sig.params.len() == 1)
                .map(|sig| sig.result)
                .unwrap_or(Type::Nil),
        }
    }

    fn binary_type(
        &self,
        scope: &mut ScopeStack,
        left: &Spanned<Expr>,
        op: BinOp,
        right: &Spanned<Expr>,
    ) -> Type {
        if op.is_comparison() || op.is_logical() {
            return Type::bool();
        }
        let l = self.expr_type(scope, left);
        let r = self.expr_type(scope, right);
        if left.node.is_numeric_literal() && r.is_numeric() && !right.node.is_numeric_literal() {
            return r;
        }
        if l.is_nil() { r } else { l }
    }

    /// Func type of a lambda; parameter types come from annotations, then
    /// from `expected_params` by position
    pub fn lambda_type(
        &self,
        scope: &mut ScopeStack,
        params: &[LambdaParam],
        body: &Spanned<Expr>,
        expected_params: &[Type],
    ) -> Type {
        let param_types: Vec<Type> = params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.ty.clone()
                    .or_else(|| expected_params.get(i).cloned())
                    .unwrap_or(Type::Nil)
            })
            .collect();
        let body_ty = scope.scoped(|scope| {
            for (p, ty) in params.iter().zip(param_types.iter()) {
                scope.bind(p.name.clone(), Mutability::Val, ty.clone());
            }
            self.expr_type(scope, body)
        });
        Type::func(param_types, results_of(&body_ty))
    }

    /// Type of a block: its tail expression, `Void` without one
    pub fn block_type(&self, scope: &mut ScopeStack, stmts: &[Spanned<Stmt>]) -> Type {
        scope.scoped(|scope| {
            let mut tail = Type::Void;
            for stmt in stmts {
                tail = Type::Void;
                match &stmt.node {
                    Stmt::Val(decl) => {
                        let ty = match &decl.ty {
                            Some(ty) => ty.clone(),
                            None => self.expr_type(scope, &decl.value),
                        };
                        let class = if decl.mutable {
                            Mutability::Var
                        } else {
                            Mutability::Val
                        };
                        scope.bind(decl.name.node.clone(), class, ty);
                    }
                    Stmt::Expr(e) => tail = self.expr_type(scope, e),
                    Stmt::Assign { .. } | Stmt::Return(_) | Stmt::While { .. } => {}
                }
            }
            tail
        })
    }

    /// Reconciled type of a match; `declared` is the receiving binding's type
    pub fn match_type(
        &self,
        scope: &mut ScopeStack,
        subject: &Spanned<Expr>,
        clauses: &[CaseClause],
        declared: Option<&Type>,
    ) -> Type {
        let subject_ty = self.expr_type(scope, subject);
        let clause_types: Vec<Type> = clauses
            .iter()
            .map(|clause| self.clause_type(scope, clause, &subject_ty))
            .collect();
        if !clause_types.is_empty() && clause_types.iter().all(Type::is_void) {
            return Type::Void;
        }
        pattern::reconcile::reference_type(&clause_types, declared, self.type_params)
            .unwrap_or(Type::Any)
    }

    /// Body type of one clause with the pattern's bindings in scope
    pub fn clause_type(&self, scope: &mut ScopeStack, clause: &CaseClause, subject_ty: &Type) -> Type {
        let bindings = pattern::binding_types(self.env, &clause.pattern, subject_ty);
        scope.scoped(|scope| {
            for (name, ty) in bindings {
                scope.bind(name, Mutability::Val, ty);
            }
            self.expr_type(scope, &clause.body)
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Resolve what a callee expression denotes
    pub fn callee<'x>(&self, scope: &mut ScopeStack, callee: &'x Spanned<Expr>) -> Callee<'x> {
        match &callee.node {
            Expr::Ident(name) => {
                if scope.contains(name) {
                    return Callee::Value(scope.lookup_type(name).strip_immutable());
                }
                self.named_callee(name)
            }
            Expr::Select { target, member } => {
                if let Expr::Ident(qualifier) = &target.node {
                    if !scope.contains(qualifier) && self.env.is_package(qualifier) {
                        return self.named_callee(&format!("{qualifier}.{}", member.node));
                    }
                }
                let recv_ty = self.expr_type(scope, target).strip_immutable();
                let member = member.node.as_str();
                if let Some((owner, method)) = self.env.method(&recv_ty, member) {
                    let owner = owner.clone();
                    let subst = self.env.receiver_substitution(&owner, &recv_ty);
                    let sig = MethodMetadata {
                        params: method.params.iter().map(|p| p.substitute(&subst)).collect(),
                        result: method.result.substitute(&subst),
                        type_params: method.type_params.clone(),
                        generic: method.generic,
                    };
                    return Callee::Method {
                        recv: target,
                        recv_ty,
                        owner,
                        name: member.to_string(),
                        sig,
                    };
                }
                if member == "Copy" {
                    if let Some(owner) = self.env.type_meta(&recv_ty) {
                        if owner.kind == TypeKind::Struct {
                            return Callee::Copy {
                                recv: target,
                                recv_ty: recv_ty.clone(),
                                owner: owner.clone(),
                            };
                        }
                    }
                }
                match self.env.field(&recv_ty, member) {
                    Some(field) if matches!(field.ty, Type::Func { .. }) => Callee::Value(field.ty),
                    _ => Callee::Unknown,
                }
            }
            _ => Callee::Value(self.expr_type(scope, callee)),
        }
    }

    fn named_callee<'x>(&self, name: &str) -> Callee<'x> {
        if let Some(func) = self.env.lookup_function(name) {
            return Callee::Function(func.clone());
        }
        if let Some(meta) = self.env.lookup_type(name) {
            return match meta.kind {
                TypeKind::Companion => Callee::Companion(meta.clone()),
                TypeKind::Struct => Callee::Constructor(meta.clone()),
                _ => Callee::Unknown,
            };
        }
        let ty = Type::basic(name);
        if ty.is_builtin() {
            return Callee::Conversion(ty);
        }
        Callee::Unknown
    }

    /// Result type of a call; `expected` is the type the context wants
    pub fn call_type(
        &self,
        scope: &mut ScopeStack,
        callee: &Spanned<Expr>,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
    ) -> Type {
        match self.callee(scope, callee) {
            Callee::Function(func) => {
                let values: Vec<Option<&Spanned<Expr>>> = args.iter().map(|a| Some(&a.value)).collect();
                match self.resolve_type_args(
                    scope,
                    &func.type_params,
                    &func.params,
                    &values,
                    type_args,
                    expected.map(|e| (&func.result, e)),
                ) {
                    Some(targs) => {
                        func.result.substitute(&types::substitution(&func.type_params, &targs))
                    }
                    None => Type::Nil,
                }
            }
            Callee::Constructor(meta) => {
                let values = arrange_args(&meta.fields, args, callee.span)
                    .unwrap_or_else(|_| args.iter().map(|a| Some(&a.value)).collect());
                let self_ty = meta.self_type(&self.env.qualifier(&meta.package));
                match self.resolve_type_args(
                    scope,
                    &meta.type_params,
                    &meta.field_types,
                    &values,
                    type_args,
                    expected.map(|e| (&self_ty, e)),
                ) {
                    Some(targs) => {
                        Type::generic(self.env.type_ref(&meta), targs)
                    }
                    None => Type::Nil,
                }
            }
            Callee::Companion(meta) => {
                let Some(apply) = meta.method("Apply") else {
                    return Type::Nil;
                };
                let values: Vec<Option<&Spanned<Expr>>> = args.iter().map(|a| Some(&a.value)).collect();
                match self.resolve_type_args(
                    scope,
                    &meta.type_params,
                    &apply.params,
                    &values,
                    type_args,
                    expected.map(|e| (&apply.result, e)),
                ) {
                    Some(targs) => apply
                        .result
                        .substitute(&types::substitution(&meta.type_params, &targs)),
                    None => Type::Nil,
                }
            }
            Callee::Method { sig, .. } => {
                let values: Vec<Option<&Spanned<Expr>>> = args.iter().map(|a| Some(&a.value)).collect();
                match self.resolve_type_args(
                    scope,
                    &sig.type_params,
                    &sig.params,
                    &values,
                    type_args,
                    expected.map(|e| (&sig.result, e)),
                ) {
                    Some(targs) => sig
                        .result
                        .substitute(&types::substitution(&sig.type_params, &targs)),
                    None => Type::Nil,
                }
            }
            Callee::Copy { recv_ty, .. } => recv_ty,
            Callee::Conversion(ty) => ty,
            Callee::Value(Type::Func { results, .. }) => {
                results.into_iter().next().unwrap_or(Type::Void)
            }
            Callee::Value(_) | Callee::Unknown => Type::Nil,
        }
    }

    /// Type arguments of a generic callee.
    ///
    /// Explicit arguments win. Otherwise non-lambda arguments are unified
    /// first, then lambdas are typed against the partially resolved parameter
    /// types and unified in turn. `expected` pairs the declared result with
    /// the context's expected type. `None` when any parameter stays unbound.
    pub fn resolve_type_args(
        &self,
        scope: &mut ScopeStack,
        type_params: &[String],
        params: &[Type],
        args: &[Option<&Spanned<Expr>>],
        explicit: &[Type],
        expected: Option<(&Type, &Type)>,
    ) -> Option<Vec<Type>> {
        if type_params.is_empty() {
            return Some(vec![]);
        }
        if explicit.len() == type_params.len() {
            return Some(explicit.to_vec());
        }

        let mut unifier = Unifier::new(type_params);
        let pairs: Vec<(&Type, &Spanned<Expr>)> = params
            .iter()
            .zip(args.iter())
            .filter_map(|(p, a)| a.map(|a| (p, a)))
            .collect();

        for (param, arg) in &pairs {
            if matches!(arg.node, Expr::Lambda { .. } | Expr::PartialFunction(_)) {
                continue;
            }
            let arg_ty = self.expr_type(scope, arg);
            unifier.unify(param, &arg_ty).ok()?;
        }

        for (param, arg) in &pairs {
            let Expr::Lambda { params: lambda_params, body } = &arg.node else {
                continue;
            };
            let expected_params = match unifier.apply(param) {
                Type::Func { params, .. } => params,
                _ => vec![],
            };
            let lambda_ty = self.lambda_type(scope, lambda_params, body, &expected_params);
            unifier.unify(param, &lambda_ty).ok()?;
        }

        if let Some((declared, wanted)) = expected {
            if unifier.resolve().is_none() && !wanted.is_any() {
                unifier.unify(declared, wanted).ok()?;
            }
        }

        let resolved = unifier.resolve();
        if resolved.is_some() {
            debug!(params = ?type_params, "type arguments inferred by unification");
        }
        resolved
    }
}

/// Result list of a func type for a declared result
pub fn results_of(result: &Type) -> Vec<Type> {
    if result.is_void() {
        vec![]
    } else {
        vec![result.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::config::LowerConfig;
    use crate::metadata::{Metadata, ProgramIndex};

    fn with_env<R>(decls: Vec<Spanned<crate::ast::Decl>>, f: impl FnOnce(&Env) -> R) -> R {
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let index = ProgramIndex::build(&program(decls), "std").unwrap();
        let env = Env::new(index, &metadata, &config);
        f(&env)
    }

    fn t(name: &str) -> Type {
        Type::basic(name)
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(literal_type(&int(1).node), Some(Type::int()));
        assert_eq!(literal_type(&float(1.5).node), Some(Type::float64()));
        assert_eq!(literal_type(&Expr::CharLit('a')), Some(Type::basic("rune")));
        assert_eq!(literal_type(&nil().node), Some(Type::Nil));
        assert_eq!(literal_type(&ident("x").node), None);
    }

    #[test]
    fn test_ident_looks_through_wrapper() {
        with_env(vec![], |env| {
            let mut scope = ScopeStack::new();
            scope.bind("x", Mutability::Val, Type::immutable("std", Type::int()).unwrap());
            let infer = Infer::new(env, &[]);
            assert_eq!(infer.expr_type(&mut scope, &ident("x")), Type::int());
            assert_eq!(infer.expr_type(&mut scope, &ident("nope")), Type::Nil);
        });
    }

    #[test]
    fn test_generic_call_unifies_arguments() {
        let identity = generic_func(
            "identity",
            &["T"],
            vec![("v", t("T"))],
            Some(t("T")),
            ident("v"),
        );
        with_env(vec![identity], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            let e = call(ident("identity"), vec![string("hi")]);
            assert_eq!(infer.expr_type(&mut scope, &e), Type::string());
        });
    }

    #[test]
    fn test_lambda_typed_after_other_arguments() {
        let map_fn = generic_func(
            "apply",
            &["A", "B"],
            vec![("v", t("A")), ("f", Type::func(vec![t("A")], vec![t("B")]))],
            Some(t("B")),
            call(ident("f"), vec![ident("v")]),
        );
        with_env(vec![map_fn], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            let e = call(
                ident("apply"),
                vec![
                    int(3),
                    lambda(vec![("x", None)], binary(ident("x"), BinOp::Gt, int(1))),
                ],
            );
            assert_eq!(infer.expr_type(&mut scope, &e), Type::bool());
        });
    }

    #[test]
    fn test_uninferable_call_is_nil() {
        let empty = generic_func("empty", &["T"], vec![], Some(t("T")), nil());
        with_env(vec![empty], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            assert_eq!(infer.expr_type(&mut scope, &call(ident("empty"), vec![])), Type::Nil);
            let explicit = call_targs(ident("empty"), vec![Type::int()], vec![]);
            assert_eq!(infer.expr_type(&mut scope, &explicit), Type::int());
        });
    }

    #[test]
    fn test_field_and_constructor_types() {
        let boxed = struct_decl("Box", &["T"], vec![field("value", t("T"))]);
        with_env(vec![boxed], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            let ctor = call(ident("Box"), vec![int(1)]);
            assert_eq!(infer.expr_type(&mut scope, &ctor).render(), "Box[int]");
            let read = select(ctor, "value");
            assert_eq!(infer.expr_type(&mut scope, &read), Type::int());
        });
    }

    #[test]
    fn test_companion_apply_result() {
        with_env(vec![], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            let some = call(ident("Some"), vec![int(4)]);
            assert_eq!(infer.expr_type(&mut scope, &some).render(), "std.Option[int]");
        });
    }

    #[test]
    fn test_inference_is_idempotent() {
        with_env(vec![], |env| {
            let mut scope = ScopeStack::new();
            let infer = Infer::new(env, &[]);
            let e = block(vec![
                let_val("a", int(1)),
                expr_stmt(lambda(vec![("x", Some(Type::int()))], binary(ident("x"), BinOp::Add, ident("a")))),
            ]);
            let depth = scope.depth();
            let first = infer.expr_type(&mut scope, &e);
            let second = infer.expr_type(&mut scope, &e);
            assert_eq!(first, second);
            assert_eq!(first.render(), "func(int) int");
            assert_eq!(scope.depth(), depth);
            assert!(!scope.contains("a"));
        });
    }

    #[test]
    fn test_numeric_literal_takes_other_operand() {
        with_env(vec![], |env| {
            let mut scope = ScopeStack::new();
            scope.bind("r", Mutability::Val, Type::float64());
            let infer = Infer::new(env, &[]);
            let e = binary(int(2), BinOp::Mul, ident("r"));
            assert_eq!(infer.expr_type(&mut scope, &e), Type::float64());
        });
    }

    #[test]
    fn test_arrange_args() {
        let names = vec!["name".to_string(), "age".to_string()];
        let args = vec![named("age", int(3)), named("name", string("a"))];
        let slots = arrange_args(&names, &args, crate::ast::Span::synthetic()).unwrap();
        assert!(matches!(slots[0].map(|e| &e.node), Some(Expr::StringLit(_))));
        assert!(matches!(slots[1].map(|e| &e.node), Some(Expr::IntLit(3))));

        let mixed = vec![arg(string("a")), named("age", int(3))];
        let err = arrange_args(&names, &mixed, crate::ast::Span::synthetic()).unwrap_err();
        assert!(err.message().contains("cannot mix"));

        let typo = vec![named("agee", int(3))];
        let err = arrange_args(&names, &typo, crate::ast::Span::synthetic()).unwrap_err();
        assert!(err.message().contains("did you mean `age`"));
    }
}
