//! Call lowering: functions, constructors, companions, methods and copies

use tracing::debug;

use super::Lowerer;
use crate::ast::{self, Arg, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::immut;
use crate::infer::{Callee, Infer, arrange_args};
use crate::metadata::{FunctionMetadata, MethodMetadata, TypeMetadata};
use crate::specialize::{self, MethodPlan};
use crate::target::{Expr, Stmt};
use crate::types::{self, Type};

/// Arguments of a callee that only takes them by position
fn positional<'x>(what: &str, args: &'x [Arg]) -> Result<Vec<&'x Spanned<ast::Expr>>> {
    match args.iter().find_map(|a| a.name.as_ref()) {
        Some(name) => Err(CompileError::pattern(
            format!("`{what}` takes positional arguments only"),
            name.span,
        )),
        None => Ok(args.iter().map(|a| &a.value).collect()),
    }
}

fn check_arity(what: &str, want: usize, got: usize, span: Span) -> Result<()> {
    if want == got {
        return Ok(());
    }
    Err(CompileError::inference(
        format!("`{what}` takes {want} arguments, found {got}"),
        span,
    ))
}

/// Type arguments of a pointer or value receiver
fn receiver_args(ty: &Type) -> &[Type] {
    match ty {
        Type::Pointer { elem } => elem.generic_args(),
        other => other.generic_args(),
    }
}

impl<'a> Lowerer<'a> {
    pub(super) fn lower_call(
        &mut self,
        callee: &Spanned<ast::Expr>,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let resolved = {
            let Self {
                env,
                scope,
                type_params,
                ..
            } = self;
            Infer::new(env, type_params).callee(scope, callee)
        };
        match resolved {
            Callee::Function(func) => self.call_function(&func, type_args, args, expected, span),
            Callee::Constructor(meta) => self.construct(&meta, type_args, args, expected, span),
            Callee::Companion(meta) => self.call_companion(&meta, type_args, args, expected, span),
            Callee::Method {
                recv,
                recv_ty,
                owner,
                name,
                sig,
            } => self.call_method(recv, &recv_ty, &owner, &name, &sig, type_args, args, expected, span),
            Callee::Copy {
                recv,
                recv_ty,
                owner,
            } => self.copy_call(recv, &recv_ty, &owner, args, span),
            Callee::Conversion(ty) => {
                let values = positional(&ty.render(), args)?;
                check_arity(&ty.render(), 1, values.len(), span)?;
                let value = self.lower_expr(values[0], None)?;
                Ok(Expr::call(Expr::Type(ty), vec![value]))
            }
            Callee::Value(Type::Func { params, .. }) => {
                let values = positional("function value", args)?;
                check_arity("function value", params.len(), values.len(), span)?;
                let fun = self.lower_expr(callee, None)?;
                let args = self.lower_args(&params, &[], None, &values)?;
                Ok(Expr::call(fun, args))
            }
            Callee::Value(ty) if !ty.is_nil() => Err(CompileError::inference(
                format!("cannot call a value of type `{ty}`"),
                callee.span,
            )),
            Callee::Value(_) | Callee::Unknown => self.call_untyped(callee, args),
        }
    }

    /// Call whose callee has no known signature: builtins and symbols of
    /// packages without metadata pass through, anything else is reported
    fn call_untyped(&mut self, callee: &Spanned<ast::Expr>, args: &[Arg]) -> Result<Expr> {
        let fun = match &callee.node {
            ast::Expr::Ident(name) if super::expr::is_builtin(name) => Expr::ident(name.as_str()),
            _ => self.lower_expr(callee, None)?,
        };
        let values = positional("call", args)?;
        let mut lowered = Vec::with_capacity(values.len());
        for value in values {
            lowered.push(self.lower_expr(value, None)?);
        }
        Ok(Expr::call(fun, lowered))
    }

    /// Resolve the type arguments of a generic callee.
    ///
    /// `Ok(None)` means they are left for the target to infer, which is only
    /// allowed when every type parameter occurs in some parameter type.
    #[allow(clippy::too_many_arguments)]
    fn callee_type_args(
        &mut self,
        what: &str,
        tparams: &[String],
        params: &[Type],
        values: &[Option<&Spanned<ast::Expr>>],
        explicit: &[Type],
        expected: Option<(&Type, &Type)>,
        span: Span,
    ) -> Result<Option<Vec<Type>>> {
        if !explicit.is_empty() && explicit.len() != tparams.len() {
            return Err(CompileError::inference(
                format!(
                    "`{what}` takes {} type arguments, found {}",
                    tparams.len(),
                    explicit.len()
                ),
                span,
            ));
        }
        let resolved = {
            let Self {
                env,
                scope,
                type_params,
                ..
            } = self;
            Infer::new(env, type_params).resolve_type_args(scope, tparams, params, values, explicit, expected)
        };
        if resolved.is_some() {
            return Ok(resolved);
        }
        let inferable = tparams
            .iter()
            .all(|p| params.iter().any(|ty| ty.mentions(std::slice::from_ref(p))));
        if inferable {
            debug!(callee = what, "type arguments left to the target");
            return Ok(None);
        }
        Err(CompileError::inference(
            format!("cannot infer the type arguments of `{what}`; pass them explicitly"),
            span,
        ))
    }

    /// Lower arguments against their parameter types. Parameters that still
    /// mention unresolved type parameters give no expected type.
    fn lower_args(
        &mut self,
        params: &[Type],
        tparams: &[String],
        targs: Option<&[Type]>,
        values: &[&Spanned<ast::Expr>],
    ) -> Result<Vec<Expr>> {
        let subst = targs
            .map(|t| types::substitution(tparams, t))
            .unwrap_or_default();
        let mut out = Vec::with_capacity(values.len());
        for (value, param) in values.iter().zip(params) {
            let expected = match targs {
                None if param.mentions(tparams) => None,
                _ => Some(param.substitute(&subst)),
            };
            out.push(self.lower_expr(value, expected.as_ref())?);
        }
        Ok(out)
    }

    fn call_function(
        &mut self,
        func: &FunctionMetadata,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let values = positional(&func.name, args)?;
        check_arity(&func.name, func.params.len(), values.len(), span)?;
        let slots: Vec<_> = values.iter().map(|v| Some(*v)).collect();
        let targs = self.callee_type_args(
            &func.name,
            &func.type_params,
            &func.params,
            &slots,
            type_args,
            expected.map(|e| (&func.result, e)),
            span,
        )?;
        let lowered = self.lower_args(&func.params, &func.type_params, targs.as_deref(), &values)?;
        self.note_package(&func.package);
        let fun = Expr::qualified(&self.env.qualifier(&func.package), func.name.clone());
        Ok(Expr::call_generic(fun, targs.unwrap_or_default(), lowered))
    }

    /// Struct construction `Name(args)` as a keyed composite literal
    fn construct(
        &mut self,
        meta: &TypeMetadata,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let slots = arrange_args(&meta.fields, args, span)?;
        check_arity(&meta.name, meta.fields.len(), slots.len(), span)?;
        let mut values = Vec::with_capacity(slots.len());
        for (name, slot) in meta.fields.iter().zip(&slots) {
            match slot {
                Some(value) => values.push(*value),
                None => {
                    return Err(CompileError::pattern(
                        format!("missing argument `{name}` for `{}`", meta.name),
                        span,
                    ));
                }
            }
        }

        let field_types: Vec<Type> = meta.field_types.iter().map(Type::strip_immutable).collect();
        let self_ty = meta.self_type(&self.env.qualifier(&meta.package));
        let targs = self
            .callee_type_args(
                &meta.name,
                &meta.type_params,
                &field_types,
                &slots,
                type_args,
                expected.map(|e| (&self_ty, e)),
                span,
            )?
            .ok_or_else(|| {
                CompileError::inference(
                    format!("cannot infer the type arguments of `{}`", meta.name),
                    span,
                )
            })?;
        let ty = Type::generic(self.env.type_ref(meta), targs);
        self.note_package(&meta.package);

        let mut elts = Vec::with_capacity(values.len());
        for (idx, value) in values.into_iter().enumerate() {
            let field_ty = meta
                .fields
                .get(idx)
                .and_then(|name| self.env.field(&ty, name))
                .map(|f| f.ty);
            let wrapper_read = self.reads_wrapper_of(value, field_ty.as_ref());
            let lowered = self.lower_expr(value, field_ty.as_ref())?;
            elts.push(immut::store_field(&self.env, meta, &ty, idx, lowered, wrapper_read, span)?);
        }
        Ok(Expr::Composite { ty, elts })
    }

    /// `Some(x)` becomes `std.Some[T]{}.Apply(x)`
    fn call_companion(
        &mut self,
        meta: &TypeMetadata,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let Some(apply) = meta.method("Apply").cloned() else {
            return Err(CompileError::inference(
                format!("`{}` cannot be called", meta.name),
                span,
            ));
        };
        let values = positional(&meta.name, args)?;
        check_arity(&meta.name, apply.params.len(), values.len(), span)?;
        let slots: Vec<_> = values.iter().map(|v| Some(*v)).collect();
        let targs = self
            .callee_type_args(
                &meta.name,
                &meta.type_params,
                &apply.params,
                &slots,
                type_args,
                expected.map(|e| (&apply.result, e)),
                span,
            )?
            .ok_or_else(|| {
                CompileError::inference(
                    format!("cannot infer the type arguments of `{}`", meta.name),
                    span,
                )
            })?;
        let lowered = self.lower_args(&apply.params, &meta.type_params, Some(&targs), &values)?;
        self.note_package(&meta.package);
        let companion = Type::generic(self.env.type_ref(meta), targs);
        Ok(Expr::method(Expr::zero(companion), "Apply", lowered))
    }

    #[allow(clippy::too_many_arguments)]
    fn call_method(
        &mut self,
        recv: &Spanned<ast::Expr>,
        recv_ty: &Type,
        owner: &TypeMetadata,
        name: &str,
        sig: &MethodMetadata,
        type_args: &[Type],
        args: &[Arg],
        expected: Option<&Type>,
        span: Span,
    ) -> Result<Expr> {
        let values = positional(name, args)?;
        check_arity(name, sig.params.len(), values.len(), span)?;
        let slots: Vec<_> = values.iter().map(|v| Some(*v)).collect();
        let own = self.callee_type_args(
            name,
            &sig.type_params,
            &sig.params,
            &slots,
            type_args,
            expected.map(|e| (&sig.result, e)),
            span,
        )?;
        let lowered = self.lower_args(&sig.params, &sig.type_params, own.as_deref(), &values)?;
        let recv_expr = self.lower_expr(recv, None)?;

        let plan = match owner.method(name) {
            Some(method) => specialize::plan(owner, name, method),
            None => MethodPlan::Keep,
        };
        match plan {
            MethodPlan::Keep => Ok(Expr::method(recv_expr, name, lowered)),
            MethodPlan::Extract { function, kept, .. } => {
                let targs = match own {
                    Some(own) => specialize::type_args(receiver_args(recv_ty), &own, &kept),
                    None => vec![],
                };
                self.note_package(&owner.package);
                let fun = Expr::qualified(&self.env.qualifier(&owner.package), function);
                let mut all = Vec::with_capacity(lowered.len() + 1);
                all.push(recv_expr);
                all.extend(lowered);
                Ok(Expr::call_generic(fun, targs, all))
            }
        }
    }

    /// True when `source` reads a wrapper whose inner type is `field_ty`
    fn reads_wrapper_of(&mut self, source: &Spanned<ast::Expr>, field_ty: Option<&Type>) -> bool {
        match field_ty {
            Some(field_ty) => self.is_wrapper_read(source) && self.type_of(source) == *field_ty,
            None => false,
        }
    }

    /// `p.Copy(age = 31)`: named overrides only
    fn copy_call(
        &mut self,
        recv: &Spanned<ast::Expr>,
        recv_ty: &Type,
        owner: &TypeMetadata,
        args: &[Arg],
        span: Span,
    ) -> Result<Expr> {
        let mut overrides: Vec<immut::Override> = Vec::with_capacity(args.len());
        for arg in args {
            let Some(name) = &arg.name else {
                return Err(CompileError::pattern(
                    "`Copy` takes named arguments only",
                    arg.value.span,
                ));
            };
            if overrides.iter().any(|o| o.field == name.node) {
                return Err(CompileError::pattern(
                    format!("argument `{}` given twice", name.node),
                    name.span,
                ));
            }
            let Some(field) = self.env.field(recv_ty, &name.node) else {
                return Err(immut::unknown_field(&self.env, recv_ty, &name.node, name.span));
            };
            let wrapper_read = self.reads_wrapper_of(&arg.value, Some(&field.ty));
            let value = self.lower_expr(&arg.value, Some(&field.ty))?;
            overrides.push(immut::Override {
                field: name.node.clone(),
                value,
                wrapper_read,
            });
        }

        let recv_expr = self.lower_expr(recv, None)?;
        if recv_expr.is_pure_read() {
            return immut::copy_struct(&self.env, owner, &recv_expr, recv_ty, overrides, span);
        }
        // Evaluate the receiver once
        let tmp = self.names.fresh();
        let copy = immut::copy_struct(&self.env, owner, &Expr::ident(tmp.as_str()), recv_ty, overrides, span)?;
        Ok(Expr::immediately_invoked(
            vec![recv_ty.clone()],
            vec![Stmt::define(tmp, recv_expr), Stmt::ret(copy)],
        ))
    }
}
