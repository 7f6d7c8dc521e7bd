//! Declaration lowering

use tracing::debug;

use super::Lowerer;
use crate::ast::{self, Decl, FuncDecl, Program, SealedDecl, Span, StructDecl, ValDecl};
use crate::error::{CompileError, Result};
use crate::immut;
use crate::infer::results_of;
use crate::metadata::{TypeMetadata, unapply_result};
use crate::names::TempNames;
use crate::scope::Mutability;
use crate::specialize::{self, MethodPlan};
use crate::target::{self, BinOp, Element, Expr, Field, Stmt};
use crate::types::{self, Type};

/// Tag field of a lowered sealed type
pub const VARIANT_TAG: &str = "_variant";

fn type_params(params: &[ast::TypeParam]) -> Vec<target::TypeParam> {
    params
        .iter()
        .map(|p| target::TypeParam {
            name: p.name.clone(),
            constraint: p.constraint.clone().unwrap_or(Type::Any),
        })
        .collect()
}

fn any_params(names: &[String]) -> Vec<target::TypeParam> {
    names
        .iter()
        .map(|name| target::TypeParam {
            name: name.clone(),
            constraint: Type::Any,
        })
        .collect()
}

impl<'a> Lowerer<'a> {
    pub(super) fn lower_decls(&mut self, program: &Program) -> Result<Vec<target::Decl>> {
        // Package-level bindings are visible to every function body
        for decl in &program.decls {
            if let Decl::Val(v) = &decl.node {
                let ty = self.binding_type(v)?;
                let (class, ty) = if v.mutable {
                    (Mutability::Var, ty)
                } else {
                    let wrapped = immut::wrapper_type(&self.env, &ty, v.name.span)?;
                    (Mutability::Val, wrapped)
                };
                self.scope.bind(v.name.node.clone(), class, ty);
            }
        }

        let mut out = Vec::new();
        for decl in &program.decls {
            debug!(name = decl.node.name(), "lowering declaration");
            match &decl.node {
                Decl::Val(v) => out.push(self.lower_global(v)?),
                Decl::Func(f) => out.push(self.lower_func(f)?),
                Decl::Struct(s) => out.push(self.lower_struct(s)?),
                Decl::Sealed(s) => out.extend(self.lower_sealed(s)?),
                Decl::TypeAlias(a) => out.push(target::Decl::Alias {
                    name: a.name.node.clone(),
                    type_params: type_params(&a.type_params),
                    ty: a.ty.clone(),
                }),
            }
        }
        Ok(out)
    }

    /// Declared type of a binding, else its inferred type
    pub(super) fn binding_type(&mut self, decl: &ValDecl) -> Result<Type> {
        let ty = match &decl.ty {
            Some(ty) => ty.clone(),
            None => self.type_of(&decl.value),
        };
        if ty.is_nil() || ty.is_void() {
            return Err(CompileError::inference(
                format!("cannot infer the type of `{}`; add a type annotation", decl.name.node),
                decl.name.span,
            ));
        }
        Ok(ty)
    }

    fn lower_global(&mut self, decl: &ValDecl) -> Result<target::Decl> {
        let ty = self.binding_type(decl)?;
        let value = self.lower_expr(&decl.value, Some(&ty))?;
        if decl.mutable {
            return Ok(target::Decl::Var {
                name: decl.name.node.clone(),
                ty: Some(ty),
                value: Some(value),
            });
        }
        let wrapped_ty = immut::wrapper_type(&self.env, &ty, decl.name.span)?;
        let value = self.store_value(&decl.value, value, &ty)?;
        Ok(target::Decl::Var {
            name: decl.name.node.clone(),
            ty: Some(wrapped_ty),
            value: Some(value),
        })
    }

    fn lower_func(&mut self, f: &FuncDecl) -> Result<target::Decl> {
        let result = f.result.clone().unwrap_or(Type::Void);
        let params: Vec<Field> = f
            .params
            .iter()
            .map(|p| Field::new(p.name.node.clone(), p.ty.clone()))
            .collect();

        let Some(recv) = &f.receiver else {
            let scope_params: Vec<String> = f.type_params.iter().map(|p| p.name.clone()).collect();
            let body = self.lower_body(f, &scope_params, None, &result)?;
            return Ok(target::Decl::Func(target::FuncDecl {
                name: f.name.node.clone(),
                type_params: type_params(&f.type_params),
                receiver: None,
                params,
                results: results_of(&result),
                body,
            }));
        };

        let recv_params: Vec<String> = recv
            .ty
            .generic_args()
            .iter()
            .filter_map(|a| a.leaf_name().map(str::to_string))
            .collect();
        let base = recv.ty.base_name();
        let plan = match self.env.index.types.get(&base) {
            Some(owner) => match owner.method(&f.name.node) {
                Some(method) => specialize::plan(owner, &f.name.node, method),
                None => MethodPlan::Keep,
            },
            None => MethodPlan::Keep,
        };

        match plan {
            MethodPlan::Keep => {
                let body = self.lower_body(f, &recv_params, Some(recv), &result)?;
                Ok(target::Decl::Func(target::FuncDecl {
                    name: f.name.node.clone(),
                    type_params: vec![],
                    receiver: Some(Field::new(recv.name.clone(), recv.ty.clone())),
                    params,
                    results: results_of(&result),
                    body,
                }))
            }
            MethodPlan::Extract { function, kept, .. } => {
                let own: Vec<String> = f
                    .type_params
                    .iter()
                    .zip(kept.iter().chain(std::iter::repeat(&true)))
                    .filter(|(_, keep)| **keep)
                    .map(|(p, _)| p.name.clone())
                    .collect();
                let mut scope_params = recv_params.clone();
                scope_params.extend(own.iter().cloned());
                let body = self.lower_body(f, &scope_params, Some(recv), &result)?;

                let mut all_params = vec![Field::new(recv.name.clone(), recv.ty.clone())];
                all_params.extend(params);
                let mut tparams = any_params(&recv_params);
                tparams.extend(
                    f.type_params
                        .iter()
                        .filter(|p| own.contains(&p.name))
                        .map(|p| target::TypeParam {
                            name: p.name.clone(),
                            constraint: p.constraint.clone().unwrap_or(Type::Any),
                        }),
                );
                Ok(target::Decl::Func(target::FuncDecl {
                    name: function,
                    type_params: tparams,
                    receiver: None,
                    params: all_params,
                    results: results_of(&result),
                    body,
                }))
            }
        }
    }

    /// Body of a function or method; parameters and the receiver are plain
    /// value bindings
    fn lower_body(
        &mut self,
        f: &FuncDecl,
        scope_params: &[String],
        recv: Option<&ast::Receiver>,
        result: &Type,
    ) -> Result<Vec<Stmt>> {
        let saved = std::mem::replace(&mut self.type_params, scope_params.to_vec());
        let body = self.with_scope(|this| {
            if let Some(recv) = recv {
                this.scope.bind(recv.name.clone(), Mutability::Val, recv.ty.clone());
            }
            for p in &f.params {
                this.scope.bind(p.name.node.clone(), Mutability::Val, p.ty.clone());
            }
            this.with_frame(result.clone(), false, |this| match &f.body.node {
                ast::Expr::Block(stmts) => this.lower_block(stmts, result, f.body.span),
                _ => this.lower_tail(&f.body, result),
            })
        });
        self.type_params = saved;
        body
    }

    fn lower_struct(&mut self, s: &StructDecl) -> Result<target::Decl> {
        let mut fields = Vec::with_capacity(s.fields.len());
        for field in &s.fields {
            let ty = if field.mutable {
                field.ty.clone()
            } else {
                immut::wrapper_type(&self.env, &field.ty, field.name.span)?
            };
            fields.push(Field::new(field.name.node.clone(), ty));
        }
        Ok(target::Decl::Struct {
            name: s.name.node.clone(),
            type_params: type_params(&s.type_params),
            fields,
        })
    }

    /// A sealed type becomes a tagged struct holding the union of its
    /// variants' fields, one tag constant per variant, and one companion
    /// type per variant with `Apply` and `Unapply`
    fn lower_sealed(&mut self, s: &SealedDecl) -> Result<Vec<target::Decl>> {
        let name = s.name.node.clone();
        let meta = self.env.index.types.get(&name).cloned().ok_or_else(|| {
            CompileError::invariant(format!("sealed type `{name}` missing from the index"), s.span)
        })?;
        let tparams = type_params(&s.type_params);
        let self_ty = meta.self_type("");

        let mut fields = vec![Field::new(VARIANT_TAG, Type::basic("uint8"))];
        for (idx, field) in meta.fields.iter().enumerate() {
            let declared = meta.field_types[idx].clone();
            let ty = if meta.immut_flags.get(idx).copied().unwrap_or(true) {
                immut::wrapper_type(&self.env, &declared, s.span)?
            } else {
                declared
            };
            fields.push(Field::new(field.clone(), ty));
        }

        let mut out = vec![target::Decl::Struct {
            name: name.clone(),
            type_params: tparams.clone(),
            fields,
        }];
        for (tag, variant) in s.variants.iter().enumerate() {
            out.push(target::Decl::Const {
                name: TempNames::variant_tag(&name, &variant.name.node),
                ty: Some(Type::basic("uint8")),
                value: Expr::int(tag as i64),
            });
        }
        for variant in &s.variants {
            let companion = variant.name.node.clone();
            let companion_ty = Type::generic(
                Type::local(companion.clone()),
                meta.type_params.iter().map(Type::basic).collect(),
            );
            let tag = Expr::ident(TempNames::variant_tag(&name, &companion));
            out.push(target::Decl::Struct {
                name: companion.clone(),
                type_params: tparams.clone(),
                fields: vec![],
            });
            out.push(self.variant_apply(&meta, &self_ty, &companion_ty, variant, tag.clone(), s.span)?);
            out.push(self.variant_unapply(&self_ty, &companion_ty, variant, tag));
        }
        Ok(out)
    }

    fn variant_apply(
        &self,
        meta: &TypeMetadata,
        self_ty: &Type,
        companion_ty: &Type,
        variant: &ast::Variant,
        tag: Expr,
        span: Span,
    ) -> Result<target::Decl> {
        let mut elts = vec![Element {
            key: Some(VARIANT_TAG.to_string()),
            value: tag,
        }];
        for field in &variant.fields {
            let idx = meta.field_index(&field.name.node).ok_or_else(|| {
                CompileError::invariant(
                    format!("variant field `{}` missing from the index", field.name.node),
                    span,
                )
            })?;
            elts.push(immut::store_field(
                &self.env,
                meta,
                self_ty,
                idx,
                Expr::ident(field.name.node.clone()),
                false,
                span,
            )?);
        }
        Ok(target::Decl::Func(target::FuncDecl {
            name: "Apply".into(),
            type_params: vec![],
            receiver: Some(Field::new("", companion_ty.clone())),
            params: variant
                .fields
                .iter()
                .map(|f| Field::new(f.name.node.clone(), f.ty.clone()))
                .collect(),
            results: vec![self_ty.clone()],
            body: vec![Stmt::ret(Expr::Composite {
                ty: self_ty.clone(),
                elts,
            })],
        }))
    }

    fn variant_unapply(
        &self,
        self_ty: &Type,
        companion_ty: &Type,
        variant: &ast::Variant,
        tag: Expr,
    ) -> target::Decl {
        let subject = "s";
        let is_variant = Expr::binary(
            BinOp::Eq,
            Expr::select(Expr::ident(subject), VARIANT_TAG),
            tag,
        );
        let field_types: Vec<Type> = variant.fields.iter().map(|f| f.ty.clone()).collect();
        let result = unapply_result(self.env.runtime(), field_types);
        let read = |f: &ast::StructField| {
            let select = Expr::select(Expr::ident(subject), f.name.node.clone());
            if f.mutable { select } else { immut::read(select) }
        };

        let body = if variant.fields.is_empty() {
            vec![Stmt::ret(is_variant)]
        } else {
            let payload_ty = result.generic_args().first().cloned().unwrap_or(Type::Any);
            let payload = match variant.fields.as_slice() {
                [single] => read(single),
                many => Expr::Composite {
                    ty: payload_ty.clone(),
                    elts: many
                        .iter()
                        .enumerate()
                        .map(|(i, f)| Element {
                            key: Some(types::tuple_field(i)),
                            value: read(f),
                        })
                        .collect(),
                },
            };
            let runtime = self.env.runtime();
            let companion = |name: &str| {
                Expr::zero(Type::generic(Type::named(runtime, name), vec![payload_ty.clone()]))
            };
            vec![
                Stmt::If {
                    cond: is_variant,
                    then: vec![Stmt::ret(Expr::method(companion("Some"), "Apply", vec![payload]))],
                    els: vec![],
                },
                Stmt::ret(Expr::method(companion("None"), "Apply", vec![])),
            ]
        };

        target::Decl::Func(target::FuncDecl {
            name: "Unapply".into(),
            type_params: vec![],
            receiver: Some(Field::new("", companion_ty.clone())),
            params: vec![Field::new(subject, self_ty.clone())],
            results: vec![result],
            body,
        })
    }
}
