//! Pattern-matching compiler
//!
//! A pattern compiles to a flat list of [`Step`]s over a subject expression:
//! temporaries, user bindings, conditions and checked downcasts, in the order
//! the target program must evaluate them. [`CompiledPattern::assemble`] folds
//! the steps around a clause body into nested conditionals, merging adjacent
//! conditions with `&&` and dropping user bindings the body never reads.
//!
//! How a call-shaped pattern is deconstructed is decided in [`extractor`];
//! clause placement and coverage in [`exhaustiveness`]; the common result
//! type of a match in [`reconcile`].

pub mod exhaustiveness;
pub mod extractor;
pub mod reconcile;

use std::collections::HashSet;

use tracing::trace;

use crate::ast::{LiteralPattern, Pattern, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::metadata::{Env, TypeKind};
use crate::names::TempNames;
use crate::target::{BinOp, Expr, Lit, Stmt};
use crate::types::{self, Type};

use extractor::{ExtractorSite, Plan, UnapplyShape};

/// One evaluation step of a compiled pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `names := value` for synthesized temporaries
    Let { names: Vec<String>, value: Expr },
    /// `name := value` for a user binding
    Bind { name: String, value: Expr },
    /// The rest only runs when `cond` holds
    Check(Expr),
    /// `name, ok := any(value).(ty)` followed by a check of `ok`
    Assert {
        name: Option<String>,
        /// `name` is a user binding rather than a temporary
        user: bool,
        ok: String,
        value: Expr,
        ty: Type,
    },
    /// `_ = value`, marking a temporary as used
    Touch(Expr),
}

/// A pattern lowered to steps, plus the bindings it introduces
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledPattern {
    pub steps: Vec<Step>,
    /// User bindings in pattern order, with their (unwrapped) types
    pub bindings: Vec<(String, Type)>,
}

impl CompiledPattern {
    /// Append a guard condition after the pattern's own steps
    pub fn guard(&mut self, cond: Expr) {
        self.steps.push(Step::Check(cond));
    }

    /// True when the pattern matches unconditionally
    pub fn is_unconditional(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s, Step::Check(_) | Step::Assert { .. }))
    }

    /// Wrap `body` in the pattern's steps. User bindings for which `used`
    /// is false are left out.
    pub fn assemble(self, body: Vec<Stmt>, used: impl Fn(&str) -> bool) -> Vec<Stmt> {
        let mut acc = body;
        // `acc` is a single conditional produced by a `Check`
        let mut guarded = false;
        for step in self.steps.into_iter().rev() {
            match step {
                Step::Let { names, value } => {
                    acc.insert(
                        0,
                        Stmt::Define {
                            names,
                            values: vec![value],
                        },
                    );
                    guarded = false;
                }
                Step::Bind { name, value } => {
                    if used(&name) {
                        acc.insert(0, Stmt::define(name, value));
                        guarded = false;
                    }
                }
                Step::Touch(value) => {
                    acc.insert(0, Stmt::assign(Expr::ident("_"), value));
                    guarded = false;
                }
                Step::Check(cond) => {
                    acc = match (guarded, acc.pop()) {
                        (true, Some(Stmt::If { cond: inner, then, els })) if acc.is_empty() => {
                            vec![Stmt::If {
                                cond: Expr::binary(BinOp::And, cond, inner),
                                then,
                                els,
                            }]
                        }
                        (_, last) => {
                            acc.extend(last);
                            vec![Stmt::If {
                                cond,
                                then: acc,
                                els: vec![],
                            }]
                        }
                    };
                    guarded = true;
                }
                Step::Assert {
                    name,
                    user,
                    ok,
                    value,
                    ty,
                } => {
                    let target = match name {
                        Some(name) if !user || used(&name) => name,
                        _ => "_".to_string(),
                    };
                    let assert = Expr::TypeAssert {
                        x: Box::new(Expr::call(Expr::ident("any"), vec![value])),
                        ty,
                    };
                    acc = vec![
                        Stmt::Define {
                            names: vec![target, ok.clone()],
                            values: vec![assert],
                        },
                        Stmt::If {
                            cond: Expr::ident(ok),
                            then: acc,
                            els: vec![],
                        },
                    ];
                    guarded = false;
                }
            }
        }
        acc
    }
}

/// A call-shaped pattern, including a bare companion name such as `None`
#[derive(Debug, Clone, Copy)]
pub struct ExtractorView<'p> {
    pub head: &'p str,
    pub type_args: &'p [Type],
    pub args: &'p [Spanned<Pattern>],
}

impl<'p> ExtractorView<'p> {
    /// Head without its package qualifier
    pub fn bare_head(&self) -> &'p str {
        self.head.rsplit('.').next().unwrap_or(self.head)
    }
}

/// View `pattern` as an extractor application, if it is one
pub fn extractor_view<'p>(env: &Env, pattern: &'p Pattern) -> Option<ExtractorView<'p>> {
    match pattern {
        Pattern::Extractor {
            head,
            type_args,
            args,
        } => Some(ExtractorView {
            head,
            type_args,
            args,
        }),
        Pattern::Ident(name) if name.starts_with(|c: char| c.is_uppercase()) => env
            .lookup_type(name)
            .filter(|meta| meta.kind == TypeKind::Companion)
            .map(|_| ExtractorView {
                head: name,
                type_args: &[],
                args: &[],
            }),
        _ => None,
    }
}

/// Compiles one pattern against one subject
pub struct PatternCompiler<'e, 'a, 'n> {
    env: &'e Env<'a>,
    names: &'n mut TempNames,
    steps: Vec<Step>,
    bindings: Vec<(String, Type)>,
    seen: HashSet<String>,
}

impl<'e, 'a, 'n> PatternCompiler<'e, 'a, 'n> {
    pub fn new(env: &'e Env<'a>, names: &'n mut TempNames) -> Self {
        Self {
            env,
            names,
            steps: Vec::new(),
            bindings: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Compile `pattern` against `subject`, whose type is `subject_ty`.
    ///
    /// `subject` must be safe to evaluate more than once.
    pub fn compile(
        mut self,
        pattern: &Spanned<Pattern>,
        subject: Expr,
        subject_ty: &Type,
    ) -> Result<CompiledPattern> {
        self.pattern(pattern, subject, subject_ty)?;
        Ok(CompiledPattern {
            steps: self.steps,
            bindings: self.bindings,
        })
    }

    fn bind(&mut self, name: &str, ty: Type, span: Span) -> Result<()> {
        if !self.seen.insert(name.to_string()) {
            return Err(CompileError::pattern(
                format!("`{name}` is bound more than once in the same pattern"),
                span,
            ));
        }
        trace!(name, ty = %ty, "pattern binding");
        self.bindings.push((name.to_string(), ty));
        Ok(())
    }

    fn pattern(&mut self, pattern: &Spanned<Pattern>, subject: Expr, ty: &Type) -> Result<()> {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.pattern_inner(pattern, subject, ty))
    }

    fn pattern_inner(&mut self, pattern: &Spanned<Pattern>, subject: Expr, ty: &Type) -> Result<()> {
        let ty = ty.strip_immutable();
        if let Some(view) = extractor_view(self.env, &pattern.node) {
            return self.extractor(view, pattern.span, subject, &ty);
        }
        match &pattern.node {
            Pattern::Wildcard => Ok(()),
            Pattern::Ident(name) => {
                self.bind(name, ty, pattern.span)?;
                self.steps.push(Step::Bind {
                    name: name.clone(),
                    value: subject,
                });
                Ok(())
            }
            Pattern::Literal(lit) => {
                let cond = match lit {
                    LiteralPattern::Bool(true) if ty.is_bool() => subject,
                    LiteralPattern::Bool(false) if ty.is_bool() => Expr::not(subject),
                    _ => Expr::binary(BinOp::Eq, subject, Expr::Lit(literal(lit))),
                };
                self.steps.push(Step::Check(cond));
                Ok(())
            }
            Pattern::Typed { name, ty: wanted } => {
                if *wanted == ty {
                    if name != "_" {
                        self.bind(name, ty, pattern.span)?;
                        self.steps.push(Step::Bind {
                            name: name.clone(),
                            value: subject,
                        });
                    }
                    return Ok(());
                }
                let bound = if name == "_" {
                    None
                } else {
                    self.bind(name, wanted.clone(), pattern.span)?;
                    Some(name.clone())
                };
                let ok = self.names.fresh();
                self.steps.push(Step::Assert {
                    name: bound,
                    user: true,
                    ok,
                    value: subject,
                    ty: wanted.clone(),
                });
                Ok(())
            }
            Pattern::Tuple(elems) => self.tuple(elems, pattern.span, subject, &ty),
            Pattern::Rest(_) => Err(CompileError::pattern(
                "rest pattern outside of a sequence pattern",
                pattern.span,
            )),
            Pattern::Extractor { .. } => Err(CompileError::invariant(
                "extractor pattern without an extractor view",
                pattern.span,
            )),
        }
    }

    fn tuple(&mut self, elems: &[Spanned<Pattern>], span: Span, subject: Expr, ty: &Type) -> Result<()> {
        let arity = elems.len();
        let config = self.env.config;
        if arity < config.min_tuple_arity || arity > config.max_tuple_arity {
            return Err(CompileError::pattern(
                format!(
                    "tuple pattern of arity {arity} is outside the supported range {}..={}",
                    config.min_tuple_arity, config.max_tuple_arity
                ),
                span,
            ));
        }
        if elems.iter().any(|e| e.node.is_rest()) {
            return Err(CompileError::pattern(
                "rest pattern inside a tuple pattern",
                span,
            ));
        }
        let ty = self.env.expand_alias(ty);
        match ty.tuple_arity() {
            Some(n) if n == arity => {}
            Some(n) => {
                return Err(CompileError::pattern(
                    format!("tuple pattern has {arity} elements but the subject has {n}"),
                    span,
                ));
            }
            None if ty.is_any() || ty.is_nil() => {
                return Err(CompileError::inference(
                    format!("cannot infer the element types of a tuple subject of type `{ty}`"),
                    span,
                ));
            }
            None => {
                return Err(CompileError::pattern(
                    format!("tuple pattern cannot match a value of type `{ty}`"),
                    span,
                ));
            }
        }
        for (i, (elem, elem_ty)) in elems.iter().zip(ty.generic_args()).enumerate() {
            let read = Expr::select(subject.clone(), types::tuple_field(i));
            self.pattern(elem, read, elem_ty)?;
        }
        Ok(())
    }

    fn extractor(&mut self, view: ExtractorView, span: Span, subject: Expr, ty: &Type) -> Result<()> {
        let site = ExtractorSite {
            head: view.head,
            type_args: view.type_args,
            subject: ty,
            args: view.args,
            span,
        };
        let plan = extractor::plan(self.env, &site)?;
        let elem_types = plan.element_types(view.args.len());

        match plan {
            Plan::Unapply {
                companion,
                param,
                shape,
            } => {
                let subject = if ty.is_any() && !param.is_any() {
                    self.downcast(subject, param)
                } else {
                    subject
                };
                let call = Expr::method(Expr::zero(companion), "Unapply", vec![subject]);
                match shape {
                    UnapplyShape::Bool => self.steps.push(Step::Check(call)),
                    UnapplyShape::Option { expand, .. } => {
                        let tmp = self.names.fresh();
                        self.steps.push(Step::Let {
                            names: vec![tmp.clone()],
                            value: call,
                        });
                        self.steps.push(Step::Check(Expr::method(
                            Expr::ident(tmp.as_str()),
                            "IsDefined",
                            vec![],
                        )));
                        let payload = Expr::method(Expr::ident(tmp), "Get", vec![]);
                        if expand.is_some() {
                            for (i, (arg, elem_ty)) in view.args.iter().zip(&elem_types).enumerate() {
                                let read = Expr::select(payload.clone(), types::tuple_field(i));
                                self.pattern(arg, read, elem_ty)?;
                            }
                        } else if let (Some(arg), Some(elem_ty)) = (view.args.first(), elem_types.first()) {
                            self.pattern(arg, payload, elem_ty)?;
                        }
                    }
                }
            }
            Plan::Structural {
                head,
                fields,
                assert,
            } => {
                let base = if assert {
                    self.downcast(subject, head)
                } else {
                    subject
                };
                for (arg, field) in view.args.iter().zip(fields) {
                    let mut read = Expr::select(base.clone(), field.name);
                    if field.immutable {
                        read = Expr::method(read, "Get", vec![]);
                    }
                    self.pattern(arg, read, &field.ty)?;
                }
            }
            Plan::Sequence { seq, elem, rest } => {
                let base = if subject.is_pure_read() {
                    subject
                } else {
                    let tmp = self.names.fresh();
                    self.steps.push(Step::Let {
                        names: vec![tmp.clone()],
                        value: subject,
                    });
                    Expr::ident(tmp)
                };
                let fixed = rest.unwrap_or(view.args.len());
                let size = Expr::method(base.clone(), "Size", vec![]);
                let op = if rest.is_some() { BinOp::Ge } else { BinOp::Eq };
                self.steps
                    .push(Step::Check(Expr::binary(op, size, Expr::int(fixed as i64))));
                for (i, arg) in view.args.iter().enumerate() {
                    if Some(i) == rest {
                        if let Pattern::Rest(Some(name)) = &arg.node {
                            self.bind(name, seq.clone(), arg.span)?;
                            self.steps.push(Step::Bind {
                                name: name.clone(),
                                value: Expr::method(base.clone(), "Drop", vec![Expr::int(fixed as i64)]),
                            });
                        }
                        continue;
                    }
                    let read = Expr::method(base.clone(), "Get", vec![Expr::int(i as i64)]);
                    self.pattern(arg, read, &elem)?;
                }
            }
            Plan::Reflective { head } => {
                let runtime = self.env.runtime().to_string();
                if view.args.is_empty() {
                    let check = Expr::call(
                        Expr::qualified(&runtime, "UnapplyCheck"),
                        vec![subject, Expr::zero(head)],
                    );
                    self.steps.push(Step::Check(check));
                    return Ok(());
                }
                let vals = self.names.fresh();
                self.steps.push(Step::Let {
                    names: vec![vals.clone()],
                    value: Expr::call(
                        Expr::qualified(&runtime, "UnapplyFull"),
                        vec![subject, Expr::zero(head)],
                    ),
                });
                let arity = Expr::binary(
                    BinOp::Eq,
                    Expr::call(Expr::ident("len"), vec![Expr::ident(vals.as_str())]),
                    Expr::int(view.args.len() as i64),
                );
                let defined = Expr::binary(BinOp::Ne, Expr::ident(vals.as_str()), Expr::Lit(Lit::Nil));
                self.steps
                    .push(Step::Check(Expr::binary(BinOp::And, defined, arity)));
                for (i, arg) in view.args.iter().enumerate() {
                    let read = Expr::Index {
                        x: Box::new(Expr::ident(vals.as_str())),
                        index: Box::new(Expr::int(i as i64)),
                    };
                    self.pattern(arg, read, &Type::Any)?;
                }
            }
        }
        Ok(())
    }

    /// Checked downcast of `subject` into a fresh temporary
    fn downcast(&mut self, subject: Expr, ty: Type) -> Expr {
        let tmp = self.names.fresh();
        let ok = self.names.fresh();
        self.steps.push(Step::Assert {
            name: Some(tmp.clone()),
            user: false,
            ok,
            value: subject,
            ty,
        });
        self.steps.push(Step::Touch(Expr::ident(tmp.as_str())));
        Expr::ident(tmp)
    }
}

fn literal(lit: &LiteralPattern) -> Lit {
    match lit {
        LiteralPattern::Int(n) => Lit::Int(*n),
        LiteralPattern::Float(x) => Lit::Float(*x),
        LiteralPattern::String(s) => Lit::String(s.clone()),
        LiteralPattern::Char(c) => Lit::Char(*c),
        LiteralPattern::Bool(b) => Lit::Bool(*b),
    }
}

/// Bindings `pattern` introduces against a subject of type `subject_ty`.
///
/// Used by inference, which never fails: a pattern that does not compile
/// binds nothing here and reports its error when it is lowered.
pub fn binding_types(env: &Env, pattern: &Spanned<Pattern>, subject_ty: &Type) -> Vec<(String, Type)> {
    let mut names = TempNames::new(env.config.temp_prefix.clone());
    PatternCompiler::new(env, &mut names)
        .compile(pattern, Expr::ident("_subject"), subject_ty)
        .map(|compiled| compiled.bindings)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::config::LowerConfig;
    use crate::metadata::{Metadata, ProgramIndex};

    fn with_env<R>(f: impl FnOnce(&Env) -> R) -> R {
        let prog = program(vec![
            sealed(
                "Shape",
                &[],
                vec![
                    variant("Circle", vec![field("r", Type::float64())]),
                    variant(
                        "Rect",
                        vec![field("w", Type::float64()), field("h", Type::float64())],
                    ),
                ],
            ),
            struct_decl(
                "Person",
                &[],
                vec![field("name", Type::string()), var_field("age", Type::int())],
            ),
        ]);
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let env = Env::new(ProgramIndex::build(&prog, "std").unwrap(), &metadata, &config);
        f(&env)
    }

    fn compile(env: &Env, pattern: Spanned<Pattern>, ty: &Type) -> Result<CompiledPattern> {
        let mut names = TempNames::new("_tmp");
        PatternCompiler::new(env, &mut names).compile(&pattern, Expr::ident("s"), ty)
    }

    fn render(stmts: &[Stmt]) -> String {
        stmts.iter().map(|s| s.to_string()).collect()
    }

    fn body() -> Vec<Stmt> {
        vec![Stmt::ret(Expr::ident("x"))]
    }

    #[test]
    fn test_unapply_option_with_tuple_payload() {
        with_env(|env| {
            let compiled = compile(
                env,
                extractor("Rect", vec![pident("x"), wildcard()]),
                &Type::local("Shape"),
            )
            .unwrap();
            assert_eq!(compiled.bindings, vec![("x".to_string(), Type::float64())]);
            let out = render(&compiled.assemble(body(), |_| true));
            assert_eq!(
                out,
                "_tmp0 := Rect{}.Unapply(s)\nif _tmp0.IsDefined() {\n\tx := _tmp0.Get().V1\n\treturn x\n}\n"
            );
        });
    }

    #[test]
    fn test_unused_binding_is_dropped_and_checks_merge() {
        with_env(|env| {
            let pattern = ptuple(vec![plit_int(1), pident("unused")]);
            let pair = Type::tuple("std", vec![Type::int(), Type::int()]);
            let mut compiled = compile(env, pattern, &pair).unwrap();
            compiled.guard(Expr::ident("ready"));
            let out = render(&compiled.assemble(vec![Stmt::Return(vec![])], |_| false));
            assert_eq!(out, "if (s.V1 == 1) && ready {\n\treturn\n}\n");
        });
    }

    #[test]
    fn test_structural_reads_unwrap_val_fields() {
        with_env(|env| {
            let compiled = compile(
                env,
                extractor("Person", vec![pident("n"), pident("a")]),
                &Type::local("Person"),
            )
            .unwrap();
            let out = render(&compiled.assemble(vec![], |_| true));
            assert_eq!(out, "n := s.name.Get()\na := s.age\n");
        });
    }

    #[test]
    fn test_structural_on_any_asserts() {
        with_env(|env| {
            let compiled = compile(env, extractor("Person", vec![wildcard(), wildcard()]), &Type::Any).unwrap();
            let out = render(&compiled.assemble(vec![], |_| true));
            assert_eq!(out, "_tmp0, _tmp1 := any(s).(Person)\nif _tmp1 {\n\t_ = _tmp0\n}\n");
        });
    }

    #[test]
    fn test_typed_pattern() {
        with_env(|env| {
            let compiled = compile(env, typed("n", Type::int()), &Type::Any).unwrap();
            assert!(!compiled.is_unconditional());
            let out = render(&compiled.assemble(vec![], |_| false));
            assert_eq!(out, "_, _tmp0 := any(s).(int)\nif _tmp0 {\n}\n");

            let same = compile(env, typed("n", Type::int()), &Type::int()).unwrap();
            assert!(same.is_unconditional());
        });
    }

    #[test]
    fn test_sequence_with_rest() {
        with_env(|env| {
            let list = Type::generic(Type::named("std", "List"), vec![Type::string()]);
            let compiled = compile(
                env,
                extractor("List", vec![pident("head"), rest(Some("tail"))]),
                &list,
            )
            .unwrap();
            assert_eq!(
                compiled.bindings,
                vec![("head".to_string(), Type::string()), ("tail".to_string(), list.clone())]
            );
            let out = render(&compiled.assemble(vec![], |_| true));
            assert_eq!(
                out,
                "if s.Size() >= 1 {\n\thead := s.Get(0)\n\ttail := s.Drop(1)\n}\n"
            );
        });
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        with_env(|env| {
            let pair = Type::tuple("std", vec![Type::int(), Type::int()]);
            let err = compile(env, ptuple(vec![pident("a"), pident("a")]), &pair).unwrap_err();
            assert!(err.message().contains("bound more than once"));
        });
    }

    #[test]
    fn test_tuple_arity_range() {
        with_env(|env| {
            let err = compile(env, ptuple(vec![pident("a")]), &Type::int()).unwrap_err();
            assert!(err.message().contains("outside the supported range"));
        });
    }

    #[test]
    fn test_bare_companion_name_is_extractor() {
        with_env(|env| {
            let opt = Type::generic(Type::named("std", "Option"), vec![Type::int()]);
            let compiled = compile(env, pident("None"), &opt).unwrap();
            assert!(compiled.bindings.is_empty());
            let out = render(&compiled.assemble(vec![], |_| true));
            assert_eq!(out, "if std.None[int]{}.Unapply(s) {\n}\n");
        });
    }

    #[test]
    fn test_binding_types_ignore_errors() {
        with_env(|env| {
            let opt = Type::generic(Type::named("std", "Option"), vec![Type::string()]);
            let ok = binding_types(env, &extractor("Some", vec![pident("v")]), &opt);
            assert_eq!(ok, vec![("v".to_string(), Type::string())]);
            assert!(binding_types(env, &rest(None), &opt).is_empty());
        });
    }
}
