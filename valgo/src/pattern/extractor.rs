//! Resolution of call-shaped patterns
//!
//! A pattern `Head(p1, ..., pn)` is resolved in priority order:
//!
//! 1. an `Unapply` method the target language can call directly,
//! 2. a structural match on the head type's declared fields (or a tuple),
//! 3. a sequence match through `Size`/`Get`/`Drop`,
//! 4. the reflective runtime helper, for `Unapply` signatures (1) can't call.
//!
//! The two `Unapply`-based strategies implement [`UnapplyStrategy`] and are
//! chosen by capability check.

use tracing::{debug, warn};

use crate::ast::{Pattern, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::infer::Unifier;
use crate::metadata::{Env, MethodMetadata, TypeKind, TypeMetadata};
use crate::types::{self, Type};
use crate::util;

/// One call-shaped pattern occurrence
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSite<'s> {
    pub head: &'s str,
    pub type_args: &'s [Type],
    pub subject: &'s Type,
    pub args: &'s [Spanned<Pattern>],
    pub span: Span,
}

/// What an `Unapply` returns, once instantiated
#[derive(Debug, Clone, PartialEq)]
pub enum UnapplyShape {
    /// Match or no match, nothing extracted
    Bool,
    /// `Option[payload]`; `expand` holds the element types when a tuple
    /// payload is spread over several sub-patterns
    Option {
        payload: Type,
        expand: Option<Vec<Type>>,
    },
}

/// Field read by a structural match
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRead {
    pub name: String,
    pub ty: Type,
    pub immutable: bool,
}

/// How a call-shaped pattern is tested and deconstructed
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// `Head[T]{}.Unapply(subject)`; `param` is the instantiated parameter type
    Unapply {
        companion: Type,
        param: Type,
        shape: UnapplyShape,
    },
    /// Direct field reads; `assert` downcasts the subject to `head` first
    Structural {
        head: Type,
        fields: Vec<FieldRead>,
        assert: bool,
    },
    /// `Size` guard, `Get(i)` reads and a `Drop(n)` rest capture
    Sequence {
        seq: Type,
        elem: Type,
        rest: Option<usize>,
    },
    /// `std.UnapplyFull(subject, Head{})`, every element typed `any`
    Reflective { head: Type },
}

impl Plan {
    /// Subject type of each sub-pattern, by position
    pub fn element_types(&self, argc: usize) -> Vec<Type> {
        match self {
            Plan::Unapply { shape, .. } => match shape {
                UnapplyShape::Bool => vec![],
                UnapplyShape::Option {
                    expand: Some(elems),
                    ..
                } => elems.clone(),
                UnapplyShape::Option { payload, .. } => vec![payload.clone(); argc.min(1)],
            },
            Plan::Structural { fields, .. } => fields.iter().map(|f| f.ty.clone()).collect(),
            Plan::Sequence { seq, elem, rest } => (0..argc)
                .map(|i| {
                    if Some(i) == *rest {
                        seq.clone()
                    } else {
                        elem.clone()
                    }
                })
                .collect(),
            Plan::Reflective { .. } => vec![Type::Any; argc],
        }
    }
}

/// A way of calling an extractor's `Unapply`
pub trait UnapplyStrategy {
    fn name(&self) -> &'static str;

    /// Capability check against the `Unapply` signature
    fn supports(&self, env: &Env, unapply: &MethodMetadata) -> bool;

    fn plan(&self, env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<Plan>;
}

/// Calls `Unapply` directly and branches on its `bool`/`Option` result
pub struct DirectUnapply;

/// Goes through the runtime's reflective helper
pub struct ReflectiveUnapply;

impl UnapplyStrategy for DirectUnapply {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn supports(&self, _env: &Env, unapply: &MethodMetadata) -> bool {
        unapply.params.len() == 1 && (unapply.result.is_bool() || unapply.result.is_option())
    }

    fn plan(&self, env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<Plan> {
        let Some(unapply) = meta.method("Unapply") else {
            return Err(CompileError::invariant(
                format!("`{}` has no Unapply", site.head),
                site.span,
            ));
        };
        let type_args = extractor_type_args(env, meta, unapply, site)?;
        let subst = types::substitution(&meta.type_params, &type_args);
        let result = unapply.result.substitute(&subst);
        let param = unapply
            .params
            .first()
            .map(|p| p.substitute(&subst))
            .unwrap_or(Type::Any);
        let argc = site.args.len();

        if site.args.iter().any(|a| a.node.is_rest()) {
            return Err(CompileError::pattern(
                format!("rest pattern needs a sequence, but `{}` is an extractor", site.head),
                site.span,
            ));
        }

        let shape = if result.is_bool() {
            if argc != 0 {
                return Err(CompileError::pattern(
                    format!("`{}` extracts nothing but the pattern has {argc} arguments", site.head),
                    site.span,
                ));
            }
            UnapplyShape::Bool
        } else {
            let payload = result.generic_args().first().cloned().unwrap_or(Type::Any);
            let expand = match argc {
                0 | 1 => None,
                n => match payload.tuple_arity() {
                    Some(arity) if arity == n => Some(payload.generic_args().to_vec()),
                    _ => {
                        return Err(CompileError::pattern(
                            format!(
                                "`{}` extracts `{payload}` but the pattern has {n} arguments",
                                site.head
                            ),
                            site.span,
                        ));
                    }
                },
            };
            UnapplyShape::Option { payload, expand }
        };

        let companion = Type::generic(env.type_ref(meta), type_args);
        debug!(head = site.head, companion = %companion, "direct unapply");
        Ok(Plan::Unapply {
            companion,
            param,
            shape,
        })
    }
}

impl UnapplyStrategy for ReflectiveUnapply {
    fn name(&self) -> &'static str {
        "reflective"
    }

    fn supports(&self, env: &Env, _unapply: &MethodMetadata) -> bool {
        env.config.reflective_unapply
    }

    fn plan(&self, env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<Plan> {
        if site.args.iter().any(|a| a.node.is_rest()) {
            return Err(CompileError::pattern(
                format!("rest pattern needs a sequence, but `{}` is an extractor", site.head),
                site.span,
            ));
        }
        let type_args = if meta.type_params.is_empty() {
            vec![]
        } else if site.type_args.len() == meta.type_params.len() {
            site.type_args.to_vec()
        } else {
            return Err(CompileError::inference(
                format!(
                    "extractor `{}` needs explicit type arguments for reflective matching",
                    site.head
                ),
                site.span,
            ));
        };
        let head = Type::generic(env.type_ref(meta), type_args);
        warn!(head = site.head, "falling back to reflective unapply");
        Ok(Plan::Reflective { head })
    }
}

/// Type arguments of a generic extractor: explicit, then companion
/// metadata, then unification of the `Unapply` parameter with the subject
fn extractor_type_args(
    env: &Env,
    meta: &TypeMetadata,
    unapply: &MethodMetadata,
    site: &ExtractorSite,
) -> Result<Vec<Type>> {
    if meta.type_params.is_empty() {
        return Ok(vec![]);
    }
    if site.type_args.len() == meta.type_params.len() {
        return Ok(site.type_args.to_vec());
    }

    let subject = env.expand_alias(site.subject);
    if let Some(companion) = env.lookup_companion(site.head) {
        let target = companion.target.rsplit('.').next().unwrap_or(&companion.target);
        let args = subject.generic_args();
        if subject.base_name() == target
            && companion.extract_indices.len() == meta.type_params.len()
        {
            let picked: Option<Vec<Type>> = companion
                .extract_indices
                .iter()
                .map(|i| args.get(*i).filter(|t| t.is_concrete()).cloned())
                .collect();
            if let Some(picked) = picked {
                return Ok(picked);
            }
        }
    }

    if let Some(param) = unapply.params.first() {
        let mut unifier = Unifier::new(&meta.type_params);
        if unifier.unify(param, &subject).is_ok() {
            if let Some(args) = unifier.resolve() {
                debug!(head = site.head, "extractor type arguments by unification");
                return Ok(args);
            }
        }
    }

    Err(CompileError::inference(
        format!(
            "cannot infer type arguments of extractor `{}` for subject `{}`",
            site.head, site.subject
        ),
        site.span,
    ))
}

/// Resolve a call-shaped pattern to a plan
pub fn plan(env: &Env, site: &ExtractorSite) -> Result<Plan> {
    let Some(meta) = env.lookup_type(site.head) else {
        let names = env.known_type_names();
        let suggestion = util::find_similar_name(
            site.head,
            names.iter().copied(),
            util::suggestion_threshold(site.head),
        );
        return Err(CompileError::pattern(
            format!(
                "unknown extractor `{}`{}",
                site.head,
                util::format_suggestion_hint(suggestion)
            ),
            site.span,
        ));
    };

    if let Some(unapply) = meta.method("Unapply") {
        let strategies: [&dyn UnapplyStrategy; 2] = [&DirectUnapply, &ReflectiveUnapply];
        for strategy in strategies {
            if strategy.supports(env, unapply) {
                debug!(head = site.head, strategy = strategy.name(), "unapply strategy selected");
                return strategy.plan(env, meta, site);
            }
        }
        return Err(CompileError::pattern(
            format!(
                "`{}` has an Unapply that cannot be called directly and reflective matching is disabled",
                site.head
            ),
            site.span,
        ));
    }

    let has_rest = site.args.iter().any(|a| a.node.is_rest());
    let structural = meta.kind == TypeKind::Struct && !meta.fields.is_empty();
    if structural && !has_rest {
        return plan_structural(env, meta, site);
    }

    if ["Size", "Get", "Drop"].iter().all(|m| meta.method(m).is_some()) {
        return plan_sequence(env, meta, site);
    }

    if has_rest {
        return Err(CompileError::pattern(
            format!("rest pattern needs a sequence, but `{}` has no Size/Get/Drop", site.head),
            site.span,
        ));
    }
    Err(CompileError::pattern(
        format!("`{}` is not an extractor, struct or sequence type", site.head),
        site.span,
    ))
}

/// Instantiate the head type against the subject: the subject itself when it
/// is an instance of the head, explicit type arguments otherwise
fn instantiate_head(env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<(Type, bool)> {
    let subject = env.expand_alias(site.subject);
    let subject_meta = env.type_meta(&subject);
    let same = subject_meta
        .map(|m| m.name == meta.name && m.package == meta.package)
        .unwrap_or(false);
    if same {
        return Ok((subject, false));
    }

    let opaque_subject = subject.is_any()
        || subject.is_nil()
        || subject_meta
            .map(|m| m.kind == TypeKind::Interface)
            .unwrap_or(false);
    if !opaque_subject {
        return Err(CompileError::pattern(
            format!(
                "pattern `{}` can never match a value of type `{}`",
                site.head, site.subject
            ),
            site.span,
        ));
    }

    let type_args = if meta.type_params.is_empty() {
        vec![]
    } else if site.type_args.len() == meta.type_params.len() {
        site.type_args.to_vec()
    } else {
        return Err(CompileError::inference(
            format!(
                "cannot infer type arguments of `{}` from subject `{}`",
                site.head, site.subject
            ),
            site.span,
        ));
    };
    Ok((Type::generic(env.type_ref(meta), type_args), true))
}

fn plan_structural(env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<Plan> {
    if site.args.len() != meta.fields.len() {
        return Err(CompileError::pattern(
            format!(
                "`{}` has {} fields but the pattern has {} arguments",
                site.head,
                meta.fields.len(),
                site.args.len()
            ),
            site.span,
        ));
    }
    let (head, assert) = instantiate_head(env, meta, site)?;
    let fields = meta
        .fields
        .iter()
        .map(|name| {
            let info = env.field(&head, name).ok_or_else(|| {
                CompileError::invariant(format!("field `{name}` of `{head}` is not indexed"), site.span)
            })?;
            Ok(FieldRead {
                name: name.clone(),
                ty: info.ty,
                immutable: info.immutable,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(head = %head, assert, "structural match");
    Ok(Plan::Structural {
        head,
        fields,
        assert,
    })
}

fn plan_sequence(env: &Env, meta: &TypeMetadata, site: &ExtractorSite) -> Result<Plan> {
    let rests: Vec<usize> = site
        .args
        .iter()
        .enumerate()
        .filter(|(_, a)| a.node.is_rest())
        .map(|(i, _)| i)
        .collect();
    let rest = match rests.as_slice() {
        [] => None,
        [last] if *last + 1 == site.args.len() => Some(*last),
        _ => {
            return Err(CompileError::pattern(
                "rest pattern must be the last element",
                site.span,
            ));
        }
    };
    let (seq, assert) = instantiate_head(env, meta, site)?;
    if assert {
        return Err(CompileError::pattern(
            format!(
                "sequence pattern `{}` needs a subject of its own type, got `{}`",
                site.head, site.subject
            ),
            site.span,
        ));
    }
    let elem = env
        .method_signature(&seq, "Get")
        .map(|sig| sig.result)
        .unwrap_or(Type::Any);
    debug!(seq = %seq, ?rest, "sequence match");
    Ok(Plan::Sequence { seq, elem, rest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::config::LowerConfig;
    use crate::metadata::{Metadata, ProgramIndex};

    fn shapes() -> crate::ast::Program {
        program(vec![
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
        ])
    }

    fn with_env<R>(config: LowerConfig, f: impl FnOnce(&Env) -> R) -> R {
        let mut metadata = Metadata::with_prelude("std");
        let mut odd = TypeMetadata::new("std", "Odd", TypeKind::Companion);
        odd.methods.insert(
            "Unapply".into(),
            MethodMetadata {
                params: vec![Type::int(), Type::int()],
                result: Type::bool(),
                ..MethodMetadata::default()
            },
        );
        metadata.add_type(odd);
        let index = ProgramIndex::build(&shapes(), "std").unwrap();
        let env = Env::new(index, &metadata, &config);
        f(&env)
    }

    fn site<'s>(head: &'s str, subject: &'s Type, args: &'s [Spanned<Pattern>]) -> ExtractorSite<'s> {
        ExtractorSite {
            head,
            type_args: &[],
            subject,
            args,
            span: Span::synthetic(),
        }
    }

    #[test]
    fn test_sealed_variant_uses_direct_unapply() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::local("Shape");
            let args = vec![pident("w"), pident("h")];
            let plan = plan(env, &site("Rect", &subject, &args)).unwrap();
            let Plan::Unapply { companion, shape, .. } = plan else {
                panic!("expected unapply plan");
            };
            assert_eq!(companion, Type::local("Rect"));
            assert_eq!(
                shape,
                UnapplyShape::Option {
                    payload: Type::tuple("std", vec![Type::float64(), Type::float64()]),
                    expand: Some(vec![Type::float64(), Type::float64()]),
                }
            );
        });
    }

    #[test]
    fn test_companion_indices_give_type_args() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::generic(Type::named("std", "Option"), vec![Type::int()]);
            let args = vec![pident("v")];
            let plan = plan(env, &site("Some", &subject, &args)).unwrap();
            assert_eq!(plan.element_types(1), vec![Type::int()]);
            let Plan::Unapply { companion, .. } = plan else {
                panic!("expected unapply plan");
            };
            assert_eq!(companion.render(), "std.Some[int]");
        });
    }

    #[test]
    fn test_uninferable_extractor_fails_closed() {
        with_env(LowerConfig::default(), |env| {
            let args = vec![pident("v")];
            let err = plan(env, &site("Some", &Type::Any, &args)).unwrap_err();
            assert!(matches!(err, CompileError::Inference { .. }));
        });
    }

    #[test]
    fn test_structural_match_on_own_struct() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::local("Person");
            let args = vec![pident("n"), wildcard()];
            let plan = plan(env, &site("Person", &subject, &args)).unwrap();
            let Plan::Structural { fields, assert, .. } = plan else {
                panic!("expected structural plan");
            };
            assert!(!assert);
            assert!(fields[0].immutable);
            assert!(!fields[1].immutable);
        });
    }

    #[test]
    fn test_structural_arity_checked() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::local("Person");
            let args = vec![pident("n")];
            assert!(plan(env, &site("Person", &subject, &args)).is_err());
        });
    }

    #[test]
    fn test_sequence_rest_must_be_last() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::generic(Type::named("std", "List"), vec![Type::string()]);
            let good = vec![pident("head"), rest(Some("tail"))];
            let plan_ok = plan(env, &site("List", &subject, &good)).unwrap();
            assert_eq!(
                plan_ok.element_types(2),
                vec![Type::string(), subject.clone()]
            );
            let bad = vec![rest(None), pident("last")];
            let err = plan(env, &site("List", &subject, &bad)).unwrap_err();
            assert!(err.message().contains("last element"));
        });
    }

    #[test]
    fn test_reflective_fallback_is_gated() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::int();
            let plan = plan(env, &site("Odd", &subject, &[])).unwrap();
            assert!(matches!(plan, Plan::Reflective { .. }));
        });
        let config = LowerConfig {
            reflective_unapply: false,
            ..LowerConfig::default()
        };
        with_env(config, |env| {
            let subject = Type::int();
            assert!(plan(env, &site("Odd", &subject, &[])).is_err());
        });
    }

    #[test]
    fn test_unknown_extractor_suggests() {
        with_env(LowerConfig::default(), |env| {
            let subject = Type::local("Shape");
            let err = plan(env, &site("Circel", &subject, &[])).unwrap_err();
            assert!(err.message().contains("did you mean `Circle`"));
        });
    }
}
