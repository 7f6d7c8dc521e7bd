//! Result-type reconciliation across match clauses

use crate::ast::{Pattern, Span};
use crate::error::{CompileError, Result};
use crate::types::Type;

/// Result of one clause, as seen by reconciliation
#[derive(Debug, Clone)]
pub struct ClauseResult<'c> {
    pub pattern: &'c Pattern,
    pub ty: Type,
    /// The body is a bare numeric literal, convertible to any numeric type
    pub numeric_literal: bool,
}

fn is_param(ty: &Type, type_params: &[String]) -> bool {
    ty.leaf_name()
        .map(|n| type_params.iter().any(|p| p == n))
        .unwrap_or(false)
}

/// Structural compatibility of two clause result types.
///
/// Generics are compatible only when every parameter pair is.
pub fn compatible(a: &Type, b: &Type, type_params: &[String]) -> bool {
    if a == b {
        return true;
    }
    if a.is_any() || b.is_any() || a.is_nil() || b.is_nil() {
        return true;
    }
    if is_param(a, type_params) || is_param(b, type_params) {
        return true;
    }
    match (a, b) {
        (Type::Generic { base: ab, params: ap }, Type::Generic { base: bb, params: bp }) => {
            ab.base_name() == bb.base_name()
                && ap.len() == bp.len()
                && ap
                    .iter()
                    .zip(bp.iter())
                    .all(|(x, y)| compatible(x, y, type_params))
        }
        _ => false,
    }
}

fn qualifies(ty: &Type, type_params: &[String]) -> bool {
    ty.is_concrete() && !ty.is_any() && !is_param(ty, type_params)
}

/// The declared type when it qualifies, else the first concrete clause type
/// that is neither a type parameter nor `any`
pub fn reference_type(types: &[Type], declared: Option<&Type>, type_params: &[String]) -> Option<Type> {
    if let Some(declared) = declared {
        if qualifies(declared, type_params) {
            return Some(declared.clone());
        }
    }
    types.iter().find(|t| qualifies(t, type_params)).cloned()
}

/// Single result type of a match, or a conflict naming both clauses.
///
/// Without any qualifying clause type the match is typed `any`.
pub fn reconcile(
    clauses: &[ClauseResult],
    declared: Option<&Type>,
    type_params: &[String],
    span: Span,
) -> Result<Type> {
    if !clauses.is_empty() && clauses.iter().all(|c| c.ty.is_void()) {
        return Ok(Type::Void);
    }
    let types: Vec<Type> = clauses.iter().map(|c| c.ty.clone()).collect();
    let Some(reference) = reference_type(&types, declared, type_params) else {
        return Ok(Type::Any);
    };
    let origin = clauses.iter().find(|c| c.ty == reference);

    for clause in clauses {
        if clause.numeric_literal && reference.is_numeric() {
            continue;
        }
        if compatible(&reference, &clause.ty, type_params) {
            continue;
        }
        let first = match origin {
            Some(origin) => format!("case {} has type `{}`", origin.pattern, origin.ty),
            None => format!("the declared type is `{reference}`"),
        };
        return Err(CompileError::result_conflict(
            format!(
                "match clauses disagree on their result: {first} but case {} has type `{}`",
                clause.pattern, clause.ty
            ),
            span,
        ));
    }
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<String> {
        vec!["T".to_string()]
    }

    fn option(inner: Type) -> Type {
        Type::generic(Type::named("std", "Option"), vec![inner])
    }

    #[test]
    fn test_compatibility_rules() {
        let p = params();
        assert!(compatible(&Type::int(), &Type::int(), &p));
        assert!(compatible(&Type::int(), &Type::Any, &p));
        assert!(compatible(&Type::basic("T"), &Type::string(), &p));
        assert!(compatible(&option(Type::int()), &option(Type::Nil), &p));
        assert!(!compatible(&Type::int(), &Type::string(), &p));
    }

    #[test]
    fn test_generic_compatibility_is_all_or_nothing() {
        let pair = |a, b| Type::tuple("std", vec![a, b]);
        let p = params();
        assert!(compatible(
            &pair(Type::int(), Type::basic("T")),
            &pair(Type::int(), Type::string()),
            &p
        ));
        assert!(!compatible(
            &pair(Type::int(), Type::string()),
            &pair(Type::int(), Type::bool()),
            &p
        ));
    }

    #[test]
    fn test_reference_skips_params_and_any() {
        let types = vec![Type::basic("T"), Type::Any, Type::Nil, Type::string()];
        assert_eq!(reference_type(&types, None, &params()), Some(Type::string()));
        assert_eq!(
            reference_type(&types, Some(&Type::int()), &params()),
            Some(Type::int())
        );
        assert_eq!(reference_type(&[Type::Any], None, &params()), None);
    }

    #[test]
    fn test_conflict_names_both_clauses() {
        let one = Pattern::Ident("a".into());
        let wild = Pattern::Wildcard;
        let clauses = vec![
            ClauseResult {
                pattern: &one,
                ty: Type::int(),
                numeric_literal: false,
            },
            ClauseResult {
                pattern: &wild,
                ty: Type::string(),
                numeric_literal: false,
            },
        ];
        let err = reconcile(&clauses, None, &[], Span::synthetic()).unwrap_err();
        assert!(matches!(err, CompileError::ResultConflict { .. }));
        assert!(err.message().contains("case a has type `int`"));
        assert!(err.message().contains("case _ has type `string`"));
    }

    #[test]
    fn test_numeric_literal_follows_reference() {
        let a = Pattern::Ident("a".into());
        let wild = Pattern::Wildcard;
        let clauses = vec![
            ClauseResult {
                pattern: &a,
                ty: Type::float64(),
                numeric_literal: false,
            },
            ClauseResult {
                pattern: &wild,
                ty: Type::int(),
                numeric_literal: true,
            },
        ];
        assert_eq!(
            reconcile(&clauses, None, &[], Span::synthetic()).unwrap(),
            Type::float64()
        );
    }

    #[test]
    fn test_no_reference_falls_back_to_any() {
        let wild = Pattern::Wildcard;
        let clauses = vec![ClauseResult {
            pattern: &wild,
            ty: Type::Nil,
            numeric_literal: false,
        }];
        assert_eq!(reconcile(&clauses, None, &[], Span::synthetic()).unwrap(), Type::Any);
    }
}
