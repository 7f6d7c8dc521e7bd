//! Match coverage checking
//!
//! A match needs a default clause unless its subject has a closed set of
//! shapes that the clauses provably cover:
//! - a sealed type whose every variant has an unguarded, irrefutable case
//! - `bool` with both literals covered
//!
//! A default clause is a `_` or bare-name pattern without a guard. There may
//! be at most one, and it must come last.

use std::collections::BTreeSet;

use tracing::debug;

use super::extractor_view;
use crate::ast::{CaseClause, LiteralPattern, Pattern, Span};
use crate::error::{CompileError, Result};
use crate::metadata::Env;
use crate::types::Type;

/// Outcome of a successful coverage check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    /// Index of the default clause, always the last one
    pub default: Option<usize>,
    /// The non-default clauses alone cover every value of the subject
    pub is_exhaustive: bool,
}

impl Coverage {
    /// The lowered chain must end in an unreachable panic
    pub fn needs_unreachable_panic(&self) -> bool {
        self.default.is_none()
    }
}

/// True for a clause that matches every value unconditionally
pub fn is_default(env: &Env, clause: &CaseClause) -> bool {
    clause.guard.is_none()
        && clause.pattern.node.is_irrefutable()
        && extractor_view(env, &clause.pattern.node).is_none()
}

/// Check clause placement and coverage of `subject`
pub fn check(env: &Env, clauses: &[CaseClause], subject: &Type, span: Span) -> Result<Coverage> {
    let mut default = None;
    for (i, clause) in clauses.iter().enumerate() {
        if !is_default(env, clause) {
            if default.is_some() {
                return Err(CompileError::pattern(
                    format!("unreachable clause `case {}` after the default case", clause.pattern.node),
                    clause.pattern.span,
                ));
            }
            continue;
        }
        if default.is_some() {
            return Err(CompileError::pattern(
                "multiple default cases in one match",
                clause.pattern.span,
            ));
        }
        default = Some(i);
    }

    let missing = missing_shapes(env, clauses, subject);
    let is_exhaustive = matches!(&missing, Some(m) if m.is_empty());

    if default.is_none() {
        match missing {
            Some(missing) if !missing.is_empty() => {
                return Err(CompileError::pattern(
                    format!("match is not exhaustive: missing {}", missing.join(", ")),
                    span,
                ));
            }
            Some(_) => {}
            None => {
                return Err(CompileError::pattern(
                    format!("match on `{subject}` needs a default case"),
                    span,
                ));
            }
        }
    }

    debug!(?default, is_exhaustive, "match coverage");
    Ok(Coverage {
        default,
        is_exhaustive,
    })
}

/// Shapes of a closed subject no clause covers; `None` for open subjects
fn missing_shapes(env: &Env, clauses: &[CaseClause], subject: &Type) -> Option<Vec<String>> {
    let subject = env.expand_alias(subject);
    if subject.is_bool() {
        let mut seen = BTreeSet::new();
        for clause in clauses.iter().filter(|c| c.guard.is_none()) {
            if let Pattern::Literal(LiteralPattern::Bool(b)) = &clause.pattern.node {
                seen.insert(*b);
            }
        }
        return Some(
            [true, false]
                .into_iter()
                .filter(|b| !seen.contains(b))
                .map(|b| b.to_string())
                .collect(),
        );
    }

    let meta = env.type_meta(&subject).filter(|m| m.is_sealed())?;
    let mut covered = BTreeSet::new();
    for clause in clauses.iter().filter(|c| c.guard.is_none()) {
        let Some(view) = extractor_view(env, &clause.pattern.node) else {
            continue;
        };
        // Only the subject's own variants count; a same-named extractor from
        // another package does not
        let own_variant = env.lookup_type(view.head).is_some_and(|head| {
            head.package == meta.package && meta.variants.contains(&head.name)
        });
        if own_variant && view.args.iter().all(|a| a.node.is_irrefutable()) {
            covered.insert(view.bare_head());
        }
    }
    Some(
        meta.variants
            .iter()
            .filter(|v| !covered.contains(v.as_str()))
            .cloned()
            .collect(),
    )
}
