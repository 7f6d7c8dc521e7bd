//! Match lowering
//!
//! Every clause compiles to a run of conditionals around its body. In tail
//! position the bodies return, so the clauses simply follow one another. In
//! effect position a `_matchedN` flag stops later clauses once one has run.
//! A chain without a default case ends in an unreachable panic.

use tracing::debug;

use super::Lowerer;
use crate::ast::{self, CaseClause, Span, Spanned};
use crate::error::{CompileError, Result};
use crate::infer::Infer;
use crate::pattern::reconcile::{self, ClauseResult};
use crate::pattern::{PatternCompiler, exhaustiveness};
use crate::scope::Mutability;
use crate::target::{Expr, Stmt};
use crate::types::Type;

/// Where the lowered match sits
#[derive(Debug, Clone, Copy)]
pub enum Position<'t> {
    /// Run for side effects; control continues after the match
    Effect,
    /// Each clause returns its value of the given type
    Tail(&'t Type),
}

impl<'a> Lowerer<'a> {
    pub(super) fn lower_match(
        &mut self,
        subject: &Spanned<ast::Expr>,
        clauses: &[CaseClause],
        position: Position,
        span: Span,
    ) -> Result<Vec<Stmt>> {
        let subject_ty = self.type_of(subject);
        if subject_ty.is_nil() || subject_ty.is_void() {
            return Err(CompileError::inference(
                "cannot infer the type of the match subject",
                subject.span,
            ));
        }
        let coverage = exhaustiveness::check(&self.env, clauses, &subject_ty, span)?;
        if let Position::Tail(result) = position {
            self.reconcile_clauses(clauses, &subject_ty, result, span)?;
        }

        let mut out = Vec::new();
        let lowered = self.lower_expr(subject, None)?;
        let subject_expr = if lowered.is_pure_read() {
            lowered
        } else {
            let tmp = self.names.fresh();
            out.push(Stmt::define(tmp.clone(), lowered));
            Expr::ident(tmp)
        };

        let flag = match position {
            Position::Effect if clauses.len() > 1 => {
                let flag = self.names.matched_flag();
                out.push(Stmt::define(flag.clone(), Expr::bool(false)));
                Some(flag)
            }
            _ => None,
        };

        let mut exhausted = false;
        for clause in clauses {
            let (mut stmts, unconditional) =
                self.lower_clause(clause, subject_expr.clone(), &subject_ty, position, flag.as_deref())?;
            match &flag {
                Some(flag) => {
                    stmts = vec![Stmt::If {
                        cond: Expr::not(Expr::ident(flag.as_str())),
                        then: stmts,
                        els: vec![],
                    }];
                }
                None if !unconditional && stmts.len() > 1 => stmts = vec![Stmt::Block(stmts)],
                None => {}
            }
            out.extend(stmts);
            if unconditional {
                exhausted = true;
                break;
            }
        }

        if !exhausted && coverage.needs_unreachable_panic() {
            let panic = Stmt::Expr(Expr::call(
                Expr::ident("panic"),
                vec![Expr::string(format!("unreachable: no case matched a `{subject_ty}`"))],
            ));
            match &flag {
                Some(flag) => out.push(Stmt::If {
                    cond: Expr::not(Expr::ident(flag.as_str())),
                    then: vec![panic],
                    els: vec![],
                }),
                None => out.push(panic),
            }
        }
        debug!(
            clauses = clauses.len(),
            exhaustive = coverage.is_exhaustive,
            "lowered match"
        );
        Ok(out)
    }

    /// Lower one clause; also reports whether it matches unconditionally
    fn lower_clause(
        &mut self,
        clause: &CaseClause,
        subject: Expr,
        subject_ty: &Type,
        position: Position,
        flag: Option<&str>,
    ) -> Result<(Vec<Stmt>, bool)> {
        let compiled = PatternCompiler::new(&self.env, &mut self.names).compile(
            &clause.pattern,
            subject,
            subject_ty,
        )?;
        self.with_scope(|this| {
            let mut compiled = compiled;
            for (name, ty) in &compiled.bindings {
                this.scope.bind(name.clone(), Mutability::Val, ty.clone());
            }
            if let Some(guard) = &clause.guard {
                let cond = this.lower_expr(guard, Some(&Type::bool()))?;
                compiled.guard(cond);
            }
            let unconditional = compiled.is_unconditional();
            let mut body = Vec::new();
            if let Some(flag) = flag {
                body.push(Stmt::assign(Expr::ident(flag), Expr::bool(true)));
            }
            match position {
                Position::Effect => body.extend(this.lower_effect(&clause.body)?),
                Position::Tail(result) => body.extend(this.lower_tail(&clause.body, result)?),
            }
            let stmts = compiled.assemble(body, |name| clause.references(name));
            Ok((stmts, unconditional))
        })
    }

    /// Reject clauses whose result types disagree with each other or with
    /// the type the match must produce
    fn reconcile_clauses(
        &mut self,
        clauses: &[CaseClause],
        subject_ty: &Type,
        result: &Type,
        span: Span,
    ) -> Result<Type> {
        let types: Vec<Type> = {
            let Self {
                env,
                scope,
                type_params,
                ..
            } = self;
            let infer = Infer::new(env, type_params);
            clauses
                .iter()
                .map(|c| infer.clause_type(scope, c, subject_ty))
                .collect()
        };
        // Bodies without a value end in `return` or `panic`
        let results: Vec<ClauseResult> = clauses
            .iter()
            .zip(types)
            .filter(|(_, ty)| !ty.is_void())
            .map(|(c, ty)| ClauseResult {
                pattern: &c.pattern.node,
                ty,
                numeric_literal: c.body.node.is_numeric_literal(),
            })
            .collect();
        let declared = if result.is_any() { None } else { Some(result) };
        reconcile::reconcile(&results, declared, &self.type_params, span)
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

    fn shape() -> Spanned<Decl> {
        sealed(
            "Shape",
            &[],
            vec![
                variant("Circle", vec![field("r", Type::float64())]),
                variant("Empty", vec![]),
            ],
        )
    }

    #[test]
    fn test_tail_match_over_sealed_type() {
        let out = lower_last(vec![
            shape(),
            func(
                "area",
                vec![("s", Type::local("Shape"))],
                Some(Type::float64()),
                match_expr(
                    ident("s"),
                    vec![
                        case(
                            extractor("Circle", vec![pident("r")]),
                            binary(ident("r"), BinOp::Mul, ident("r")),
                        ),
                        case(pident("Empty"), float(0.0)),
                    ],
                ),
            ),
        ])
        .unwrap();
        assert_eq!(
            out,
            "func area(s Shape) float64 {\n\
             \t{\n\
             \t\t_tmp0 := Circle{}.Unapply(s)\n\
             \t\tif _tmp0.IsDefined() {\n\
             \t\t\tr := _tmp0.Get()\n\
             \t\t\treturn r * r\n\
             \t\t}\n\
             \t}\n\
             \tif Empty{}.Unapply(s) {\n\
             \t\treturn 0.0\n\
             \t}\n\
             \tpanic(\"unreachable: no case matched a `Shape`\")\n\
             }\n"
        );
    }

    #[test]
    fn test_default_case_stops_the_chain() {
        let out = lower_last(vec![func(
            "describe",
            vec![("n", Type::int())],
            Some(Type::string()),
            match_expr(
                ident("n"),
                vec![case(plit_int(0), string("zero")), case(wildcard(), string("many"))],
            ),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func describe(n int) string {\n\tif n == 0 {\n\t\treturn \"zero\"\n\t}\n\treturn \"many\"\n}\n"
        );
    }

    #[test]
    fn test_effect_match_uses_flag() {
        let out = lower_last(vec![func(
            "report",
            vec![("n", Type::int())],
            None,
            match_expr(
                ident("n"),
                vec![
                    case(plit_int(0), call(ident("println"), vec![string("zero")])),
                    case(wildcard(), call(ident("println"), vec![ident("n")])),
                ],
            ),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func report(n int) {\n\
             \t_matched0 := false\n\
             \tif !_matched0 {\n\
             \t\tif n == 0 {\n\
             \t\t\t_matched0 = true\n\
             \t\t\tprintln(\"zero\")\n\
             \t\t}\n\
             \t}\n\
             \tif !_matched0 {\n\
             \t\t_matched0 = true\n\
             \t\tprintln(n)\n\
             \t}\n\
             }\n"
        );
    }

    #[test]
    fn test_guard_binds_before_check() {
        let out = lower_last(vec![func(
            "positive",
            vec![("n", Type::int())],
            Some(Type::bool()),
            match_expr(
                ident("n"),
                vec![
                    case_if(pident("x"), binary(ident("x"), BinOp::Gt, int(0)), boolean(true)),
                    case(wildcard(), boolean(false)),
                ],
            ),
        )])
        .unwrap();
        assert_eq!(
            out,
            "func positive(n int) bool {\n\t{\n\t\tx := n\n\t\tif x > 0 {\n\t\t\treturn true\n\t\t}\n\t}\n\treturn false\n}\n"
        );
    }

    #[test]
    fn test_clause_results_must_agree() {
        let err = lower_last(vec![func(
            "mixed",
            vec![("n", Type::int())],
            Some(Type::Any),
            match_expr(
                ident("n"),
                vec![case(plit_int(0), string("zero")), case(wildcard(), boolean(true))],
            ),
        )])
        .unwrap_err();
        assert!(matches!(err, CompileError::ResultConflict { .. }));
    }

    #[test]
    fn test_return_inside_value_match_is_rejected() {
        let err = lower_last(vec![func(
            "early",
            vec![("n", Type::int())],
            Some(Type::int()),
            binary(
                match_expr(
                    ident("n"),
                    vec![
                        case(plit_int(0), block(vec![ret(Some(int(1)))])),
                        case(wildcard(), int(2)),
                    ],
                ),
                BinOp::Add,
                int(1),
            ),
        )])
        .unwrap_err();
        assert!(matches!(err, CompileError::Pattern { .. }));
    }
}
