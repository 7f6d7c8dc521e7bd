//! Import collection over the lowered tree
//!
//! A package is imported when some emitted type or selector names it.
//! Dot-imported packages have no qualifier in emitted code, so the driver
//! records their uses while lowering and passes them in.

use std::collections::BTreeSet;

use tracing::warn;

use crate::metadata::Env;
use crate::target::{Decl, Expr, Import, Stmt};
use crate::types::Type;

pub fn collect(env: &Env, decls: &[Decl], dot_used: &BTreeSet<String>) -> Vec<Import> {
    let mut collector = Collector {
        env,
        qualifiers: BTreeSet::new(),
    };
    for decl in decls {
        collector.decl(decl);
    }

    let mut imports = BTreeSet::new();
    for qualifier in &collector.qualifiers {
        if qualifier == env.runtime() {
            imports.insert(Import {
                alias: None,
                path: env.config.runtime_import.clone(),
            });
            continue;
        }
        let table = &env.metadata.imports;
        match table.resolve(qualifier).or_else(|| table.entry(qualifier)) {
            Some(entry) => {
                imports.insert(Import {
                    alias: entry.alias.clone(),
                    path: entry.path.clone(),
                });
            }
            None => warn!(qualifier = %qualifier, "no import path for qualifier"),
        }
    }
    for package in dot_used {
        if let Some(entry) = env.metadata.imports.entry(package) {
            imports.insert(Import {
                alias: Some(".".into()),
                path: entry.path.clone(),
            });
        }
    }
    imports.into_iter().collect()
}

struct Collector<'e, 'a> {
    env: &'e Env<'a>,
    qualifiers: BTreeSet<String>,
}

impl Collector<'_, '_> {
    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(f) => {
                for p in &f.type_params {
                    self.ty(&p.constraint);
                }
                for field in f.receiver.iter().chain(&f.params) {
                    self.ty(&field.ty);
                }
                for ty in &f.results {
                    self.ty(ty);
                }
                self.stmts(&f.body);
            }
            Decl::Struct {
                type_params, fields, ..
            } => {
                for p in type_params {
                    self.ty(&p.constraint);
                }
                for field in fields {
                    self.ty(&field.ty);
                }
            }
            Decl::Alias { type_params, ty, .. } => {
                for p in type_params {
                    self.ty(&p.constraint);
                }
                self.ty(ty);
            }
            Decl::Var { ty, value, .. } => {
                if let Some(ty) = ty {
                    self.ty(ty);
                }
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Decl::Const { ty, value, .. } => {
                if let Some(ty) = ty {
                    self.ty(ty);
                }
                self.expr(value);
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Define { values, .. } | Stmt::Return(values) => {
                values.iter().for_each(|v| self.expr(v));
            }
            Stmt::Var { ty, value, .. } => {
                self.ty(ty);
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::Assign { targets, values, .. } => {
                targets.iter().chain(values).for_each(|v| self.expr(v));
            }
            Stmt::Expr(e) => self.expr(e),
            Stmt::If { cond, then, els } => {
                self.expr(cond);
                self.stmts(then);
                self.stmts(els);
            }
            Stmt::For { cond, body } => {
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                self.stmts(body);
            }
            Stmt::Block(body) => self.stmts(body),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(_) | Expr::Lit(_) => {}
            Expr::Type(ty) => self.ty(ty),
            Expr::Selector { x, .. } => match x.as_ref() {
                Expr::Ident(q) if self.env.is_package(q) => {
                    self.qualifiers.insert(q.clone());
                }
                other => self.expr(other),
            },
            Expr::Call {
                fun,
                type_args,
                args,
            } => {
                self.expr(fun);
                type_args.iter().for_each(|t| self.ty(t));
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::Index { x, index } => {
                self.expr(x);
                self.expr(index);
            }
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Unary { x, .. } | Expr::Paren(x) => self.expr(x),
            Expr::FuncLit {
                params,
                results,
                body,
            } => {
                params.iter().for_each(|p| self.ty(&p.ty));
                results.iter().for_each(|t| self.ty(t));
                self.stmts(body);
            }
            Expr::Composite { ty, elts } => {
                self.ty(ty);
                elts.iter().for_each(|e| self.expr(&e.value));
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x);
                self.ty(ty);
            }
        }
    }

    fn ty(&mut self, ty: &Type) {
        match ty {
            Type::Named { package, .. } => {
                if !package.is_empty() {
                    self.qualifiers.insert(package.clone());
                }
            }
            Type::Generic { base, params } => {
                self.ty(base);
                params.iter().for_each(|p| self.ty(p));
            }
            Type::Array { elem } | Type::Pointer { elem } => self.ty(elem),
            Type::Map { key, elem } => {
                self.ty(key);
                self.ty(elem);
            }
            Type::Func { params, results } => {
                params.iter().chain(results).for_each(|t| self.ty(t));
            }
            Type::Basic { .. } | Type::Any | Type::Nil | Type::Void => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::config::LowerConfig;
    use crate::lower::lower_program;
    use crate::metadata::{FunctionMetadata, ImportEntry, Metadata, ProgramIndex};

    fn geo_metadata(dot: bool, alias: Option<&str>) -> Metadata {
        let mut metadata = Metadata::with_prelude("std");
        metadata.imports.add(ImportEntry {
            package: "geo".into(),
            path: "example.com/geo".into(),
            alias: alias.map(str::to_string),
            dot,
        });
        metadata.add_function(FunctionMetadata {
            package: "geo".into(),
            name: "Origin".into(),
            params: vec![],
            result: Type::int(),
            type_params: vec![],
        });
        metadata
    }

    #[test]
    fn test_qualified_use_imports_package() {
        let metadata = geo_metadata(false, None);
        let file = lower_program(
            &program(vec![func(
                "start",
                vec![],
                Some(Type::int()),
                call(select(ident("geo"), "Origin"), vec![]),
            )]),
            &metadata,
            &LowerConfig::default(),
        )
        .unwrap();
        assert_eq!(
            file.imports,
            vec![Import {
                alias: None,
                path: "example.com/geo".into()
            }]
        );
    }

    #[test]
    fn test_aliased_import_keeps_alias() {
        let metadata = geo_metadata(false, Some("g"));
        let file = lower_program(
            &program(vec![func(
                "start",
                vec![],
                Some(Type::int()),
                call(select(ident("g"), "Origin"), vec![]),
            )]),
            &metadata,
            &LowerConfig::default(),
        )
        .unwrap();
        assert_eq!(file.decls[0].to_string(), "func start() int {\n\treturn g.Origin()\n}\n");
        assert_eq!(
            file.imports,
            vec![Import {
                alias: Some("g".into()),
                path: "example.com/geo".into()
            }]
        );
    }

    #[test]
    fn test_dot_import_only_when_used() {
        let metadata = geo_metadata(true, None);
        let used = lower_program(
            &program(vec![func("start", vec![], Some(Type::int()), call(ident("Origin"), vec![]))]),
            &metadata,
            &LowerConfig::default(),
        )
        .unwrap();
        assert_eq!(
            used.imports,
            vec![Import {
                alias: Some(".".into()),
                path: "example.com/geo".into()
            }]
        );

        let unused = lower_program(
            &program(vec![func("start", vec![], Some(Type::int()), int(0))]),
            &metadata,
            &LowerConfig::default(),
        )
        .unwrap();
        assert!(unused.imports.is_empty());
    }

    #[test]
    fn test_runtime_types_in_signatures_are_found() {
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let index = ProgramIndex::build(&program(vec![]), "std").unwrap();
        let env = Env::new(index, &metadata, &config);
        let decls = vec![Decl::Var {
            name: "xs".into(),
            ty: Some(Type::generic(Type::named("std", "List"), vec![Type::int()])),
            value: None,
        }];
        assert_eq!(
            collect(&env, &decls, &BTreeSet::new()),
            vec![Import {
                alias: None,
                path: "valgo/std".into()
            }]
        );
    }
}
