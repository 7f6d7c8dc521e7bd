//! Source tree to target tree lowering
//!
//! This module drives the semantic passes over one program:
//! - Indexing own declarations so they can be used before they appear
//! - Inserting immutability wrappers around value bindings and fields
//! - Compiling matches into plain conditionals
//! - Extracting methods the target cannot express into functions
//! - Collecting the imports the emitted file needs
//!
//! Expressions are lowered in one of three positions. In value position a
//! construct that needs statements (`if`, `match`, blocks) becomes an
//! immediately invoked function literal. In tail position it returns its
//! value directly. In effect position it runs for its side effects only.

mod call;
mod decl;
mod expr;
mod imports;
mod matching;
mod stmt;

use std::collections::BTreeSet;

use tracing::info;

use crate::ast::{self, Program, Span, Spanned};
use crate::config::LowerConfig;
use crate::error::{CompileError, Result};
use crate::infer::Infer;
use crate::metadata::{Env, Metadata, ProgramIndex};
use crate::names::TempNames;
use crate::scope::ScopeStack;
use crate::target;
use crate::types::Type;

/// Lower a whole program against the shared metadata
pub fn lower_program(program: &Program, metadata: &Metadata, config: &LowerConfig) -> Result<target::File> {
    ast::check_types(program)?;
    let index = ProgramIndex::build(program, &config.runtime_package)?;
    let env = Env::new(index, metadata, config);
    let mut lowerer = Lowerer::new(env);
    let decls = lowerer.lower_decls(program)?;
    let imports = imports::collect(&lowerer.env, &decls, &lowerer.dot_used);
    info!(
        package = %program.package,
        decls = decls.len(),
        imports = imports.len(),
        "lowered program"
    );
    Ok(target::File {
        package: program.package.clone(),
        imports,
        decls,
    })
}

/// Function body being lowered; `return` statements target the innermost
#[derive(Debug, Clone)]
struct Frame {
    result: Type,
    /// Function literal synthesized for a value-position construct
    synthetic: bool,
}

/// State of one lowering run
pub struct Lowerer<'a> {
    env: Env<'a>,
    scope: ScopeStack,
    names: TempNames,
    /// Type parameters of the enclosing declaration
    type_params: Vec<String>,
    depth: usize,
    frames: Vec<Frame>,
    /// Dot-imported packages whose symbols were referenced
    dot_used: BTreeSet<String>,
}

impl<'a> Lowerer<'a> {
    pub fn new(env: Env<'a>) -> Self {
        let names = TempNames::new(env.config.temp_prefix.clone());
        Self {
            env,
            scope: ScopeStack::new(),
            names,
            type_params: Vec::new(),
            depth: 0,
            frames: Vec::new(),
            dot_used: BTreeSet::new(),
        }
    }

    /// Inferred type of `expr` in the current scope, wrapper looked through
    fn type_of(&mut self, expr: &Spanned<crate::ast::Expr>) -> Type {
        let Self {
            env,
            scope,
            type_params,
            ..
        } = self;
        Infer::new(env, type_params).expr_type(scope, expr).strip_immutable()
    }

    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scope.push();
        let out = f(self);
        self.scope.pop();
        out
    }

    /// Run `f` inside a new function frame
    fn with_frame<T>(&mut self, result: Type, synthetic: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        self.frames.push(Frame { result, synthetic });
        let out = f(self);
        self.frames.pop();
        out
    }

    /// Guard recursion into a nested node
    fn nested<T>(&mut self, span: Span, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.env.config.max_depth {
            return Err(CompileError::depth_limit(
                format!(
                    "expression nesting exceeds the limit of {}",
                    self.env.config.max_depth
                ),
                span,
            ));
        }
        self.depth += 1;
        let out = stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || f(self));
        self.depth -= 1;
        out
    }

    /// Record a reference to a symbol of `package`
    fn note_package(&mut self, package: &str) {
        use crate::metadata::ImportResolver;
        if self.env.metadata.imports.is_dot_imported(package) {
            self.dot_used.insert(package.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    fn lower(decls: Vec<Spanned<crate::ast::Decl>>) -> Result<target::File> {
        lower_program(
            &program(decls),
            &Metadata::with_prelude("std"),
            &LowerConfig::default(),
        )
    }

    #[test]
    fn test_runtime_import_is_added_on_use() {
        let file = lower(vec![val("answer", int(42))]).unwrap();
        assert_eq!(
            file.imports,
            vec![target::Import {
                alias: None,
                path: "valgo/std".into()
            }]
        );
        assert_eq!(
            file.decls[0].to_string(),
            "var answer std.Immutable[int] = std.NewImmutable[int](42)\n"
        );
    }

    #[test]
    fn test_no_imports_without_runtime_use() {
        let file = lower(vec![func(
            "one",
            vec![],
            Some(Type::int()),
            int(1),
        )])
        .unwrap();
        assert!(file.imports.is_empty());
        assert_eq!(file.decls[0].to_string(), "func one() int {\n\treturn 1\n}\n");
    }

    #[test]
    fn test_depth_limit() {
        let mut deep = int(0);
        for _ in 0..40 {
            deep = binary(deep, crate::ast::BinOp::Add, int(1));
        }
        let config = LowerConfig {
            max_depth: 16,
            ..LowerConfig::default()
        };
        let err = lower_program(
            &program(vec![func("deep", vec![], Some(Type::int()), deep)]),
            &Metadata::with_prelude("std"),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::DepthLimit { .. }));
    }
}
