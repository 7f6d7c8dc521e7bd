//! Debug rendering of the target tree in target-language surface syntax
//!
//! Not a formatter: the output is close enough to read and to assert on in
//! tests. Indentation is one tab per level.

use std::fmt;

use super::{Decl, Element, Expr, Field, File, FuncDecl, Lit, Stmt, TypeParam};
use crate::types::Type;

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn file(&mut self, file: &File) {
        self.line(&format!("package {}", file.package));
        if !file.imports.is_empty() {
            self.line("");
            self.line("import (");
            self.indent += 1;
            for import in &file.imports {
                match &import.alias {
                    Some(alias) => self.line(&format!("{alias} {:?}", import.path)),
                    None => self.line(&format!("{:?}", import.path)),
                }
            }
            self.indent -= 1;
            self.line(")");
        }
        for decl in &file.decls {
            self.line("");
            self.decl(decl);
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func(func),
            Decl::Struct {
                name,
                type_params,
                fields,
            } => {
                if fields.is_empty() {
                    self.line(&format!("type {name}{} struct{{}}", type_params_text(type_params)));
                    return;
                }
                self.line(&format!("type {name}{} struct {{", type_params_text(type_params)));
                self.indent += 1;
                for field in fields {
                    self.line(&format!("{} {}", field.name, field.ty));
                }
                self.indent -= 1;
                self.line("}");
            }
            Decl::Alias {
                name,
                type_params,
                ty,
            } => {
                self.line(&format!("type {name}{} = {ty}", type_params_text(type_params)));
            }
            Decl::Var { name, ty, value } => {
                let mut text = format!("var {name}");
                if let Some(ty) = ty {
                    text.push_str(&format!(" {ty}"));
                }
                if let Some(value) = value {
                    text.push_str(&format!(" = {}", self.expr(value)));
                }
                self.line(&text);
            }
            Decl::Const { name, ty, value } => {
                let value = self.expr(value);
                match ty {
                    Some(ty) => self.line(&format!("const {name} {ty} = {value}")),
                    None => self.line(&format!("const {name} = {value}")),
                }
            }
        }
    }

    fn func(&mut self, func: &FuncDecl) {
        let receiver = match &func.receiver {
            Some(recv) if recv.name.is_empty() => format!("({}) ", recv.ty),
            Some(recv) => format!("({} {}) ", recv.name, recv.ty),
            None => String::new(),
        };
        self.line(&format!(
            "func {receiver}{}{}({}){} {{",
            func.name,
            type_params_text(&func.type_params),
            fields_text(&func.params),
            results_text(&func.results),
        ));
        self.block(&func.body);
        self.line("}");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Define { names, values } => {
                let values = self.exprs(values);
                self.line(&format!("{} := {values}", names.join(", ")));
            }
            Stmt::Var { name, ty, value } => match value {
                Some(value) => {
                    let value = self.expr(value);
                    self.line(&format!("var {name} {ty} = {value}"));
                }
                None => self.line(&format!("var {name} {ty}")),
            },
            Stmt::Assign {
                targets,
                op,
                values,
            } => {
                let targets = self.exprs(targets);
                let values = self.exprs(values);
                match op {
                    Some(op) => self.line(&format!("{targets} {op}= {values}")),
                    None => self.line(&format!("{targets} = {values}")),
                }
            }
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.line(&text);
            }
            Stmt::Return(values) if values.is_empty() => self.line("return"),
            Stmt::Return(values) => {
                let values = self.exprs(values);
                self.line(&format!("return {values}"));
            }
            Stmt::If { .. } => self.if_chain(stmt, "if"),
            Stmt::For { cond, body } => {
                match cond {
                    Some(cond) => {
                        let cond = self.expr(cond);
                        self.line(&format!("for {cond} {{"));
                    }
                    None => self.line("for {"),
                }
                self.block(body);
                self.line("}");
            }
            Stmt::Block(stmts) => {
                self.line("{");
                self.block(stmts);
                self.line("}");
            }
        }
    }

    fn if_chain(&mut self, stmt: &Stmt, keyword: &str) {
        let Stmt::If { cond, then, els } = stmt else {
            return;
        };
        let cond = self.expr(cond);
        self.line(&format!("{keyword} {cond} {{"));
        self.block(then);
        match els.as_slice() {
            [] => self.line("}"),
            [nested @ Stmt::If { .. }] => self.if_chain(nested, "} else if"),
            _ => {
                self.line("} else {");
                self.block(els);
                self.line("}");
            }
        }
    }

    fn exprs(&self, exprs: &[Expr]) -> String {
        exprs
            .iter()
            .map(|e| self.expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Lit(lit) => lit.to_string(),
            Expr::Type(ty) => ty.render(),
            Expr::Selector { x, sel } => format!("{}.{sel}", self.operand(x)),
            Expr::Call {
                fun,
                type_args,
                args,
            } => {
                let mut text = self.operand(fun);
                if !type_args.is_empty() {
                    let targs: Vec<String> = type_args.iter().map(Type::render).collect();
                    text.push_str(&format!("[{}]", targs.join(", ")));
                }
                format!("{text}({})", self.exprs(args))
            }
            Expr::Index { x, index } => format!("{}[{}]", self.operand(x), self.expr(index)),
            Expr::Binary { op, left, right } => {
                format!("{} {op} {}", self.operand(left), self.operand(right))
            }
            Expr::Unary { op, x } => format!("{op}{}", self.operand(x)),
            Expr::FuncLit {
                params,
                results,
                body,
            } => {
                let mut inner = Printer::new(self.indent);
                inner.block(body);
                let mut tail = String::new();
                for _ in 0..self.indent {
                    tail.push('\t');
                }
                format!(
                    "func({}){} {{\n{}{tail}}}",
                    fields_text(params),
                    results_text(results),
                    inner.out
                )
            }
            Expr::Composite { ty, elts } => {
                let elts: Vec<String> = elts.iter().map(|e| self.element(e)).collect();
                format!("{ty}{{{}}}", elts.join(", "))
            }
            Expr::TypeAssert { x, ty } => format!("{}.({ty})", self.operand(x)),
            Expr::Paren(x) => format!("({})", self.expr(x)),
        }
    }

    /// Operand position: compound expressions get parentheses
    fn operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } | Expr::FuncLit { .. } => format!("({})", self.expr(expr)),
            _ => self.expr(expr),
        }
    }

    fn element(&self, elt: &Element) -> String {
        match &elt.key {
            Some(key) => format!("{key}: {}", self.expr(&elt.value)),
            None => self.expr(&elt.value),
        }
    }
}

fn type_params_text(params: &[TypeParam]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let params: Vec<String> = params
        .iter()
        .map(|p| format!("{} {}", p.name, p.constraint))
        .collect();
    format!("[{}]", params.join(", "))
}

fn fields_text(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| format!("{} {}", f.name, f.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

fn results_text(results: &[Type]) -> String {
    match results {
        [] => String::new(),
        [single] => format!(" {single}"),
        many => {
            let many: Vec<String> = many.iter().map(Type::render).collect();
            format!(" ({})", many.join(", "))
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lit::Int(n) => write!(f, "{n}"),
            Lit::Float(x) => write!(f, "{x:?}"),
            Lit::String(s) => write!(f, "{s:?}"),
            Lit::Char(c) => write!(f, "{c:?}"),
            Lit::Bool(b) => write!(f, "{b}"),
            Lit::Nil => write!(f, "nil"),
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new(0);
        printer.file(self);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new(0);
        printer.decl(self);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new(0);
        printer.stmt(self);
        f.write_str(&printer.out)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::new(0).expr(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{BinOp, Import};

    #[test]
    fn test_render_call_with_type_args() {
        let e = Expr::call_generic(
            Expr::qualified("std", "NewImmutable"),
            vec![Type::int()],
            vec![Expr::int(5)],
        );
        assert_eq!(e.to_string(), "std.NewImmutable[int](5)");
    }

    #[test]
    fn test_render_nested_binary_gets_parens() {
        let e = Expr::binary(
            BinOp::Mul,
            Expr::binary(BinOp::Add, Expr::ident("a"), Expr::ident("b")),
            Expr::ident("c"),
        );
        assert_eq!(e.to_string(), "(a + b) * c");
    }

    #[test]
    fn test_render_else_if_chain() {
        let stmt = Stmt::If {
            cond: Expr::ident("a"),
            then: vec![Stmt::ret(Expr::int(1))],
            els: vec![Stmt::If {
                cond: Expr::ident("b"),
                then: vec![Stmt::ret(Expr::int(2))],
                els: vec![Stmt::ret(Expr::int(3))],
            }],
        };
        assert_eq!(
            stmt.to_string(),
            "if a {\n\treturn 1\n} else if b {\n\treturn 2\n} else {\n\treturn 3\n}\n"
        );
    }

    #[test]
    fn test_render_file() {
        let file = File {
            package: "main".into(),
            imports: vec![Import {
                alias: None,
                path: "valgo/std".into(),
            }],
            decls: vec![Decl::Func(FuncDecl {
                name: "answer".into(),
                type_params: vec![],
                receiver: None,
                params: vec![],
                results: vec![Type::int()],
                body: vec![Stmt::ret(Expr::int(42))],
            })],
        };
        assert_eq!(
            file.to_string(),
            "package main\n\nimport (\n\t\"valgo/std\"\n)\n\nfunc answer() int {\n\treturn 42\n}\n"
        );
    }

    #[test]
    fn test_render_immediately_invoked_literal() {
        let e = Expr::immediately_invoked(vec![Type::int()], vec![Stmt::ret(Expr::int(1))]);
        assert_eq!(e.to_string(), "(func() int {\n\treturn 1\n})()");
    }
}
