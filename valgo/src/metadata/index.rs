//! Own-package index and the lookup environment
//!
//! The index is built in a first pass over the program so that declarations
//! can be used before they appear. It describes own types with the same
//! tables the analyzer produces for other packages, and always takes
//! priority over them.

use std::collections::HashMap;

use super::{
    CompanionObjectMetadata, FunctionMetadata, ImportResolver, Metadata, MethodMetadata,
    TypeKind, TypeMetadata,
};
use crate::ast::{Decl, FuncDecl, Program, SealedDecl, StructDecl, StructField, TypeParam};
use crate::config::LowerConfig;
use crate::error::{CompileError, Result};
use crate::types::{self, Type};

/// Own type alias: `type Name[P...] = target`
#[derive(Debug, Clone)]
pub struct AliasInfo {
    pub type_params: Vec<String>,
    pub target: Type,
}

/// Declarations of the package being lowered
#[derive(Debug, Clone, Default)]
pub struct ProgramIndex {
    pub types: HashMap<String, TypeMetadata>,
    pub functions: HashMap<String, FunctionMetadata>,
    pub companions: HashMap<String, CompanionObjectMetadata>,
    pub aliases: HashMap<String, AliasInfo>,
}

fn param_names(params: &[TypeParam]) -> Vec<String> {
    params.iter().map(|p| p.name.clone()).collect()
}

impl ProgramIndex {
    pub fn build(program: &Program, runtime: &str) -> Result<Self> {
        let mut index = ProgramIndex::default();

        for decl in &program.decls {
            match &decl.node {
                Decl::Struct(s) => index.add_struct(s),
                Decl::Sealed(s) => index.add_sealed(s, runtime)?,
                Decl::TypeAlias(a) => {
                    index.aliases.insert(
                        a.name.node.clone(),
                        AliasInfo {
                            type_params: param_names(&a.type_params),
                            target: a.ty.clone(),
                        },
                    );
                }
                Decl::Func(_) | Decl::Val(_) => {}
            }
        }

        // Methods attach to types indexed above
        for decl in &program.decls {
            if let Decl::Func(f) = &decl.node {
                index.add_func(f);
            }
        }

        Ok(index)
    }

    fn add_struct(&mut self, decl: &StructDecl) {
        let mut meta = TypeMetadata::new("", decl.name.node.clone(), TypeKind::Struct);
        meta.type_params = param_names(&decl.type_params);
        meta.constraints = constraints(&decl.type_params);
        for field in &decl.fields {
            push_field(&mut meta, field);
        }
        self.types.insert(meta.name.clone(), meta);
    }

    fn add_sealed(&mut self, decl: &SealedDecl, runtime: &str) -> Result<()> {
        let name = decl.name.node.clone();
        let mut meta = TypeMetadata::new("", name.clone(), TypeKind::Sealed);
        meta.type_params = param_names(&decl.type_params);
        meta.constraints = constraints(&decl.type_params);
        let sealed_type = meta.self_type("");

        for variant in &decl.variants {
            meta.variants.push(variant.name.node.clone());
            for field in &variant.fields {
                match meta.field_type(&field.name.node) {
                    Some(existing) if existing != field.ty => {
                        return Err(CompileError::pattern(
                            format!(
                                "variant field `{}` of `{name}` is declared as both `{existing}` and `{}`",
                                field.name.node, field.ty
                            ),
                            field.name.span,
                        ));
                    }
                    Some(_) => {}
                    None => push_field(&mut meta, field),
                }
            }

            let mut companion =
                TypeMetadata::new("", variant.name.node.clone(), TypeKind::Companion);
            companion.type_params = meta.type_params.clone();
            companion.constraints = meta.constraints.clone();
            let field_types: Vec<Type> = variant.fields.iter().map(|f| f.ty.clone()).collect();
            companion.methods.insert(
                "Apply".into(),
                MethodMetadata {
                    params: field_types.clone(),
                    result: sealed_type.clone(),
                    ..MethodMetadata::default()
                },
            );
            companion.methods.insert(
                "Unapply".into(),
                MethodMetadata {
                    params: vec![sealed_type.clone()],
                    result: unapply_result(runtime, field_types),
                    ..MethodMetadata::default()
                },
            );
            self.types.insert(companion.name.clone(), companion);
            self.companions.insert(
                variant.name.node.clone(),
                CompanionObjectMetadata {
                    package: String::new(),
                    name: variant.name.node.clone(),
                    target: name.clone(),
                    extract_indices: (0..meta.type_params.len()).collect(),
                },
            );
        }

        self.types.insert(name, meta);
        Ok(())
    }

    fn add_func(&mut self, f: &FuncDecl) {
        let params: Vec<Type> = f.params.iter().map(|p| p.ty.clone()).collect();
        let result = f.result.clone().unwrap_or(Type::Void);
        match &f.receiver {
            Some(recv) => {
                let base = recv.ty.base_name();
                let owner = self
                    .types
                    .entry(base.clone())
                    .or_insert_with(|| TypeMetadata::new("", base, TypeKind::Opaque));
                let recv_args: Vec<String> = recv
                    .ty
                    .generic_args()
                    .iter()
                    .filter_map(|a| a.leaf_name().map(str::to_string))
                    .collect();
                if owner.type_params.is_empty() && owner.kind == TypeKind::Opaque {
                    owner.type_params = recv_args.clone();
                }
                // Signatures are stored against the owner's own parameter names
                let rename: Vec<Type> = owner.type_params.iter().map(Type::basic).collect();
                let subst = types::substitution(&recv_args, &rename);
                owner.methods.insert(
                    f.name.node.clone(),
                    MethodMetadata {
                        params: params.iter().map(|p| p.substitute(&subst)).collect(),
                        result: result.substitute(&subst),
                        type_params: param_names(&f.type_params),
                        generic: false,
                    },
                );
            }
            None => {
                self.functions.insert(
                    f.name.node.clone(),
                    FunctionMetadata {
                        package: String::new(),
                        name: f.name.node.clone(),
                        params,
                        result,
                        type_params: param_names(&f.type_params),
                    },
                );
            }
        }
    }
}

fn constraints(params: &[TypeParam]) -> std::collections::BTreeMap<String, Type> {
    params
        .iter()
        .filter_map(|p| p.constraint.clone().map(|c| (p.name.clone(), c)))
        .collect()
}

fn push_field(meta: &mut TypeMetadata, field: &StructField) {
    meta.fields.push(field.name.node.clone());
    meta.immut_flags.push(!field.mutable);
    meta.field_types.push(field.ty.clone());
}

/// `Unapply` result for a variant with the given fields
pub fn unapply_result(runtime: &str, mut fields: Vec<Type>) -> Type {
    let payload = match fields.len() {
        0 => return Type::bool(),
        1 => fields.remove(0),
        _ => Type::tuple(runtime, fields),
    };
    Type::generic(Type::named(runtime, types::OPTION), vec![payload])
}

// ============================================================================
// Lookup environment
// ============================================================================

/// Resolved field of a receiver type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Declared type with the receiver's type arguments substituted, unwrapped
    pub ty: Type,
    /// Stored in the immutable wrapper
    pub immutable: bool,
}

/// Everything lowering may look up: own index first, then metadata
pub struct Env<'a> {
    pub index: ProgramIndex,
    pub metadata: &'a Metadata,
    pub config: &'a LowerConfig,
}

impl<'a> Env<'a> {
    pub fn new(index: ProgramIndex, metadata: &'a Metadata, config: &'a LowerConfig) -> Self {
        Self {
            index,
            metadata,
            config,
        }
    }

    pub fn runtime(&self) -> &str {
        &self.config.runtime_package
    }

    /// Package behind a source qualifier
    fn package_of(&self, qualifier: &str) -> String {
        match self.metadata.imports.resolve(qualifier) {
            Some(entry) => entry.package.clone(),
            None => qualifier.to_string(),
        }
    }

    /// Packages searched for unqualified names after the own package
    fn implicit_packages(&self) -> Vec<String> {
        let mut packages = vec![self.runtime().to_string()];
        packages.extend(
            self.metadata
                .imports
                .dot_imports()
                .map(|e| e.package.clone()),
        );
        packages
    }

    /// Look up a type by source name, bare or `pkg.Name`
    pub fn lookup_type(&self, name: &str) -> Option<&TypeMetadata> {
        if let Some((qualifier, bare)) = name.rsplit_once('.') {
            return self.metadata.get_type(&self.package_of(qualifier), bare);
        }
        if let Some(meta) = self.index.types.get(name) {
            return Some(meta);
        }
        self.implicit_packages()
            .iter()
            .find_map(|pkg| self.metadata.get_type(pkg, name))
    }

    /// Metadata of the declared type at the head of `ty`
    pub fn type_meta(&self, ty: &Type) -> Option<&TypeMetadata> {
        match ty {
            Type::Pointer { elem } => self.type_meta(elem),
            Type::Generic { base, .. } => self.type_meta(base),
            Type::Basic { name } => self.lookup_type(name),
            Type::Named { package, name } if package.is_empty() => self.lookup_type(name),
            Type::Named { package, name } => self.lookup_type(&format!("{package}.{name}")),
            _ => None,
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionMetadata> {
        if let Some((qualifier, bare)) = name.rsplit_once('.') {
            return self.metadata.get_function(&self.package_of(qualifier), bare);
        }
        if let Some(func) = self.index.functions.get(name) {
            return Some(func);
        }
        self.metadata
            .imports
            .dot_imports()
            .find_map(|e| self.metadata.get_function(&e.package, name))
    }

    pub fn lookup_companion(&self, name: &str) -> Option<&CompanionObjectMetadata> {
        if let Some((qualifier, bare)) = name.rsplit_once('.') {
            return self.metadata.get_companion(&self.package_of(qualifier), bare);
        }
        if let Some(companion) = self.index.companions.get(name) {
            return Some(companion);
        }
        self.implicit_packages()
            .iter()
            .find_map(|pkg| self.metadata.get_companion(pkg, name))
    }

    /// Qualifier emitted code uses for symbols of `package`
    pub fn qualifier(&self, package: &str) -> String {
        if package.is_empty() || package == self.runtime() {
            return package.to_string();
        }
        self.metadata
            .imports
            .alias_for(package)
            .unwrap_or_else(|| package.to_string())
    }

    /// Reference to a type described by metadata, without type arguments
    pub fn type_ref(&self, meta: &TypeMetadata) -> Type {
        Type::named(self.qualifier(&meta.package), meta.name.clone())
    }

    /// Runtime type `std.Name[params]`
    pub fn runtime_type(&self, name: &str, params: Vec<Type>) -> Type {
        Type::generic(Type::named(self.runtime(), name), params)
    }

    pub fn tuple_type(&self, elems: Vec<Type>) -> Type {
        Type::tuple(self.runtime(), elems)
    }

    pub fn immutable(&self, inner: Type) -> std::result::Result<Type, types::TypeError> {
        Type::immutable(self.runtime(), inner)
    }

    /// Expand own aliases at the head of `ty`
    pub fn expand_alias(&self, ty: &Type) -> Type {
        let name = match ty.leaf_name() {
            Some(name) => name,
            None => match ty {
                Type::Generic { base, .. } => match base.leaf_name() {
                    Some(name) => name,
                    None => return ty.clone(),
                },
                _ => return ty.clone(),
            },
        };
        match self.index.aliases.get(name) {
            Some(alias) => {
                let subst = types::substitution(&alias.type_params, ty.generic_args());
                self.expand_alias(&alias.target.substitute(&subst))
            }
            None => ty.clone(),
        }
    }

    /// Type arguments of `recv` keyed by its declared type-parameter names
    pub fn receiver_substitution(&self, meta: &TypeMetadata, recv: &Type) -> HashMap<String, Type> {
        let recv = match recv {
            Type::Pointer { elem } => elem.as_ref(),
            other => other,
        };
        types::substitution(&meta.type_params, recv.generic_args())
    }

    /// Field of `recv`, resolved through own index, then metadata flags, then
    /// the field's declared type
    pub fn field(&self, recv: &Type, name: &str) -> Option<FieldInfo> {
        let meta = self.type_meta(recv)?;
        let idx = meta.field_index(name)?;
        let declared = meta.field_types.get(idx)?;
        let subst = self.receiver_substitution(meta, recv);
        let immutable = match meta.immut_flags.get(idx) {
            Some(flag) => *flag,
            None => declared.is_immutable(),
        };
        Some(FieldInfo {
            ty: declared.strip_immutable().substitute(&subst),
            immutable,
        })
    }

    /// Method of `recv`, or of the type itself when it is a companion
    pub fn method(&self, recv: &Type, name: &str) -> Option<(&TypeMetadata, &MethodMetadata)> {
        let meta = self.type_meta(recv)?;
        meta.method(name).map(|m| (meta, m))
    }

    /// Method signature with the receiver's type arguments applied
    pub fn method_signature(&self, recv: &Type, name: &str) -> Option<MethodMetadata> {
        let (meta, method) = self.method(recv, name)?;
        let subst = self.receiver_substitution(meta, recv);
        Some(MethodMetadata {
            params: method.params.iter().map(|p| p.substitute(&subst)).collect(),
            result: method.result.substitute(&subst),
            type_params: method.type_params.clone(),
            generic: method.generic,
        })
    }

    /// True when `name` is an imported package qualifier
    pub fn is_package(&self, name: &str) -> bool {
        name == self.runtime() || self.metadata.imports.is_package(name)
    }

    /// Every type name known to the run, for suggestions
    pub fn known_type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.types.keys().map(String::as_str).collect();
        names.extend(self.metadata.type_names());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    fn shapes() -> Program {
        program(vec![
            struct_decl(
                "Person",
                &[],
                vec![field("name", Type::string()), var_field("age", Type::int())],
            ),
            sealed(
                "Shape",
                &[],
                vec![
                    variant("Circle", vec![field("r", Type::float64())]),
                    variant(
                        "Rect",
                        vec![field("w", Type::float64()), field("h", Type::float64())],
                    ),
                    variant("Empty", vec![]),
                ],
            ),
            method(
                ("p", Type::local("Person")),
                "Greet",
                &[],
                vec![],
                Some(Type::string()),
                string("hi"),
            ),
        ])
    }

    #[test]
    fn test_index_struct_fields() {
        let index = ProgramIndex::build(&shapes(), "std").unwrap();
        let person = &index.types["Person"];
        assert_eq!(person.field_immutable("name"), Some(true));
        assert_eq!(person.field_immutable("age"), Some(false));
        assert!(person.method("Greet").is_some());
    }

    #[test]
    fn test_index_sealed_companions() {
        let index = ProgramIndex::build(&shapes(), "std").unwrap();
        let shape = &index.types["Shape"];
        assert_eq!(shape.variants, vec!["Circle", "Rect", "Empty"]);
        assert_eq!(shape.fields, vec!["r", "w", "h"]);
        let rect = &index.types["Rect"];
        assert_eq!(
            rect.method("Unapply").unwrap().result.render(),
            "std.Option[std.Tuple[float64, float64]]"
        );
        let empty = &index.types["Empty"];
        assert_eq!(empty.method("Unapply").unwrap().result, Type::bool());
        assert_eq!(index.companions["Circle"].target, "Shape");
    }

    #[test]
    fn test_conflicting_variant_fields() {
        let prog = program(vec![sealed(
            "Value",
            &[],
            vec![
                variant("I", vec![field("v", Type::int())]),
                variant("S", vec![field("v", Type::string())]),
            ],
        )]);
        assert!(matches!(
            ProgramIndex::build(&prog, "std"),
            Err(CompileError::Pattern { .. })
        ));
    }

    #[test]
    fn test_env_prefers_own_types() {
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let index = ProgramIndex::build(&shapes(), "std").unwrap();
        let env = Env::new(index, &metadata, &config);
        assert_eq!(env.lookup_type("Person").unwrap().package, "");
        assert_eq!(env.lookup_type("Option").unwrap().package, "std");
        assert_eq!(env.lookup_type("std.List").unwrap().name, "List");
        let field = env.field(&Type::local("Person"), "name").unwrap();
        assert!(field.immutable);
        assert_eq!(field.ty, Type::string());
    }

    #[test]
    fn test_field_substitutes_receiver_args() {
        let metadata = Metadata::with_prelude("std");
        let config = LowerConfig::default();
        let env = Env::new(ProgramIndex::default(), &metadata, &config);
        let pair = Type::tuple("std", vec![Type::int(), Type::string()]);
        let v2 = env.field(&pair, "V2").unwrap();
        assert_eq!(v2.ty, Type::string());
        assert!(!v2.immutable);
        let sig = env
            .method_signature(&Type::generic(Type::named("std", "List"), vec![Type::int()]), "Get")
            .unwrap();
        assert_eq!(sig.result, Type::int());
    }

    #[test]
    fn test_expand_alias() {
        let prog = program(vec![type_alias(
            "Pairs",
            &["A"],
            Type::tuple("std", vec![Type::basic("A"), Type::basic("A")]),
        )]);
        let metadata = Metadata::default();
        let config = LowerConfig::default();
        let env = Env::new(ProgramIndex::build(&prog, "std").unwrap(), &metadata, &config);
        let ty = Type::generic(Type::local("Pairs"), vec![Type::int()]);
        assert_eq!(env.expand_alias(&ty).render(), "std.Tuple[int, int]");
    }
}
