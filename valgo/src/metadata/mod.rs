//! Cross-package metadata
//!
//! The analyzer harvests these tables from compiled packages and hands them
//! over as JSON. Lowering only reads them. Tables are keyed by qualified
//! name (`pkg.Name`); the runtime prelude is always merged in.

mod index;
mod prelude;

pub use index::{Env, FieldInfo, ProgramIndex, unapply_result};
pub use prelude::prelude;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::types::Type;

/// What a named type is, as far as lowering cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Struct,
    /// Closed variant set; `variants` lists the constructible shapes
    Sealed,
    /// Extractor object with `Apply`/`Unapply` methods
    Companion,
    Interface,
    /// Runtime type whose layout lowering never touches
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodMetadata {
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default)]
    pub result: Type,
    /// The method's own type parameters, beyond the receiver's
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Set by the analyzer when the method needs specialization
    #[serde(default)]
    pub generic: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    /// Field names in declaration order
    #[serde(default)]
    pub fields: Vec<String>,
    /// Per field: true when stored in the immutable wrapper
    #[serde(default)]
    pub immut_flags: Vec<bool>,
    /// Per field: declared type, without the wrapper
    #[serde(default)]
    pub field_types: Vec<Type>,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, Type>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodMetadata>,
    /// Variant names of a sealed type, in declaration order
    #[serde(default)]
    pub variants: Vec<String>,
}

impl TypeMetadata {
    pub fn new(package: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn qualified_name(&self) -> String {
        qualify(&self.package, &self.name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Declared field type with any wrapper removed
    pub fn field_type(&self, name: &str) -> Option<Type> {
        let idx = self.field_index(name)?;
        self.field_types.get(idx).map(Type::strip_immutable)
    }

    /// Immutability flag of a field, `None` when the table has no entry
    pub fn field_immutable(&self, name: &str) -> Option<bool> {
        let idx = self.field_index(name)?;
        match self.immut_flags.get(idx) {
            Some(flag) => Some(*flag),
            None => self.field_types.get(idx).map(Type::is_immutable),
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.get(name)
    }

    pub fn is_sealed(&self) -> bool {
        self.kind == TypeKind::Sealed
    }

    /// The type applied to its own parameters: `Box[T]`
    pub fn self_type(&self, qualifier: &str) -> Type {
        Type::generic(
            Type::named(qualifier, self.name.clone()),
            self.type_params.iter().map(|p| Type::basic(p.clone())).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default)]
    pub result: Type,
    #[serde(default)]
    pub type_params: Vec<String>,
}

impl FunctionMetadata {
    pub fn qualified_name(&self) -> String {
        qualify(&self.package, &self.name)
    }
}

/// Companion object of a generic container: `Some` extracts from `Option`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanionObjectMetadata {
    pub package: String,
    pub name: String,
    /// Container type the companion constructs and deconstructs
    pub target: String,
    /// Container type-parameter positions the companion's own parameters map to
    #[serde(default)]
    pub extract_indices: Vec<usize>,
}

impl CompanionObjectMetadata {
    pub fn qualified_name(&self) -> String {
        qualify(&self.package, &self.name)
    }
}

// ============================================================================
// Import facade
// ============================================================================

/// Import resolution as seen by lowering
pub trait ImportResolver {
    /// True when `name` refers to an imported package (by alias or name)
    fn is_package(&self, name: &str) -> bool;
    /// True when the package's symbols are visible unqualified
    fn is_dot_imported(&self, package: &str) -> bool;
    /// Qualifier to use in emitted code for `package`
    fn alias_for(&self, package: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub package: String,
    pub path: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub dot: bool,
}

impl ImportEntry {
    /// Name the package goes by in source
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.package)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportTable {
    entries: Vec<ImportEntry>,
}

impl ImportTable {
    pub fn new(entries: Vec<ImportEntry>) -> Self {
        Self { entries }
    }

    pub fn add(&mut self, entry: ImportEntry) {
        if !self.entries.iter().any(|e| e.package == entry.package) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[ImportEntry] {
        &self.entries
    }

    /// Package a source qualifier (alias or package name) refers to
    pub fn resolve(&self, qualifier: &str) -> Option<&ImportEntry> {
        self.entries
            .iter()
            .find(|e| !e.dot && e.local_name() == qualifier)
    }

    pub fn entry(&self, package: &str) -> Option<&ImportEntry> {
        self.entries.iter().find(|e| e.package == package)
    }

    pub fn dot_imports(&self) -> impl Iterator<Item = &ImportEntry> {
        self.entries.iter().filter(|e| e.dot)
    }
}

impl ImportResolver for ImportTable {
    fn is_package(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    fn is_dot_imported(&self, package: &str) -> bool {
        self.entries.iter().any(|e| e.dot && e.package == package)
    }

    fn alias_for(&self, package: &str) -> Option<String> {
        self.entry(package).map(|e| {
            if e.dot {
                String::new()
            } else {
                e.local_name().to_string()
            }
        })
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Serialized form of the metadata tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFile {
    #[serde(default)]
    pub types: Vec<TypeMetadata>,
    #[serde(default)]
    pub functions: Vec<FunctionMetadata>,
    #[serde(default)]
    pub companions: Vec<CompanionObjectMetadata>,
    #[serde(default)]
    pub imports: Vec<ImportEntry>,
}

impl MetadataFile {
    /// Reject tables whose types break the type model
    pub fn validate(&self) -> Result<()> {
        for ty in &self.types {
            let owner = ty.qualified_name();
            let methods = ty.methods.iter().flat_map(|(name, m)| {
                m.params
                    .iter()
                    .chain(std::iter::once(&m.result))
                    .map(move |t| (name.as_str(), t))
            });
            let fields = ty.fields.iter().map(String::as_str).zip(&ty.field_types);
            let constraints = ty.constraints.iter().map(|(p, t)| (p.as_str(), t));
            for (member, t) in fields.chain(constraints).chain(methods) {
                check_type(&format!("{owner}.{member}"), t)?;
            }
        }
        for func in &self.functions {
            let owner = func.qualified_name();
            for t in func.params.iter().chain(std::iter::once(&func.result)) {
                check_type(&owner, t)?;
            }
        }
        Ok(())
    }
}

fn check_type(owner: &str, ty: &Type) -> Result<()> {
    ty.validate()
        .map_err(|e| CompileError::metadata_error(format!("`{owner}`: {e}")))
}

/// Read-only metadata shared by every lowering run
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    types: HashMap<String, TypeMetadata>,
    functions: HashMap<String, FunctionMetadata>,
    companions: HashMap<String, CompanionObjectMetadata>,
    pub imports: ImportTable,
}

impl Metadata {
    /// Empty tables plus the runtime prelude
    pub fn with_prelude(runtime: &str) -> Self {
        let mut metadata = Self::default();
        metadata.merge(prelude(runtime));
        metadata
    }

    /// Parse a metadata file and validate every type it declares
    pub fn from_json(text: &str) -> Result<MetadataFile> {
        let file: MetadataFile = serde_json::from_str(text)
            .map_err(|e| CompileError::metadata_error(format!("invalid metadata: {e}")))?;
        file.validate()?;
        Ok(file)
    }

    pub fn merge(&mut self, file: MetadataFile) {
        for ty in file.types {
            self.types.insert(ty.qualified_name(), ty);
        }
        for func in file.functions {
            self.functions.insert(func.qualified_name(), func);
        }
        for companion in file.companions {
            self.companions.insert(companion.qualified_name(), companion);
        }
        for entry in file.imports {
            self.imports.add(entry);
        }
    }

    pub fn add_type(&mut self, ty: TypeMetadata) {
        self.types.insert(ty.qualified_name(), ty);
    }

    pub fn add_function(&mut self, func: FunctionMetadata) {
        self.functions.insert(func.qualified_name(), func);
    }

    pub fn add_companion(&mut self, companion: CompanionObjectMetadata) {
        self.companions.insert(companion.qualified_name(), companion);
    }

    pub fn get_type(&self, package: &str, name: &str) -> Option<&TypeMetadata> {
        self.types.get(&qualify(package, name))
    }

    pub fn get_function(&self, package: &str, name: &str) -> Option<&FunctionMetadata> {
        self.functions.get(&qualify(package, name))
    }

    pub fn get_companion(&self, package: &str, name: &str) -> Option<&CompanionObjectMetadata> {
        self.companions.get(&qualify(package, name))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.values().map(|t| t.name.as_str())
    }

    /// Tables in serialized form, sorted by qualified name
    pub fn to_file(&self) -> MetadataFile {
        let mut types: Vec<TypeMetadata> = self.types.values().cloned().collect();
        types.sort_by_key(TypeMetadata::qualified_name);
        let mut functions: Vec<FunctionMetadata> = self.functions.values().cloned().collect();
        functions.sort_by_key(FunctionMetadata::qualified_name);
        let mut companions: Vec<CompanionObjectMetadata> =
            self.companions.values().cloned().collect();
        companions.sort_by_key(CompanionObjectMetadata::qualified_name);
        MetadataFile {
            types,
            functions,
            companions,
            imports: self.imports.entries().to_vec(),
        }
    }
}

pub fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}
