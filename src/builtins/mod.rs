//! Builtin catalog: maps front-end declarations to the runtime's vector,
//! matrix and texture types, intrinsic functions and intrinsic methods.
//!
//! The catalog is built once per run by scanning the declarations the front
//! end reported inside the `hsh` namespace. Lookups go through declaration
//! identity, so a user type that happens to be called `float4` is never
//! mistaken for the builtin.

mod table;

pub use table::{ElemKind, Spellings, TypeClass};

use std::collections::HashMap;

use crate::ast::{DeclId, DeclKind, Declaration, ScalarType, Type};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::target::SourceLanguage;

use self::table::{
    FunctionEntry, MethodEntry, RuntimeKind, TypeEntry, FUNCTIONS, METHODS, RUNTIME, TYPES,
};

const HSH_NAMESPACE: &str = "hsh";

// ─── Builtin handles ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinType(u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinFunction(u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinMethod(u16);

fn spelling(spellings: &Spellings, lang: SourceLanguage) -> &'static str {
    match lang {
        SourceLanguage::Glsl => spellings.glsl,
        SourceLanguage::Hlsl => spellings.hlsl,
        SourceLanguage::Metal => spellings.metal,
    }
}

impl BuiltinType {
    /// Every builtin type, in catalog order.
    pub fn values() -> impl Iterator<Item = BuiltinType> {
        (0..TYPES.len() as u16).map(BuiltinType)
    }

    /// Look up a vector or matrix type by its runtime name.
    pub fn named(name: &str) -> Option<BuiltinType> {
        TYPES
            .iter()
            .position(|e| e.name == name && !matches!(e.class, TypeClass::Texture { .. }))
            .map(|i| BuiltinType(i as u16))
    }

    pub fn texture(template: &str, elem: ElemKind) -> Option<BuiltinType> {
        TYPES
            .iter()
            .position(|e| {
                e.name == template
                    && matches!(e.class, TypeClass::Texture { elem: el, .. } if el == elem)
            })
            .map(|i| BuiltinType(i as u16))
    }

    fn entry(self) -> &'static TypeEntry {
        &TYPES[self.0 as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn class(self) -> TypeClass {
        self.entry().class
    }

    pub fn spelling(self, lang: SourceLanguage) -> &'static str {
        spelling(&self.entry().spellings, lang)
    }

    pub fn is_vector(self) -> bool {
        matches!(self.class(), TypeClass::Vector { .. })
    }

    pub fn is_matrix(self) -> bool {
        matches!(self.class(), TypeClass::Matrix { .. })
    }

    pub fn is_texture(self) -> bool {
        matches!(self.class(), TypeClass::Texture { .. })
    }

    /// Rows of a matrix type; each row is one vertex attribute slot.
    pub fn matrix_rows(self) -> Option<u8> {
        match self.class() {
            TypeClass::Matrix { dim } => Some(dim),
            _ => None,
        }
    }
}

impl BuiltinFunction {
    fn entry(self) -> &'static FunctionEntry {
        &FUNCTIONS[self.0 as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn is_interp_distributed(self) -> bool {
        self.entry().interp_distributed
    }

    pub fn spelling(self, lang: SourceLanguage) -> &'static str {
        spelling(&self.entry().spellings, lang)
    }
}

impl BuiltinMethod {
    fn entry(self) -> &'static MethodEntry {
        &METHODS[self.0 as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn record(self) -> &'static str {
        self.entry().record
    }

    pub fn is_swizzle(self) -> bool {
        self.entry().is_swizzle
    }

    pub fn is_sample(self) -> bool {
        !self.is_swizzle() && self.entry().name == "sample"
    }

    pub fn spelling(self, lang: SourceLanguage) -> &'static str {
        spelling(&self.entry().spellings, lang)
    }
}

// ─── Field type compatibility ──────────────────────────────────────

/// Why a type cannot live in an interface or vertex buffer record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldTypeError {
    IntegerWidth,
    Unsupported,
}

impl FieldTypeError {
    pub fn message(self) -> &'static str {
        match self {
            FieldTypeError::IntegerWidth => "integers must be 32-bits in length",
            FieldTypeError::Unsupported => {
                "hsh record fields must be a builtin hsh vector or matrix, float, double, or 32-bit integer"
            }
        }
    }
}

// ─── Catalog ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct RuntimeEnum {
    /// Qualification prepended to enumerator names.
    prefix: String,
    enumerators: Vec<(String, i64)>,
}

/// Read-only builtin lookup, shared by every pipeline function of a run.
#[derive(Clone, Debug)]
pub struct Catalog {
    types: HashMap<DeclId, BuiltinType>,
    functions: HashMap<DeclId, BuiltinFunction>,
    methods: HashMap<DeclId, BuiltinMethod>,
    enums: HashMap<&'static str, RuntimeEnum>,
    runtime_names: HashMap<&'static str, String>,
}

impl Catalog {
    /// Scan front-end declarations; every missing builtin is reported.
    pub fn build(declarations: &[Declaration]) -> Result<Catalog, Vec<Diagnostic>> {
        let hsh: Vec<&Declaration> = declarations
            .iter()
            .filter(|d| d.in_namespace(HSH_NAMESPACE))
            .collect();
        let mut catalog = Catalog {
            types: HashMap::new(),
            functions: HashMap::new(),
            methods: HashMap::new(),
            enums: HashMap::new(),
            runtime_names: HashMap::new(),
        };
        let mut errors = Vec::new();

        catalog.find_types(&hsh, &mut errors);
        catalog.find_functions(&hsh, &mut errors);
        catalog.find_methods(&hsh, &mut errors);
        catalog.find_runtime(&hsh, &mut errors);

        if errors.is_empty() {
            log::debug!(
                "builtin catalog: {} types, {} functions, {} methods",
                catalog.types.len(),
                catalog.functions.len(),
                catalog.methods.len()
            );
            Ok(catalog)
        } else {
            Err(errors)
        }
    }

    fn find_types(&mut self, hsh: &[&Declaration], errors: &mut Vec<Diagnostic>) {
        for (index, entry) in TYPES.iter().enumerate() {
            let builtin = BuiltinType(index as u16);
            match entry.class {
                TypeClass::Texture { elem, .. } => {
                    let template = hsh.iter().find_map(|d| match &d.kind {
                        DeclKind::ClassTemplate { name, specializations } if name == entry.name => {
                            Some(specializations)
                        }
                        _ => None,
                    });
                    let Some(specializations) = template else {
                        // Report each template once, on its float row.
                        if elem == ElemKind::Float {
                            errors.push(missing("class template", entry.name));
                        }
                        continue;
                    };
                    for spec in specializations {
                        if texture_elem(spec.arg) == Some(elem) {
                            self.types.insert(spec.decl, builtin);
                        }
                    }
                }
                _ => {
                    let found = hsh.iter().find(|d| {
                        matches!(&d.kind, DeclKind::Record { name, .. } if name == entry.name)
                    });
                    match found {
                        Some(decl) => {
                            self.types.insert(decl.id, builtin);
                        }
                        None => errors.push(missing("class", entry.name)),
                    }
                }
            }
        }
    }

    fn find_functions(&mut self, hsh: &[&Declaration], errors: &mut Vec<Diagnostic>) {
        for (index, entry) in FUNCTIONS.iter().enumerate() {
            let found = hsh.iter().filter(|d| {
                matches!(&d.kind, DeclKind::Function { name } if name == entry.name)
            });
            let mut any = false;
            // Overloads share one builtin.
            for decl in found {
                self.functions.insert(decl.id, BuiltinFunction(index as u16));
                any = true;
            }
            if !any {
                errors.push(missing("function", entry.name));
            }
        }
    }

    fn find_methods(&mut self, hsh: &[&Declaration], errors: &mut Vec<Diagnostic>) {
        for (index, entry) in METHODS.iter().enumerate() {
            let found = hsh.iter().find(|d| match &d.kind {
                DeclKind::Method { record, name, params } => {
                    record == entry.record
                        && name == entry.name
                        && params.iter().map(String::as_str).eq(entry.params.iter().copied())
                }
                _ => false,
            });
            match found {
                Some(decl) => {
                    self.methods.insert(decl.id, BuiltinMethod(index as u16));
                }
                None => errors.push(missing(
                    "method",
                    &format!("{}::{}({})", entry.record, entry.name, entry.params.join(", ")),
                )),
            }
        }
    }

    fn find_runtime(&mut self, hsh: &[&Declaration], errors: &mut Vec<Diagnostic>) {
        for entry in RUNTIME {
            let found = hsh.iter().find(|d| match (&d.kind, entry.kind) {
                (DeclKind::Record { name, .. }, RuntimeKind::Record)
                | (DeclKind::ClassTemplate { name, .. }, RuntimeKind::ClassTemplate)
                | (DeclKind::Enum { name, .. }, RuntimeKind::Enum) => name == entry.name,
                (DeclKind::Method { record, name, .. }, RuntimeKind::Method { record: r }) => {
                    name == entry.name && record == r
                }
                _ => false,
            });
            let Some(decl) = found else {
                let kind = match entry.kind {
                    RuntimeKind::Record => "class",
                    RuntimeKind::ClassTemplate => "class template",
                    RuntimeKind::Enum => "enum",
                    RuntimeKind::Method { .. } => "method",
                };
                errors.push(missing(kind, entry.name));
                continue;
            };
            if let DeclKind::Enum { scoped, enumerators, .. } = &decl.kind {
                let prefix = if *scoped {
                    decl.qualified_name()
                } else {
                    decl.namespace.join("::")
                };
                self.enums.insert(
                    entry.name,
                    RuntimeEnum {
                        prefix,
                        enumerators: enumerators.iter().map(|e| (e.name.clone(), e.value)).collect(),
                    },
                );
            }
            self.runtime_names.insert(entry.name, decl.qualified_name());
        }
    }

    // ── Lookup ──

    pub fn identify_type(&self, ty: &Type) -> Option<BuiltinType> {
        match ty {
            Type::Decl(id) => self.types.get(id).copied(),
            _ => None,
        }
    }

    pub fn identify_function(&self, id: DeclId) -> Option<BuiltinFunction> {
        self.functions.get(&id).copied()
    }

    pub fn identify_method(&self, id: DeclId) -> Option<BuiltinMethod> {
        self.methods.get(&id).copied()
    }

    pub fn is_matrix(&self, ty: &Type) -> bool {
        self.identify_type(ty).is_some_and(BuiltinType::is_matrix)
    }

    /// Types a traced reference may have: builtins, 32-bit integers, float, double.
    pub fn is_value_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Scalar(ScalarType::Int(32) | ScalarType::UInt(32)) => true,
            Type::Scalar(ScalarType::Float | ScalarType::Double) => true,
            _ => self.identify_type(ty).is_some(),
        }
    }

    /// Whether a value of this type may be stored in a record field.
    pub fn check_field_type(&self, ty: &Type) -> Result<(), FieldTypeError> {
        match ty {
            Type::Scalar(ScalarType::Int(bits) | ScalarType::UInt(bits)) => {
                if *bits == 32 {
                    Ok(())
                } else {
                    Err(FieldTypeError::IntegerWidth)
                }
            }
            Type::Scalar(ScalarType::Float | ScalarType::Double) => Ok(()),
            _ => match self.identify_type(ty) {
                Some(builtin) if !builtin.is_texture() => Ok(()),
                _ => Err(FieldTypeError::Unsupported),
            },
        }
    }

    /// Qualified spelling of a runtime enumerator, e.g. `hsh::Target::GLSL`.
    pub fn enumerator(&self, enum_name: &str, value: i64) -> Option<String> {
        let e = self.enums.get(enum_name)?;
        let (name, _) = e.enumerators.iter().find(|(_, v)| *v == value)?;
        if e.prefix.is_empty() {
            Some(name.clone())
        } else {
            Some(format!("{}::{}", e.prefix, name))
        }
    }

    /// Qualified spelling of a runtime declaration, e.g. `hsh::_HshBase`.
    pub fn runtime_name(&self, name: &str) -> String {
        self.runtime_names
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("{}::{}", HSH_NAMESPACE, name))
    }
}

fn texture_elem(arg: ScalarType) -> Option<ElemKind> {
    match arg {
        ScalarType::Float => Some(ElemKind::Float),
        ScalarType::Int(32) => Some(ElemKind::Int),
        ScalarType::UInt(32) => Some(ElemKind::UInt),
        _ => None,
    }
}

fn missing(kind: &str, name: &str) -> Diagnostic {
    Diagnostic::error(
        format!(
            "unable to locate declaration of builtin {} {}; is hsh.h included?",
            kind, name
        ),
        crate::span::Span::dummy(),
    )
    .with_kind(ErrorKind::Catalog)
}

/// Names the runtime header must declare, with the declaration kind expected.
pub(crate) mod required {
    pub use super::table::{RuntimeKind, FUNCTIONS, METHODS, RUNTIME, TYPES};
}

#[cfg(test)]
mod tests;
