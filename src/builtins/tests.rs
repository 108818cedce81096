//! Builtin catalog unit tests.

use super::*;
use crate::ast::{AstBuilder, DeclKind};

fn catalog() -> (AstBuilder, Catalog) {
    let b = AstBuilder::with_runtime();
    let catalog = Catalog::build(b.declarations()).expect("runtime declarations are complete");
    (b, catalog)
}

#[test]
fn test_builds_from_runtime_declarations() {
    let (mut b, catalog) = catalog();
    let float4 = catalog.identify_type(&b.ty("float4")).unwrap();
    assert_eq!(float4.name(), "float4");
    assert_eq!(float4.spelling(SourceLanguage::Glsl), "vec4");
    assert_eq!(float4.spelling(SourceLanguage::Hlsl), "float4");
    assert!(float4.is_vector());

    let mat = catalog.identify_type(&b.ty("float3x3")).unwrap();
    assert_eq!(mat.matrix_rows(), Some(3));
    assert_eq!(mat.spelling(SourceLanguage::Glsl), "mat3");
}

#[test]
fn test_texture_specializations_are_distinct() {
    let (mut b, catalog) = catalog();
    let float_tex = catalog.identify_type(&b.ty("texture2d<float>")).unwrap();
    let uint_tex = catalog.identify_type(&b.ty("texture2d<uint>")).unwrap();
    assert_ne!(float_tex, uint_tex);
    assert_eq!(float_tex.spelling(SourceLanguage::Glsl), "sampler2D");
    assert_eq!(uint_tex.spelling(SourceLanguage::Glsl), "usampler2D");
    assert_eq!(
        catalog.identify_type(&b.ty("texture2d_array<int>")).unwrap().spelling(SourceLanguage::Metal),
        "texture2d_array<int>"
    );
    assert!(catalog.check_field_type(&b.ty("texture2d<float>")).is_err());
}

#[test]
fn test_missing_runtime_is_reported_per_declaration() {
    let errors = Catalog::build(&[]).unwrap_err();
    // 11 vector/matrix types, 2 texture templates, every function and method,
    // every runtime declaration.
    let expected = 11 + 2 + FUNCTIONS.len() + METHODS.len() + RUNTIME.len();
    assert_eq!(errors.len(), expected);
    assert!(errors.iter().all(|e| e.kind == Some(ErrorKind::Catalog)));
    assert!(errors
        .iter()
        .any(|e| e.message == "unable to locate declaration of builtin class float4; is hsh.h included?"));
    assert!(errors
        .iter()
        .any(|e| e.message.contains("builtin enum _HshFormat")));
}

#[test]
fn test_user_record_named_like_builtin_is_not_builtin() {
    let mut b = AstBuilder::with_runtime();
    // Shadow the builder's spelling with a user record outside `hsh`.
    let user = b.record("float4", &[("x", Type::FLOAT)]);
    let catalog = Catalog::build(b.declarations()).unwrap();
    assert!(catalog.identify_type(&user).is_none());
    assert!(!catalog.is_value_type(&user));
}

#[test]
fn test_functions_and_methods_by_identity() {
    let (b, catalog) = catalog();
    let mut mix = None;
    let mut sample = None;
    for decl in b.declarations() {
        match &decl.kind {
            DeclKind::Function { name } if name == "mix" => mix = Some(decl.id),
            DeclKind::Method { record, name, .. } if record == "texture2d" && name == "sample" => {
                sample = Some(decl.id)
            }
            _ => {}
        }
    }
    let mix = catalog.identify_function(mix.unwrap()).unwrap();
    assert!(mix.is_interp_distributed());
    assert_eq!(mix.spelling(SourceLanguage::Hlsl), "lerp");

    let sample = catalog.identify_method(sample.unwrap()).unwrap();
    assert!(sample.is_sample());
    assert!(!sample.is_swizzle());
    assert_eq!(sample.spelling(SourceLanguage::Hlsl), "Sample");
}

#[test]
fn test_field_type_checks() {
    let (mut b, catalog) = catalog();
    assert!(catalog.check_field_type(&Type::FLOAT).is_ok());
    assert!(catalog.check_field_type(&Type::UINT).is_ok());
    assert_eq!(
        catalog.check_field_type(&Type::Scalar(ScalarType::Int(16))),
        Err(FieldTypeError::IntegerWidth)
    );
    assert_eq!(catalog.check_field_type(&Type::BOOL), Err(FieldTypeError::Unsupported));
    assert!(catalog.check_field_type(&b.ty("float4x4")).is_ok());
}

#[test]
fn test_enumerator_spellings() {
    let (_, catalog) = catalog();
    assert_eq!(catalog.enumerator("Target", 0).as_deref(), Some("hsh::Target::GLSL"));
    assert_eq!(catalog.enumerator("Stage", 4).as_deref(), Some("hsh::Stage::Fragment"));
    assert_eq!(catalog.enumerator("_HshInputRate", 0).as_deref(), Some("hsh::PerVertex"));
    assert_eq!(
        catalog.enumerator("_HshFormat", 2).as_deref(),
        Some("hsh::RGB32_SFLOAT")
    );
    assert!(catalog.enumerator("Stage", 9).is_none());
    assert_eq!(catalog.runtime_name("_HshBase"), "hsh::_HshBase");
}
