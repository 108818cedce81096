//! Byte layout of vertex buffer records.
//!
//! Matches the runtime's vector types: 32-bit scalars are 4 bytes,
//! two-component vectors 8, three- and four-component vectors 16 (aligned
//! to 16), and a matrix is one 16-byte column per row. Every matrix column
//! is a separate attribute slot.

use crate::ast::{FieldDecl, ScalarType, Type};
use crate::builtins::{Catalog, ElemKind, TypeClass};

use super::resources::{AttributeRecord, VertexAttribute, VertexBinding, VertexFormat};

/// Size, alignment and attribute slots of one field type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FieldLayout {
    pub size: u32,
    pub align: u32,
    /// (offset within the field, format) per attribute slot.
    pub slots: Vec<(u32, VertexFormat)>,
}

pub(crate) fn field_layout(catalog: &Catalog, ty: &Type) -> Option<FieldLayout> {
    let single = |size: u32, align: u32, format: VertexFormat| FieldLayout {
        size,
        align,
        slots: vec![(0, format)],
    };
    match ty {
        Type::Scalar(ScalarType::Float) => Some(single(4, 4, VertexFormat::R32_SFLOAT)),
        Type::Scalar(ScalarType::Int(32)) => Some(single(4, 4, VertexFormat::R32_SINT)),
        Type::Scalar(ScalarType::UInt(32)) => Some(single(4, 4, VertexFormat::R32_UINT)),
        Type::Scalar(ScalarType::Double) => Some(single(8, 8, VertexFormat::R64_SFLOAT)),
        _ => match catalog.identify_type(ty)?.class() {
            TypeClass::Vector { elem, width } => {
                let (size, align) = if width == 2 { (8, 8) } else { (16, 16) };
                Some(single(size, align, VertexFormat::vector(elem, width)))
            }
            TypeClass::Matrix { dim } => {
                let format = VertexFormat::vector(ElemKind::Float, dim);
                Some(FieldLayout {
                    size: 16 * dim as u32,
                    align: 16,
                    slots: (0..dim as u32).map(|row| (row * 16, format)).collect(),
                })
            }
            TypeClass::Texture { .. } => None,
        },
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Offsets of every field plus the record stride.
pub(crate) fn record_layout(catalog: &Catalog, fields: &[FieldDecl]) -> (Vec<(u32, FieldLayout)>, u32) {
    let mut offset = 0;
    let mut max_align = 1;
    let mut placed = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(layout) = field_layout(catalog, &field.ty) else {
            continue;
        };
        offset = align_up(offset, layout.align);
        max_align = max_align.max(layout.align);
        let size = layout.size;
        placed.push((offset, layout));
        offset += size;
    }
    (placed, align_up(offset, max_align))
}

/// Flatten attribute records into the binding and attribute tables.
pub(crate) fn vertex_tables(
    catalog: &Catalog,
    attributes: &[AttributeRecord],
) -> (Vec<VertexBinding>, Vec<VertexAttribute>) {
    let mut bindings = Vec::with_capacity(attributes.len());
    let mut flattened = Vec::new();
    for record in attributes {
        let (fields, stride) = record_layout(catalog, &record.fields);
        bindings.push(VertexBinding {
            binding: record.binding,
            stride,
            rate: record.rate,
        });
        for (offset, layout) in fields {
            for (slot_offset, format) in layout.slots {
                flattened.push(VertexAttribute {
                    binding: record.binding,
                    format,
                    offset: offset + slot_offset,
                });
            }
        }
    }
    (bindings, flattened)
}

/// Attribute slots a field type occupies: 1, or the row count of a matrix.
pub(crate) fn slot_count(catalog: &Catalog, ty: &Type) -> u32 {
    field_layout(catalog, ty).map_or(1, |l| l.slots.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::span::Span;
    use crate::stages::InputRate;

    fn field(name: &str, ty: Type) -> FieldDecl {
        FieldDecl { name: name.into(), ty, span: Span::dummy() }
    }

    #[test]
    fn test_matrix_field_takes_one_slot_per_row() {
        let mut b = AstBuilder::with_runtime();
        let catalog = Catalog::build(b.declarations()).unwrap();
        let record = AttributeRecord {
            param: 0,
            name: "inst".into(),
            fields: vec![
                field("position", b.ty("float3")),
                field("model", b.ty("float4x4")),
                field("normal", b.ty("float3x3")),
                field("weight", Type::FLOAT),
            ],
            rate: InputRate::PerInstance,
            binding: 2,
        };
        let (bindings, attributes) = vertex_tables(&catalog, &[record]);
        assert_eq!(attributes.len(), 1 + 4 + 3 + 1);
        assert_eq!(bindings[0].binding, 2);
        assert_eq!(bindings[0].rate, InputRate::PerInstance);
        // float3 @0, float4x4 @16..80, float3x3 @80..128, float @128, stride 144
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 16);
        assert_eq!(attributes[4].offset, 64);
        assert_eq!(attributes[5].format, VertexFormat::RGB32_SFLOAT);
        assert_eq!(attributes[5].offset, 80);
        assert_eq!(attributes[8].offset, 128);
        assert_eq!(bindings[0].stride, 144);
    }

    #[test]
    fn test_slot_counts() {
        let mut b = AstBuilder::with_runtime();
        let catalog = Catalog::build(b.declarations()).unwrap();
        assert_eq!(slot_count(&catalog, &b.ty("float4x4")), 4);
        assert_eq!(slot_count(&catalog, &b.ty("float3x3")), 3);
        assert_eq!(slot_count(&catalog, &b.ty("float2")), 1);
        assert_eq!(slot_count(&catalog, &Type::INT), 1);
    }
}
