//! Resource bookkeeping for one pipeline function: vertex attributes,
//! textures, samplers, color targets and the vertex input tables derived
//! from them.

use crate::ast::{ConstValue, Expr, ExprKind, FieldDecl, NodeId};
use crate::builtins::{ElemKind, TypeClass};
use crate::stage::{Stage, StageMask};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputRate {
    PerVertex,
    PerInstance,
}

impl InputRate {
    pub fn name(self) -> &'static str {
        match self {
            InputRate::PerVertex => "PerVertex",
            InputRate::PerInstance => "PerInstance",
        }
    }

    pub fn runtime_value(self) -> i64 {
        self as i64
    }
}

/// Vertex attribute formats understood by the runtime.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    R32_SFLOAT,
    RG32_SFLOAT,
    RGB32_SFLOAT,
    RGBA32_SFLOAT,
    R32_SINT,
    RG32_SINT,
    RGB32_SINT,
    RGBA32_SINT,
    R32_UINT,
    RG32_UINT,
    RGB32_UINT,
    RGBA32_UINT,
    R64_SFLOAT,
}

impl VertexFormat {
    pub const ALL: [VertexFormat; 13] = [
        VertexFormat::R32_SFLOAT,
        VertexFormat::RG32_SFLOAT,
        VertexFormat::RGB32_SFLOAT,
        VertexFormat::RGBA32_SFLOAT,
        VertexFormat::R32_SINT,
        VertexFormat::RG32_SINT,
        VertexFormat::RGB32_SINT,
        VertexFormat::RGBA32_SINT,
        VertexFormat::R32_UINT,
        VertexFormat::RG32_UINT,
        VertexFormat::RGB32_UINT,
        VertexFormat::RGBA32_UINT,
        VertexFormat::R64_SFLOAT,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VertexFormat::R32_SFLOAT => "R32_SFLOAT",
            VertexFormat::RG32_SFLOAT => "RG32_SFLOAT",
            VertexFormat::RGB32_SFLOAT => "RGB32_SFLOAT",
            VertexFormat::RGBA32_SFLOAT => "RGBA32_SFLOAT",
            VertexFormat::R32_SINT => "R32_SINT",
            VertexFormat::RG32_SINT => "RG32_SINT",
            VertexFormat::RGB32_SINT => "RGB32_SINT",
            VertexFormat::RGBA32_SINT => "RGBA32_SINT",
            VertexFormat::R32_UINT => "R32_UINT",
            VertexFormat::RG32_UINT => "RG32_UINT",
            VertexFormat::RGB32_UINT => "RGB32_UINT",
            VertexFormat::RGBA32_UINT => "RGBA32_UINT",
            VertexFormat::R64_SFLOAT => "R64_SFLOAT",
        }
    }

    pub fn runtime_value(self) -> i64 {
        self as i64
    }

    /// Format of a vector (or matrix column) with `width` components.
    pub fn vector(elem: ElemKind, width: u8) -> VertexFormat {
        use VertexFormat::*;
        const FLOAT: [VertexFormat; 4] = [R32_SFLOAT, RG32_SFLOAT, RGB32_SFLOAT, RGBA32_SFLOAT];
        const INT: [VertexFormat; 4] = [R32_SINT, RG32_SINT, RGB32_SINT, RGBA32_SINT];
        const UINT: [VertexFormat; 4] = [R32_UINT, RG32_UINT, RGB32_UINT, RGBA32_UINT];
        let row = match elem {
            ElemKind::Float => FLOAT,
            ElemKind::Int => INT,
            ElemKind::UInt => UINT,
        };
        row[(width.clamp(1, 4) - 1) as usize]
    }
}

/// A vertex or instance buffer parameter.
#[derive(Clone, Debug)]
pub struct AttributeRecord {
    pub param: usize,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub rate: InputRate,
    pub binding: u32,
}

/// A texture parameter.
#[derive(Clone, Debug)]
pub struct TextureRecord {
    pub param: usize,
    pub name: String,
    pub class: TypeClass,
    pub index: u32,
    pub stages: StageMask,
}

impl TextureRecord {
    pub fn elem(&self) -> ElemKind {
        match self.class {
            TypeClass::Texture { elem, .. } => elem,
            _ => ElemKind::Float,
        }
    }
}

/// Constant `{filter, wrap}` configuration of a sample call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerConfig {
    pub filter: u32,
    pub wrap: u32,
}

/// Why a sampler argument was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerArgError {
    NotConstant,
    Malformed,
}

impl SamplerConfig {
    pub const LINEAR: u32 = 0;
    pub const NEAREST: u32 = 1;
    pub const REPEAT: u32 = 0;
    pub const CLAMP: u32 = 1;

    pub fn from_expr(expr: &Expr) -> Result<SamplerConfig, SamplerArgError> {
        let ExprKind::Constant(value) = &expr.kind else {
            return Err(SamplerArgError::NotConstant);
        };
        let ConstValue::Struct(fields) = value else {
            return Err(SamplerArgError::Malformed);
        };
        let raw = |v: &ConstValue| match v {
            ConstValue::Int(i) => u32::try_from(*i).ok(),
            _ => None,
        };
        match fields.as_slice() {
            [filter, wrap] => match (raw(filter), raw(wrap)) {
                (Some(filter), Some(wrap)) => Ok(SamplerConfig { filter, wrap }),
                _ => Err(SamplerArgError::Malformed),
            },
            _ => Err(SamplerArgError::Malformed),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SamplerRecord {
    pub config: SamplerConfig,
    pub stages: StageMask,
}

#[derive(Clone, Debug)]
pub struct ColorTargetRecord {
    pub param: usize,
    pub name: String,
    pub index: u32,
}

/// Sampler assignment of one traced `sample` expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleCall {
    pub expr: NodeId,
    /// Position in the pipeline's texture list.
    pub texture: usize,
    pub sampler: usize,
    pub stage: Stage,
}

/// One entry of the vertex binding table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub rate: InputRate,
}

/// One entry of the vertex attribute table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeId, Type};
    use crate::span::Span;

    fn constant(value: ConstValue) -> Expr {
        Expr {
            id: NodeId(1),
            kind: ExprKind::Constant(value),
            ty: Type::Void,
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_sampler_config_from_constant() {
        let e = constant(ConstValue::Struct(vec![ConstValue::Int(1), ConstValue::Int(0)]));
        assert_eq!(
            SamplerConfig::from_expr(&e),
            Ok(SamplerConfig { filter: SamplerConfig::NEAREST, wrap: SamplerConfig::REPEAT })
        );
    }

    #[test]
    fn test_sampler_config_rejects_bad_shapes() {
        let three = constant(ConstValue::Struct(vec![
            ConstValue::Int(0),
            ConstValue::Int(0),
            ConstValue::Int(0),
        ]));
        assert_eq!(SamplerConfig::from_expr(&three), Err(SamplerArgError::Malformed));
        let negative = constant(ConstValue::Struct(vec![ConstValue::Int(-1), ConstValue::Int(0)]));
        assert_eq!(SamplerConfig::from_expr(&negative), Err(SamplerArgError::Malformed));
        let scalar = constant(ConstValue::Int(0));
        assert_eq!(SamplerConfig::from_expr(&scalar), Err(SamplerArgError::Malformed));
        let mut param = scalar.clone();
        param.kind = ExprKind::Param(0);
        assert_eq!(SamplerConfig::from_expr(&param), Err(SamplerArgError::NotConstant));
    }

    #[test]
    fn test_vector_formats() {
        assert_eq!(VertexFormat::vector(ElemKind::Float, 3), VertexFormat::RGB32_SFLOAT);
        assert_eq!(VertexFormat::vector(ElemKind::UInt, 1), VertexFormat::R32_UINT);
        assert_eq!(VertexFormat::RGBA32_SINT.name(), "RGBA32_SINT");
    }
}
