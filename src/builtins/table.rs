//! Declarative data for every builtin the runtime header provides.
//!
//! Row order is the identity of a builtin: `BuiltinType(3)` is `TYPES[3]`.

/// Per-language spellings of one builtin.
#[derive(Clone, Copy, Debug)]
pub struct Spellings {
    pub glsl: &'static str,
    pub hlsl: &'static str,
    pub metal: &'static str,
}

const fn sp(glsl: &'static str, hlsl: &'static str, metal: &'static str) -> Spellings {
    Spellings { glsl, hlsl, metal }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemKind {
    Float,
    Int,
    UInt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeClass {
    Vector { elem: ElemKind, width: u8 },
    /// Square float matrix of `dim` columns and rows.
    Matrix { dim: u8 },
    Texture { elem: ElemKind, array: bool },
}

#[derive(Debug)]
pub struct TypeEntry {
    /// Record name, or the class template name for textures.
    pub name: &'static str,
    pub class: TypeClass,
    pub spellings: Spellings,
}

#[derive(Debug)]
pub struct FunctionEntry {
    pub name: &'static str,
    /// Safe to evaluate per stage output and interpolate the result.
    pub interp_distributed: bool,
    pub spellings: Spellings,
}

#[derive(Debug)]
pub struct MethodEntry {
    pub record: &'static str,
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub is_swizzle: bool,
    pub spellings: Spellings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeKind {
    Record,
    ClassTemplate,
    Enum,
    Method { record: &'static str },
}

#[derive(Debug)]
pub struct RuntimeEntry {
    pub name: &'static str,
    pub kind: RuntimeKind,
}

macro_rules! vector {
    ($name:literal, $elem:ident, $width:literal, $glsl:literal, $metal:literal) => {
        TypeEntry {
            name: $name,
            class: TypeClass::Vector { elem: ElemKind::$elem, width: $width },
            spellings: sp($glsl, $name, $metal),
        }
    };
}

pub static TYPES: &[TypeEntry] = &[
    vector!("float2", Float, 2, "vec2", "float2"),
    vector!("float3", Float, 3, "vec3", "float3"),
    vector!("float4", Float, 4, "vec4", "float4"),
    vector!("int2", Int, 2, "ivec2", "int2"),
    vector!("int3", Int, 3, "ivec3", "int3"),
    vector!("int4", Int, 4, "ivec4", "int4"),
    vector!("uint2", UInt, 2, "uvec2", "uint2"),
    vector!("uint3", UInt, 3, "uvec3", "uint3"),
    vector!("uint4", UInt, 4, "uvec4", "uint4"),
    TypeEntry {
        name: "float3x3",
        class: TypeClass::Matrix { dim: 3 },
        spellings: sp("mat3", "float3x3", "float3x3"),
    },
    TypeEntry {
        name: "float4x4",
        class: TypeClass::Matrix { dim: 4 },
        spellings: sp("mat4", "float4x4", "float4x4"),
    },
    TypeEntry {
        name: "texture2d",
        class: TypeClass::Texture { elem: ElemKind::Float, array: false },
        spellings: sp("sampler2D", "Texture2D<float4>", "texture2d<float>"),
    },
    TypeEntry {
        name: "texture2d",
        class: TypeClass::Texture { elem: ElemKind::Int, array: false },
        spellings: sp("isampler2D", "Texture2D<int4>", "texture2d<int>"),
    },
    TypeEntry {
        name: "texture2d",
        class: TypeClass::Texture { elem: ElemKind::UInt, array: false },
        spellings: sp("usampler2D", "Texture2D<uint4>", "texture2d<uint>"),
    },
    TypeEntry {
        name: "texture2d_array",
        class: TypeClass::Texture { elem: ElemKind::Float, array: true },
        spellings: sp("sampler2DArray", "Texture2DArray<float4>", "texture2d_array<float>"),
    },
    TypeEntry {
        name: "texture2d_array",
        class: TypeClass::Texture { elem: ElemKind::Int, array: true },
        spellings: sp("isampler2DArray", "Texture2DArray<int4>", "texture2d_array<int>"),
    },
    TypeEntry {
        name: "texture2d_array",
        class: TypeClass::Texture { elem: ElemKind::UInt, array: true },
        spellings: sp("usampler2DArray", "Texture2DArray<uint4>", "texture2d_array<uint>"),
    },
];

macro_rules! function {
    ($name:literal, $dist:literal) => {
        FunctionEntry {
            name: $name,
            interp_distributed: $dist,
            spellings: sp($name, $name, $name),
        }
    };
    ($name:literal, $dist:literal, $glsl:literal, $hlsl:literal, $metal:literal) => {
        FunctionEntry {
            name: $name,
            interp_distributed: $dist,
            spellings: sp($glsl, $hlsl, $metal),
        }
    };
}

pub static FUNCTIONS: &[FunctionEntry] = &[
    function!("dot", false),
    function!("cross", false),
    function!("normalize", false),
    function!("length", false),
    function!("distance", false),
    function!("reflect", false),
    function!("pow", false),
    function!("sqrt", false),
    function!("abs", true),
    function!("min", true),
    function!("max", true),
    function!("clamp", true),
    function!("mix", true, "mix", "lerp", "mix"),
    function!("floor", true),
    function!("ceil", true),
    function!("fract", true, "fract", "frac", "fract"),
];

macro_rules! swizzle {
    ($record:literal, $name:literal) => {
        MethodEntry {
            record: $record,
            name: $name,
            params: &[],
            is_swizzle: true,
            spellings: sp($name, $name, $name),
        }
    };
}

pub static METHODS: &[MethodEntry] = &[
    MethodEntry {
        record: "texture2d",
        name: "sample",
        params: &["float2", "sampler"],
        is_swizzle: false,
        spellings: sp("texture", "Sample", "sample"),
    },
    MethodEntry {
        record: "texture2d_array",
        name: "sample",
        params: &["float3", "sampler"],
        is_swizzle: false,
        spellings: sp("texture", "Sample", "sample"),
    },
    swizzle!("float4", "xy"),
    swizzle!("float4", "xyz"),
    swizzle!("float4", "zw"),
    swizzle!("float4", "x"),
    swizzle!("float4", "y"),
    swizzle!("float4", "z"),
    swizzle!("float4", "w"),
    swizzle!("float3", "xy"),
    swizzle!("float3", "x"),
    swizzle!("float3", "y"),
    swizzle!("float3", "z"),
    swizzle!("float2", "x"),
    swizzle!("float2", "y"),
];

/// Runtime declarations the generated header refers to.
pub static RUNTIME: &[RuntimeEntry] = &[
    RuntimeEntry { name: "_HshBase", kind: RuntimeKind::ClassTemplate },
    RuntimeEntry { name: "push_uniform", kind: RuntimeKind::Method { record: "_HshBase" } },
    RuntimeEntry { name: "Target", kind: RuntimeKind::Enum },
    RuntimeEntry { name: "Stage", kind: RuntimeKind::Enum },
    RuntimeEntry { name: "_HshInputRate", kind: RuntimeKind::Enum },
    RuntimeEntry { name: "_HshFormat", kind: RuntimeKind::Enum },
    RuntimeEntry { name: "_HshShaderData", kind: RuntimeKind::ClassTemplate },
    RuntimeEntry { name: "_HshGlobalListNode", kind: RuntimeKind::Record },
];
