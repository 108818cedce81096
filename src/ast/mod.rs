//! The tree the front end hands over: declarations from the runtime header
//! and the user's headers, plus one entry per pipeline function.
//!
//! Pipeline bodies are restricted to declarations with single initializers,
//! (compound) assignments, arithmetic and comparisons, builtin constructions
//! and casts, intrinsic calls, member access and literals. Anything else
//! arrives as an `Unsupported` node naming the construct.

mod build;

pub use build::{AstBuilder, LocalVar};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::stage::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalId(pub u32);

// ─── Translation unit ──────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub file_name: String,
    /// Main file text, used only to render diagnostics.
    #[serde(default)]
    pub source: Option<String>,
    /// Every file the front end read, for dependency output.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub declarations: Vec<Declaration>,
    pub pipelines: Vec<PipelineFn>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclId,
    #[serde(default)]
    pub namespace: Vec<String>,
    pub kind: DeclKind,
    #[serde(default)]
    pub span: Span,
}

impl Declaration {
    pub fn name(&self) -> &str {
        match &self.kind {
            DeclKind::Record { name, .. }
            | DeclKind::ClassTemplate { name, .. }
            | DeclKind::Enum { name, .. }
            | DeclKind::Function { name }
            | DeclKind::Method { name, .. } => name,
        }
    }

    /// `ns::name` spelling.
    pub fn qualified_name(&self) -> String {
        let mut parts = self.namespace.clone();
        parts.push(self.name().to_string());
        parts.join("::")
    }

    pub fn in_namespace(&self, ns: &str) -> bool {
        self.namespace.iter().any(|n| n == ns)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DeclKind {
    Record {
        name: String,
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    ClassTemplate {
        name: String,
        #[serde(default)]
        specializations: Vec<Specialization>,
    },
    Enum {
        name: String,
        #[serde(default)]
        scoped: bool,
        #[serde(default)]
        enumerators: Vec<Enumerator>,
    },
    Function {
        name: String,
    },
    Method {
        record: String,
        name: String,
        #[serde(default)]
        params: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub span: Span,
}

/// One instantiation of a class template, e.g. `texture2d<float>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Specialization {
    pub arg: ScalarType,
    pub decl: DeclId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

/// Declaration lookup by identity.
pub struct DeclIndex<'a> {
    by_id: HashMap<DeclId, &'a Declaration>,
    specialized: HashMap<DeclId, (&'a Declaration, ScalarType)>,
}

impl<'a> DeclIndex<'a> {
    pub fn new(declarations: &'a [Declaration]) -> Self {
        let mut by_id = HashMap::new();
        let mut specialized = HashMap::new();
        for decl in declarations {
            by_id.insert(decl.id, decl);
            if let DeclKind::ClassTemplate { specializations, .. } = &decl.kind {
                for spec in specializations {
                    specialized.insert(spec.decl, (decl, spec.arg));
                }
            }
        }
        Self { by_id, specialized }
    }

    pub fn get(&self, id: DeclId) -> Option<&'a Declaration> {
        self.by_id.get(&id).copied()
    }

    /// Fields of a record type, `None` for anything that is not a record.
    pub fn record_fields(&self, ty: &Type) -> Option<&'a [FieldDecl]> {
        let Type::Decl(id) = ty else { return None };
        match &self.get(*id)?.kind {
            DeclKind::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }

    pub fn is_record(&self, ty: &Type) -> bool {
        self.record_fields(ty).is_some()
    }

    /// Spelling of a user type for host code.
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Scalar(s) => s.cxx_name().to_string(),
            Type::Decl(id) => {
                if let Some(decl) = self.get(*id) {
                    decl.qualified_name()
                } else if let Some((template, arg)) = self.specialized.get(id) {
                    format!("{}<{}>", template.qualified_name(), arg.cxx_name())
                } else {
                    format!("__decl{}", id.0)
                }
            }
        }
    }
}

// ─── Types ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int(u8),
    UInt(u8),
    Float,
    Double,
}

impl ScalarType {
    pub fn cxx_name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int(8) => "int8_t",
            ScalarType::Int(16) => "int16_t",
            ScalarType::Int(64) => "int64_t",
            ScalarType::Int(_) => "int",
            ScalarType::UInt(8) => "uint8_t",
            ScalarType::UInt(16) => "uint16_t",
            ScalarType::UInt(64) => "uint64_t",
            ScalarType::UInt(_) => "unsigned int",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Scalar(ScalarType),
    /// A record or template specialization declared by the front end.
    Decl(DeclId),
}

impl Type {
    pub const FLOAT: Type = Type::Scalar(ScalarType::Float);
    pub const INT: Type = Type::Scalar(ScalarType::Int(32));
    pub const UINT: Type = Type::Scalar(ScalarType::UInt(32));
    pub const BOOL: Type = Type::Scalar(ScalarType::Bool);

    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Type::Scalar(s) => Some(*s),
            _ => None,
        }
    }
}

// ─── Pipeline functions ────────────────────────────────────────────

/// Parameter role recognized from the parameter's attribute.
///
/// Indices are kept signed so out-of-range values survive until validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Captured,
    VertexBuffer { index: i64 },
    InstanceBuffer { index: i64 },
    VertexTexture { index: i64 },
    FragmentTexture { index: i64 },
    VaryingInput { stage: Stage },
    VaryingOutput { stage: Stage },
    Position,
    ColorTarget { index: i64 },
}

impl Role {
    /// Stage the parameter's value originates in.
    pub fn stage(&self) -> Stage {
        match self {
            Role::Captured => Stage::Host,
            Role::VertexBuffer { .. } | Role::InstanceBuffer { .. } => Stage::Vertex,
            Role::VertexTexture { .. } | Role::Position => Stage::Vertex,
            Role::FragmentTexture { .. } | Role::ColorTarget { .. } => Stage::Fragment,
            Role::VaryingInput { stage } | Role::VaryingOutput { stage } => *stage,
        }
    }

    /// Outputs are traced; they also make their stage active.
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            Role::Position | Role::ColorTarget { .. } | Role::VaryingOutput { .. }
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub role: Role,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineFn {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

// ─── Statements ────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StmtKind {
    Decl {
        local: LocalId,
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    Expr(Expr),
    Block(Vec<Stmt>),
    Null,
    Unsupported {
        construct: String,
    },
}

// ─── Expressions ───────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub ty: Type,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    /// An aggregate the front end folded at compile time.
    Constant(ConstValue),
    /// Index into the pipeline function's parameters.
    Param(usize),
    Local {
        local: LocalId,
        name: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Construction of `ty` from arguments.
    Construct(Vec<Expr>),
    /// Explicit conversion to `ty`.
    Cast(Box<Expr>),
    /// Braced initializer list of type `ty`.
    InitList(Vec<Expr>),
    Call {
        func: DeclId,
        args: Vec<Expr>,
    },
    MethodCall {
        method: DeclId,
        object: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
    },
    /// Synthesized reference to an interface record field.
    Interface(InterfaceRef),
    Unsupported {
        construct: String,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    fn same_value(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::UInt(a), Literal::UInt(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Struct(Vec<ConstValue>),
}

impl ConstValue {
    fn same_value(&self, other: &ConstValue) -> bool {
        match (self, other) {
            (ConstValue::Int(a), ConstValue::Int(b)) => a == b,
            (ConstValue::Float(a), ConstValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::Bool(a), ConstValue::Bool(b)) => a == b,
            (ConstValue::Struct(a), ConstValue::Struct(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Which side of an interface record a reference reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Written by the producing stage (`_to_<dest>.<field>`).
    Producer,
    /// Read by the consuming stage (`_from_<source>.<field>`).
    Consumer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceRef {
    pub source: Stage,
    pub dest: Stage,
    pub side: Side,
    pub field: usize,
}

impl InterfaceRef {
    /// Interface field names are unique per record: `_hv0`, `_vf3`, ...
    pub fn field_name(&self) -> String {
        field_name(self.source, self.dest, self.field)
    }
}

pub fn field_name(source: Stage, dest: Stage, index: usize) -> String {
    format!("_{}{}{}", source.initial(), dest.initial(), index)
}

impl Expr {
    /// Comparison-operand equivalence: equal shape and leaves, ignoring
    /// node identity and location.
    pub fn same_value(&self, other: &Expr) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ExprKind::Literal(a), ExprKind::Literal(b)) => a.same_value(b),
            (ExprKind::Constant(a), ExprKind::Constant(b)) => a.same_value(b),
            (ExprKind::Param(a), ExprKind::Param(b)) => a == b,
            (ExprKind::Local { local: a, .. }, ExprKind::Local { local: b, .. }) => a == b,
            (
                ExprKind::Binary { op: o1, lhs: l1, rhs: r1 },
                ExprKind::Binary { op: o2, lhs: l2, rhs: r2 },
            ) => o1 == o2 && l1.same_value(l2) && r1.same_value(r2),
            (
                ExprKind::Unary { op: o1, operand: a },
                ExprKind::Unary { op: o2, operand: b },
            ) => o1 == o2 && a.same_value(b),
            (ExprKind::Construct(a), ExprKind::Construct(b))
            | (ExprKind::InitList(a), ExprKind::InitList(b)) => all_same(a, b),
            (ExprKind::Cast(a), ExprKind::Cast(b)) => a.same_value(b),
            (
                ExprKind::Call { func: f1, args: a1 },
                ExprKind::Call { func: f2, args: a2 },
            ) => f1 == f2 && all_same(a1, a2),
            (
                ExprKind::MethodCall { method: m1, object: o1, args: a1 },
                ExprKind::MethodCall { method: m2, object: o2, args: a2 },
            ) => m1 == m2 && o1.same_value(o2) && all_same(a1, a2),
            (
                ExprKind::Member { base: b1, field: f1 },
                ExprKind::Member { base: b2, field: f2 },
            ) => f1 == f2 && b1.same_value(b2),
            (ExprKind::Interface(a), ExprKind::Interface(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_) | ExprKind::Constant(_))
    }
}

fn all_same(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
}
