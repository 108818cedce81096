use crate::ast::{field_name, Expr, NodeId, Type};
use crate::stage::Stage;

/// One field of an interface record, keyed by the value it carries.
#[derive(Clone, Debug)]
pub struct InterfaceField {
    pub key: Expr,
    /// Statements holding the assignments that reach the locals `key`
    /// reads, sorted. The same locals after a reassignment are another value.
    pub reaching: Vec<NodeId>,
    pub name: String,
    pub ty: Type,
}

/// Data carried from `source` (the host or an earlier stage) to `dest`.
///
/// Host records become uniform blocks, stage records become varyings.
/// Fields are appended in first-use order and never removed.
#[derive(Clone, Debug)]
pub struct InterfaceRecord {
    pub source: Stage,
    pub dest: Stage,
    fields: Vec<InterfaceField>,
    frozen: bool,
}

impl InterfaceRecord {
    pub fn new(source: Stage, dest: Stage) -> Self {
        Self {
            source,
            dest,
            fields: Vec::new(),
            frozen: false,
        }
    }

    /// Type name, e.g. `host_to_vertex`.
    pub fn name(&self) -> String {
        format!("{}_to_{}", self.source.name(), self.dest.name())
    }

    /// Variable the producing side writes through, e.g. `_to_vertex`.
    pub fn producer_var(&self) -> String {
        format!("_to_{}", self.dest.name())
    }

    /// Variable the consuming side reads through, e.g. `_from_host`.
    pub fn consumer_var(&self) -> String {
        format!("_from_{}", self.source.name())
    }

    pub fn fields(&self) -> &[InterfaceField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn find_field(&self, expr: &Expr, reaching: &[NodeId]) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.reaching == reaching && f.key.same_value(expr))
    }

    /// Index of the field carrying `expr` as seen through the `reaching`
    /// assignments, and whether it was just created.
    pub fn create_or_find_field(&mut self, expr: &Expr, reaching: &[NodeId]) -> (usize, bool) {
        if let Some(index) = self.find_field(expr, reaching) {
            return (index, false);
        }
        debug_assert!(!self.frozen, "{} is already finalized", self.name());
        let index = self.fields.len();
        self.fields.push(InterfaceField {
            key: expr.clone(),
            reaching: reaching.to_vec(),
            name: field_name(self.source, self.dest, index),
            ty: expr.ty,
        });
        (index, true)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, Literal, LocalId};
    use crate::span::Span;

    fn param(id: u32, index: usize) -> Expr {
        Expr {
            id: NodeId(id),
            kind: ExprKind::Param(index),
            ty: Type::FLOAT,
            span: Span::dummy(),
        }
    }

    #[test]
    fn test_field_lookup_is_idempotent() {
        let mut record = InterfaceRecord::new(Stage::Host, Stage::Vertex);
        let (first, created) = record.create_or_find_field(&param(1, 0), &[]);
        assert!(created);
        // Same value through a different node.
        let (second, created) = record.create_or_find_field(&param(7, 0), &[]);
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(record.fields().len(), 1);
        assert_eq!(record.fields()[0].name, "_hv0");
    }

    #[test]
    fn test_distinct_values_get_distinct_names() {
        let mut record = InterfaceRecord::new(Stage::Vertex, Stage::Fragment);
        record.create_or_find_field(&param(1, 0), &[]);
        let literal = Expr {
            id: NodeId(2),
            kind: ExprKind::Literal(Literal::Float(0.5)),
            ty: Type::FLOAT,
            span: Span::dummy(),
        };
        let (index, _) = record.create_or_find_field(&literal, &[]);
        assert_eq!(index, 1);
        assert_eq!(record.fields()[1].name, "_vf1");
        assert_eq!(record.name(), "vertex_to_fragment");
        assert_eq!(record.producer_var(), "_to_fragment");
        assert_eq!(record.consumer_var(), "_from_vertex");
    }

    #[test]
    fn test_reassigned_local_is_a_new_field() {
        let mut record = InterfaceRecord::new(Stage::Vertex, Stage::Fragment);
        let local = Expr {
            id: NodeId(3),
            kind: ExprKind::Local { local: LocalId(0), name: "c".to_string() },
            ty: Type::FLOAT,
            span: Span::dummy(),
        };
        let (first, _) = record.create_or_find_field(&local, &[NodeId(10)]);
        let (again, created) = record.create_or_find_field(&local, &[NodeId(10)]);
        assert!(!created);
        assert_eq!(first, again);
        let (later, created) = record.create_or_find_field(&local, &[NodeId(12)]);
        assert!(created);
        assert_ne!(first, later);
    }
}
