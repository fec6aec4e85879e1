use crate::common::Dtype;
use crate::expr::{BufferLoad, PrimExpr, Var};

use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

pub type Shape = SmallVec<[i64; 4]>;

/// A dense, named array written and read by leaf statements.
///
/// Like [Var](crate::expr::Var), buffers compare by identity. Maps keyed by
/// `Buffer` are identity maps; a structurally identical buffer created twice
/// is two distinct keys.
#[derive(Debug, Clone)]
pub struct Buffer(Arc<BufferRepr>);

#[derive(Debug)]
struct BufferRepr {
    id: u64,
    name: String,
    shape: Shape,
    dtype: Dtype,
}

impl Buffer {
    pub fn new(name: impl Into<String>, shape: &[i64], dtype: Dtype) -> Self {
        Buffer(Arc::new(BufferRepr {
            id: NEXT_BUFFER_ID.fetch_add(1, atomic::Ordering::Relaxed),
            name: name.into(),
            shape: SmallVec::from_slice(shape),
            dtype,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> &[i64] {
        &self.0.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.0.dtype
    }

    /// Element size in bytes.
    pub fn elem_bytes(&self) -> i64 {
        i64::from(self.0.dtype.size())
    }

    pub fn load(&self, indices: Vec<PrimExpr>) -> PrimExpr {
        PrimExpr::Load(BufferLoad {
            buffer: self.clone(),
            indices,
        })
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Buffer {}

impl std::hash::Hash for Buffer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Display for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// A half-open interval `[min, min + extent)`, both ends symbolic.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub min: PrimExpr,
    pub extent: PrimExpr,
}

impl Range {
    pub fn from_min_extent(min: impl Into<PrimExpr>, extent: impl Into<PrimExpr>) -> Self {
        Range {
            min: min.into(),
            extent: extent.into(),
        }
    }
}

/// Scheduling annotation on a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Serial,
    Vectorized,
    Unrolled,
    Parallel,
}

/// A statement in a lowered tensor program, after scheduling and bound
/// inference. Leaves are buffer stores.
#[derive(Debug, Clone)]
pub enum Stmt {
    For(For),
    Attr(Attr),
    Store(BufferStore),
    Realize(BufferRealize),
    Seq(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct For {
    pub var: Var,
    pub min: PrimExpr,
    pub extent: PrimExpr,
    pub kind: LoopKind,
    pub body: Box<Stmt>,
}

/// A scoped annotation wrapping a statement.
#[derive(Debug, Clone)]
pub struct Attr {
    pub key: AttrKey,
    pub value: PrimExpr,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub enum AttrKey {
    /// Binds a GPU thread axis (`blockIdx.*` / `threadIdx.*`) for the body.
    ThreadExtent(Var),
    /// Binds a virtual thread for the body.
    VirtualThread(Var),
    /// Hint for the downstream unroller; carried as a numeric feature only.
    AutoUnrollMaxStep,
}

#[derive(Debug, Clone)]
pub struct BufferStore {
    pub buffer: Buffer,
    pub value: PrimExpr,
    pub indices: Vec<PrimExpr>,
}

/// Declares the region of a buffer that must be materialized around `body`.
#[derive(Debug, Clone)]
pub struct BufferRealize {
    pub buffer: Buffer,
    pub bounds: Vec<Range>,
    pub body: Box<Stmt>,
}

impl Stmt {
    pub fn store(buffer: &Buffer, value: impl Into<PrimExpr>, indices: Vec<PrimExpr>) -> Stmt {
        Stmt::Store(BufferStore {
            buffer: buffer.clone(),
            value: value.into(),
            indices,
        })
    }

    pub fn seq(stmts: Vec<Stmt>) -> Stmt {
        Stmt::Seq(stmts)
    }

    pub fn realize(buffer: &Buffer, bounds: Vec<Range>, body: Stmt) -> Stmt {
        Stmt::Realize(BufferRealize {
            buffer: buffer.clone(),
            bounds,
            body: Box::new(body),
        })
    }

    pub fn attr(key: AttrKey, value: impl Into<PrimExpr>, body: Stmt) -> Stmt {
        Stmt::Attr(Attr {
            key,
            value: value.into(),
            body: Box::new(body),
        })
    }

    /// A `thread_extent` annotation binding `var` to a thread axis of the
    /// given extent.
    pub fn thread_extent(var: &Var, extent: i64, body: Stmt) -> Stmt {
        Stmt::attr(AttrKey::ThreadExtent(var.clone()), extent, body)
    }

    pub fn virtual_thread(var: &Var, extent: i64, body: Stmt) -> Stmt {
        Stmt::attr(AttrKey::VirtualThread(var.clone()), extent, body)
    }

    pub fn auto_unroll_max_step(value: i64, body: Stmt) -> Stmt {
        Stmt::attr(AttrKey::AutoUnrollMaxStep, value, body)
    }
}

impl For {
    pub fn new(
        var: &Var,
        min: impl Into<PrimExpr>,
        extent: impl Into<PrimExpr>,
        kind: LoopKind,
        body: Stmt,
    ) -> Stmt {
        Stmt::For(For {
            var: var.clone(),
            min: min.into(),
            extent: extent.into(),
            kind,
            body: Box::new(body),
        })
    }

    pub fn serial(var: &Var, min: impl Into<PrimExpr>, extent: impl Into<PrimExpr>, body: Stmt) -> Stmt {
        For::new(var, min, extent, LoopKind::Serial, body)
    }

    pub fn vectorized(
        var: &Var,
        min: impl Into<PrimExpr>,
        extent: impl Into<PrimExpr>,
        body: Stmt,
    ) -> Stmt {
        For::new(var, min, extent, LoopKind::Vectorized, body)
    }

    pub fn unrolled(
        var: &Var,
        min: impl Into<PrimExpr>,
        extent: impl Into<PrimExpr>,
        body: Stmt,
    ) -> Stmt {
        For::new(var, min, extent, LoopKind::Unrolled, body)
    }

    pub fn parallel(
        var: &Var,
        min: impl Into<PrimExpr>,
        extent: impl Into<PrimExpr>,
        body: Stmt,
    ) -> Stmt {
        For::new(var, min, extent, LoopKind::Parallel, body)
    }

    /// The literal trip count of this loop, or 1 when the extent is symbolic.
    pub fn literal_extent(&self) -> i64 {
        self.extent.as_const_int().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_identity() {
        let a = Buffer::new("A", &[8], Dtype::Float32);
        let b = Buffer::new("A", &[8], Dtype::Float32);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.elem_bytes(), 4);
    }

    #[test]
    fn test_literal_extent_fallback() {
        let i = Var::new("i");
        let n = Var::new("n");
        let buf = Buffer::new("B", &[1], Dtype::Float32);
        let Stmt::For(literal) = For::serial(&i, 0i64, 16i64, Stmt::store(&buf, 0.0, vec![]))
        else {
            unreachable!()
        };
        assert_eq!(literal.literal_extent(), 16);
        let Stmt::For(symbolic) = For::serial(&i, 0i64, &n, Stmt::store(&buf, 0.0, vec![])) else {
            unreachable!()
        };
        assert_eq!(symbolic.literal_extent(), 1);
    }
}
