//! Per-store feature extraction.
//!
//! The extractor walks a lowered program once. Every buffer store produces a
//! [FeatureSet] keyed by the written buffer; stores to the same buffer
//! overwrite earlier ones, so an init/update pair is summarized by the
//! update. [pack] flattens feature sets into the fixed-shape float vectors
//! consumed by the cost model.

pub mod access;
pub mod curve;
pub mod mathops;
pub mod pack;
pub mod reuse;
pub mod serialize;

use crate::bound::Analyzer;
use crate::expr::{PrimExpr, Var};
use crate::opset::OpEffectTable;
use crate::stmt::{Attr, AttrKey, Buffer, BufferRealize, BufferStore, For, LoopKind, Range, Stmt};

use indexmap::IndexMap;
use rayon::prelude::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{self, AtomicUsize};

pub use access::AccessType;
pub use curve::ARITH_INTENSITY_CURVE_SAMPLE_N;
pub use mathops::MathOpCounts;
pub use pack::{feature_row_len, per_store_feature_names, slog};
pub use reuse::ReuseType;
pub use serialize::serialize_features;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FeatureError {
    #[error("`{0}` is not a valid thread iteration variable")]
    InvalidThreadAxis(String),
    #[error("no call effect registered for op `{0}`")]
    UnknownCallOp(String),
}

/// Extraction knobs shared by all entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureOptions {
    /// Cache line size of the target, in bytes.
    pub cache_line_size: i64,
    /// Number of per-buffer slots in each packed vector.
    pub max_n_bufs: usize,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        FeatureOptions {
            cache_line_size: 64,
            max_n_bufs: 5,
        }
    }
}

/// Where an annotated iterator sits relative to the operation's axis groups.
///
/// Recovering the real position needs compute-graph metadata that is gone
/// after lowering, so the extractor only ever emits `None` and `Mixed`; the
/// full range is kept because the packed one-hot block is eight wide.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationPos {
    #[default]
    None,
    InnerSpatial,
    MiddleSpatial,
    OuterSpatial,
    InnerReduce,
    MiddleReduce,
    OuterReduce,
    Mixed,
}

impl AnnotationPos {
    pub const ALL: [AnnotationPos; 8] = [
        AnnotationPos::None,
        AnnotationPos::InnerSpatial,
        AnnotationPos::MiddleSpatial,
        AnnotationPos::OuterSpatial,
        AnnotationPos::InnerReduce,
        AnnotationPos::MiddleReduce,
        AnnotationPos::OuterReduce,
        AnnotationPos::Mixed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AnnotationPos::None => "None",
            AnnotationPos::InnerSpatial => "InnerSpatial",
            AnnotationPos::MiddleSpatial => "MiddleSpatial",
            AnnotationPos::OuterSpatial => "OuterSpatial",
            AnnotationPos::InnerReduce => "InnerReduce",
            AnnotationPos::MiddleReduce => "MiddleReduce",
            AnnotationPos::OuterReduce => "OuterReduce",
            AnnotationPos::Mixed => "Mixed",
        }
    }
}

/// Memory-access features for one buffer within one store's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAccessFeature {
    pub buffer_name: String,
    pub acc_type: AccessType,
    /// Touched memory in bytes, counting repeats.
    pub bytes: f64,
    /// Touched unique memory in bytes.
    pub unique_bytes: f64,
    /// Touched cache lines, counting repeats.
    pub lines: f64,
    /// Touched unique cache lines.
    pub unique_lines: f64,
    pub reuse_type: ReuseType,
    /// Iterations between two touches of the same element.
    pub reuse_dis_iter: f64,
    /// Bytes moved between two touches of the same element.
    pub reuse_dis_bytes: f64,
    /// How many times the region is reused.
    pub reuse_ct: f64,
    pub bytes_d_reuse_ct: f64,
    pub unique_bytes_d_reuse_ct: f64,
    pub lines_d_reuse_ct: f64,
    pub unique_lines_d_reuse_ct: f64,
    /// Element stride of the innermost iterator, 0 when it has none.
    pub stride: f64,
}

/// Everything extracted for a single buffer store.
///
/// The compute counters are already scaled by the surrounding loop extents:
/// they describe the work of the full nest execution, not one iteration.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub float_mad: f64,
    pub float_addsub: f64,
    pub float_mul: f64,
    pub float_divmod: f64,
    pub float_cmp: f64,
    pub float_math_func: f64,
    pub float_other_func: f64,
    pub int_mad: f64,
    pub int_addsub: f64,
    pub int_mul: f64,
    pub int_divmod: f64,
    pub int_cmp: f64,
    pub int_math_func: f64,
    pub int_other_func: f64,
    pub bool_op: f64,
    pub select_op: f64,

    pub vec_num: f64,
    pub vec_prod: f64,
    pub vec_len: f64,
    pub vec_type: AnnotationPos,
    pub unroll_num: f64,
    pub unroll_prod: f64,
    pub unroll_len: f64,
    pub unroll_type: AnnotationPos,
    pub parallel_num: f64,
    pub parallel_prod: f64,
    pub parallel_len: f64,
    pub parallel_type: AnnotationPos,

    pub is_gpu: bool,
    pub block_idx_x_len: f64,
    pub block_idx_y_len: f64,
    pub block_idx_z_len: f64,
    pub thread_idx_x_len: f64,
    pub thread_idx_y_len: f64,
    pub thread_idx_z_len: f64,
    pub vthread_len: f64,

    pub arith_intensity_curve: [f64; ARITH_INTENSITY_CURVE_SAMPLE_N],

    pub access_feas: Vec<BufferAccessFeature>,

    pub alloc_size: f64,
    pub alloc_prod: f64,
    pub alloc_outer_prod: f64,
    pub alloc_inner_prod: f64,

    pub outer_prod: f64,
    pub num_loops: f64,
    pub auto_unroll_max_step: f64,
}

/// One entry of a loop's touch map: a single access's type, touched element
/// count under the bindings at that loop level, and element width.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TouchEntry {
    #[allow(dead_code)] // kept because the map entry mirrors the access tuple
    pub acc_type: AccessType,
    pub elements: i64,
    pub ele_bytes: i64,
}

/// A loop (real or synthesized from a thread binding) on the traversal
/// stack. Frames are identified by a traversal-unique id so touch maps can
/// outlive the frame itself.
#[derive(Debug, Clone)]
pub(crate) struct LoopFrame {
    pub id: u64,
    pub var: Var,
    pub min: PrimExpr,
    pub extent: PrimExpr,
    pub extent_int: i64,
}

pub(crate) type TouchRegions = HashMap<u64, IndexMap<Buffer, Vec<TouchEntry>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadAxis {
    BlockIdxX,
    BlockIdxY,
    BlockIdxZ,
    ThreadIdxX,
    ThreadIdxY,
    ThreadIdxZ,
}

impl ThreadAxis {
    fn parse(name: &str) -> Result<Self, FeatureError> {
        match name {
            "blockIdx.x" => Ok(ThreadAxis::BlockIdxX),
            "blockIdx.y" => Ok(ThreadAxis::BlockIdxY),
            "blockIdx.z" => Ok(ThreadAxis::BlockIdxZ),
            "threadIdx.x" => Ok(ThreadAxis::ThreadIdxX),
            "threadIdx.y" => Ok(ThreadAxis::ThreadIdxY),
            "threadIdx.z" => Ok(ThreadAxis::ThreadIdxZ),
            _ => Err(FeatureError::InvalidThreadAxis(name.to_string())),
        }
    }
}

struct Extractor<'a> {
    effects: &'a OpEffectTable,
    cache_line_size: i64,

    outer_loop_prod: f64,
    for_stack: Vec<LoopFrame>,
    vec_extents: Vec<i64>,
    unroll_extents: Vec<i64>,
    parallel_extents: Vec<i64>,

    is_gpu: bool,
    block_idx_x_len: i64,
    block_idx_y_len: i64,
    block_idx_z_len: i64,
    thread_idx_x_len: i64,
    thread_idx_y_len: i64,
    thread_idx_z_len: i64,
    vthread_len: i64,
    cur_auto_unroll_max_step: i64,

    next_loop_id: u64,
    touch_regions: TouchRegions,
    buffer_features: IndexMap<Buffer, FeatureSet>,
}

impl<'a> Extractor<'a> {
    fn new(effects: &'a OpEffectTable, cache_line_size: i64) -> Self {
        Extractor {
            effects,
            cache_line_size,
            outer_loop_prod: 1.0,
            for_stack: Vec::new(),
            vec_extents: Vec::new(),
            unroll_extents: Vec::new(),
            parallel_extents: Vec::new(),
            is_gpu: false,
            block_idx_x_len: 1,
            block_idx_y_len: 1,
            block_idx_z_len: 1,
            thread_idx_x_len: 1,
            thread_idx_y_len: 1,
            thread_idx_z_len: 1,
            vthread_len: 1,
            cur_auto_unroll_max_step: 0,
            next_loop_id: 0,
            touch_regions: HashMap::new(),
            buffer_features: IndexMap::new(),
        }
    }

    fn fresh_loop_id(&mut self) -> u64 {
        let id = self.next_loop_id;
        self.next_loop_id += 1;
        id
    }

    fn thread_len_mut(&mut self, axis: ThreadAxis) -> &mut i64 {
        match axis {
            ThreadAxis::BlockIdxX => &mut self.block_idx_x_len,
            ThreadAxis::BlockIdxY => &mut self.block_idx_y_len,
            ThreadAxis::BlockIdxZ => &mut self.block_idx_z_len,
            ThreadAxis::ThreadIdxX => &mut self.thread_idx_x_len,
            ThreadAxis::ThreadIdxY => &mut self.thread_idx_y_len,
            ThreadAxis::ThreadIdxZ => &mut self.thread_idx_z_len,
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), FeatureError> {
        match stmt {
            Stmt::For(node) => self.visit_for(node),
            Stmt::Attr(node) => self.visit_attr(node),
            Stmt::Store(node) => self.visit_store(node),
            Stmt::Realize(node) => self.visit_realize(node),
            Stmt::Seq(stmts) => {
                for child in stmts {
                    self.visit_stmt(child)?;
                }
                Ok(())
            }
        }
    }

    fn visit_for(&mut self, node: &For) -> Result<(), FeatureError> {
        let extent = node.literal_extent();

        match node.kind {
            LoopKind::Vectorized => self.vec_extents.push(extent),
            LoopKind::Unrolled => self.unroll_extents.push(extent),
            LoopKind::Parallel => self.parallel_extents.push(extent),
            LoopKind::Serial => {}
        }

        self.outer_loop_prod *= extent as f64;
        let id = self.fresh_loop_id();
        self.for_stack.push(LoopFrame {
            id,
            var: node.var.clone(),
            min: node.min.clone(),
            extent: node.extent.clone(),
            extent_int: extent,
        });

        let result = self.visit_stmt(&node.body);

        self.for_stack.pop();
        self.outer_loop_prod /= extent as f64;
        match node.kind {
            LoopKind::Vectorized => {
                self.vec_extents.pop();
            }
            LoopKind::Unrolled => {
                self.unroll_extents.pop();
            }
            LoopKind::Parallel => {
                self.parallel_extents.pop();
            }
            LoopKind::Serial => {}
        }
        result
    }

    fn visit_attr(&mut self, node: &Attr) -> Result<(), FeatureError> {
        match &node.key {
            AttrKey::ThreadExtent(var) | AttrKey::VirtualThread(var) => {
                let extent = node.value.as_const_int().unwrap_or(1);
                let axis = match &node.key {
                    AttrKey::ThreadExtent(v) => Some(ThreadAxis::parse(v.name())?),
                    _ => None,
                };

                let slot = match axis {
                    Some(axis) => self.thread_len_mut(axis),
                    None => &mut self.vthread_len,
                };
                let extent_before = *slot;
                match axis {
                    // A thread binding overwrites its axis length; virtual
                    // threads compose multiplicatively.
                    Some(_) => *slot = extent,
                    None => *slot *= extent,
                }

                self.is_gpu = true;

                // The binding behaves like a parallel loop over the thread
                // index, so push a synthesized frame for it.
                self.outer_loop_prod *= extent as f64;
                let id = self.fresh_loop_id();
                self.for_stack.push(LoopFrame {
                    id,
                    var: var.clone(),
                    min: PrimExpr::IntImm(0),
                    extent: PrimExpr::IntImm(extent),
                    extent_int: extent,
                });

                let result = self.visit_stmt(&node.body);

                self.for_stack.pop();
                self.outer_loop_prod /= extent as f64;
                let slot = match axis {
                    Some(axis) => self.thread_len_mut(axis),
                    None => &mut self.vthread_len,
                };
                *slot = extent_before;
                result
            }
            AttrKey::AutoUnrollMaxStep => {
                let value = node.value.as_const_int().unwrap_or(0);
                let old_value = self.cur_auto_unroll_max_step;
                self.cur_auto_unroll_max_step = value;
                let result = self.visit_stmt(&node.body);
                self.cur_auto_unroll_max_step = old_value;
                result
            }
        }
    }

    fn visit_store(&mut self, node: &BufferStore) -> Result<(), FeatureError> {
        let mathops = mathops::count_math_ops(&node.value, self.effects)?;
        let outer_loop_prod = self.outer_loop_prod;

        // Collect the one write plus every read in the stored value.
        let mut collector = access::AccessCollector::default();
        collector.insert_access(&node.buffer, AccessType::Write, &node.indices);
        collector.extract_reads(&node.value);

        // Pin every loop variable to its first iteration, then widen them
        // one loop at a time, innermost first, recording each buffer's
        // touched region at every level.
        let mut analyzer = Analyzer::new();
        for frame in &self.for_stack {
            analyzer.bind(&frame.var, Range::from_min_extent(frame.min.clone(), 1i64));
        }

        let mut mem_bytes_list = Vec::with_capacity(self.for_stack.len());
        let mut compute_ops_list = Vec::with_capacity(self.for_stack.len());
        let mut cur_compute_ops = mathops.float_total() as f64;
        let mut final_regions: HashMap<Buffer, Vec<i64>> = HashMap::new();

        for level in (0..self.for_stack.len()).rev() {
            let frame = &self.for_stack[level];
            analyzer.bind(
                &frame.var,
                Range::from_min_extent(frame.min.clone(), frame.extent.clone()),
            );

            let loop_regions = self.touch_regions.entry(frame.id).or_default();
            let mut mem_bytes: i64 = 0;
            for (buffer, acc) in &collector.accesses {
                let region = access::compute_region(&acc.indices, &analyzer);
                let touched: i64 = region.iter().fold(1i64, |p, &d| p.saturating_mul(d));
                loop_regions
                    .entry(buffer.clone())
                    .or_default()
                    .push(TouchEntry {
                        acc_type: acc.acc_type,
                        elements: touched,
                        ele_bytes: buffer.elem_bytes(),
                    });
                mem_bytes = mem_bytes.saturating_add(touched.saturating_mul(buffer.elem_bytes()));
                final_regions.insert(buffer.clone(), region);
            }

            mem_bytes_list.push((mem_bytes as f64).log2());
            cur_compute_ops *= frame.extent_int as f64;
            compute_ops_list.push(cur_compute_ops.log2());
        }

        let arith_intensity_curve =
            curve::sample_curve(&compute_ops_list, &mem_bytes_list, cur_compute_ops);

        // Memory-access features per touched buffer.
        let mut access_feas = Vec::with_capacity(collector.accesses.len());
        for (buffer, acc) in &collector.accesses {
            let ele_bytes = buffer.elem_bytes() as f64;
            let bytes = outer_loop_prod * ele_bytes;

            let unique_bytes;
            let stride;
            let lines;
            let unique_lines;
            if self.for_stack.is_empty() {
                unique_bytes = ele_bytes;
                stride = 0.0;
                lines = 1.0;
                unique_lines = 1.0;
            } else {
                let outermost = &self.for_stack[0];
                unique_bytes =
                    self.touch_regions[&outermost.id][buffer][0].elements as f64 * ele_bytes;

                let mut found_stride = 0i64;
                let mut found_level = None;
                let mut reduce_ratio = 1.0f64;
                let innermost_extent = self.for_stack.last().unwrap().extent_int as f64;
                for level in (0..self.for_stack.len()).rev() {
                    found_stride = access::compute_stride(
                        &acc.indices,
                        buffer.shape(),
                        &self.for_stack[level].var,
                    );
                    if found_stride != 0 {
                        found_level = Some(level);
                        break;
                    }
                    reduce_ratio *= innermost_extent;
                }

                lines = (outer_loop_prod / reduce_ratio
                    * (found_stride as f64 * ele_bytes / self.cache_line_size as f64).min(1.0))
                .max(1.0);

                // Only the innermost iterator's stride is reported.
                stride = if found_level == Some(self.for_stack.len() - 1) {
                    found_stride as f64
                } else {
                    0.0
                };

                let region = &final_regions[buffer];
                let mut n_continuous = ele_bytes;
                for dim in (0..region.len()).rev() {
                    if region[dim] == buffer.shape()[dim] {
                        n_continuous *= region[dim] as f64;
                        break;
                    }
                }
                unique_lines =
                    (unique_bytes / n_continuous.min(self.cache_line_size as f64)).max(1.0);
            }

            let (reuse_type, reuse_dis_iter, reuse_dis_bytes, reuse_ct) = reuse::compute_reuse(
                buffer,
                &acc.indices,
                &self.for_stack,
                &self.touch_regions,
            );

            let (bytes_d_reuse_ct, unique_bytes_d_reuse_ct, lines_d_reuse_ct, unique_lines_d_reuse_ct) =
                if reuse_ct > 0.5 {
                    (
                        bytes / reuse_ct,
                        unique_bytes / reuse_ct,
                        lines / reuse_ct,
                        unique_lines / reuse_ct,
                    )
                } else {
                    // No reuse: magnified by a magic factor of 2.
                    (bytes * 2.0, unique_bytes * 2.0, lines * 2.0, unique_lines * 2.0)
                };

            access_feas.push(BufferAccessFeature {
                buffer_name: buffer.name().to_string(),
                acc_type: acc.acc_type,
                bytes,
                unique_bytes,
                lines,
                unique_lines,
                reuse_type,
                reuse_dis_iter,
                reuse_dis_bytes,
                reuse_ct,
                bytes_d_reuse_ct,
                unique_bytes_d_reuse_ct,
                lines_d_reuse_ct,
                unique_lines_d_reuse_ct,
                stride,
            });
        }

        let fea = self
            .buffer_features
            .entry(node.buffer.clone())
            .or_default();

        fea.float_mad = outer_loop_prod * mathops.float_mad as f64;
        fea.float_addsub = outer_loop_prod * mathops.float_addsub as f64;
        fea.float_mul = outer_loop_prod * mathops.float_mul as f64;
        fea.float_divmod = outer_loop_prod * mathops.float_divmod as f64;
        fea.float_cmp = outer_loop_prod * mathops.float_cmp as f64;
        fea.float_math_func = outer_loop_prod * mathops.float_math_func as f64;
        fea.float_other_func = outer_loop_prod * mathops.float_other_func as f64;
        fea.int_mad = outer_loop_prod * mathops.int_mad as f64;
        fea.int_addsub = outer_loop_prod * mathops.int_addsub as f64;
        fea.int_mul = outer_loop_prod * mathops.int_mul as f64;
        fea.int_divmod = outer_loop_prod * mathops.int_divmod as f64;
        fea.int_cmp = outer_loop_prod * mathops.int_cmp as f64;
        fea.int_math_func = outer_loop_prod * mathops.int_math_func as f64;
        fea.int_other_func = outer_loop_prod * mathops.int_other_func as f64;
        fea.bool_op = outer_loop_prod * mathops.bool_op as f64;
        fea.select_op = outer_loop_prod * mathops.select_op as f64;

        fea.outer_prod = outer_loop_prod;
        fea.num_loops = self.for_stack.len() as f64;
        fea.auto_unroll_max_step = self.cur_auto_unroll_max_step as f64;

        fea.vec_num = self.vec_extents.len() as f64;
        fea.vec_len = 0.0;
        fea.vec_type = AnnotationPos::None;
        if let Some(&innermost) = self.vec_extents.last() {
            fea.vec_len = innermost as f64;
            fea.vec_prod = self.vec_extents.iter().map(|&e| e as f64).product();
            fea.vec_type = AnnotationPos::Mixed;
        }

        fea.unroll_num = self.unroll_extents.len() as f64;
        fea.unroll_len = 0.0;
        fea.unroll_type = AnnotationPos::None;
        if let Some(&innermost) = self.unroll_extents.last() {
            fea.unroll_len = innermost as f64;
            fea.unroll_prod = self.unroll_extents.iter().map(|&e| e as f64).product();
            fea.unroll_type = AnnotationPos::Mixed;
        }

        fea.parallel_num = self.parallel_extents.len() as f64;
        fea.parallel_len = 0.0;
        fea.parallel_type = AnnotationPos::None;
        if let Some(&innermost) = self.parallel_extents.last() {
            fea.parallel_len = innermost as f64;
            fea.parallel_prod = self.parallel_extents.iter().map(|&e| e as f64).product();
            fea.parallel_type = AnnotationPos::Mixed;
        }

        fea.is_gpu = self.is_gpu;
        fea.block_idx_x_len = self.block_idx_x_len as f64;
        fea.block_idx_y_len = self.block_idx_y_len as f64;
        fea.block_idx_z_len = self.block_idx_z_len as f64;
        fea.thread_idx_x_len = self.thread_idx_x_len as f64;
        fea.thread_idx_y_len = self.thread_idx_y_len as f64;
        fea.thread_idx_z_len = self.thread_idx_z_len as f64;
        fea.vthread_len = self.vthread_len as f64;

        fea.arith_intensity_curve = arith_intensity_curve;
        fea.access_feas = access_feas;

        Ok(())
    }

    fn visit_realize(&mut self, node: &BufferRealize) -> Result<(), FeatureError> {
        self.visit_stmt(&node.body)?;

        let allocation_size: f64 = node
            .bounds
            .iter()
            .map(|bound| bound.extent.as_const_int().unwrap_or(1) as f64)
            .product();

        let fea = self
            .buffer_features
            .entry(node.buffer.clone())
            .or_default();
        fea.alloc_size = allocation_size * node.buffer.elem_bytes() as f64;
        fea.alloc_prod = allocation_size * self.outer_loop_prod;
        fea.alloc_outer_prod = self.outer_loop_prod;
        fea.alloc_inner_prod = fea.outer_prod / self.outer_loop_prod;
        Ok(())
    }
}

/// Extract a [FeatureSet] for every buffer store in `stmt`, keyed by the
/// written buffer, in first-store order.
pub fn per_store_feature_sets(
    stmt: &Stmt,
    options: &FeatureOptions,
    effects: &OpEffectTable,
) -> Result<IndexMap<Buffer, FeatureSet>, FeatureError> {
    let mut extractor = Extractor::new(effects, options.cache_line_size);
    extractor.visit_stmt(stmt)?;
    Ok(extractor.buffer_features)
}

/// Extract the packed feature vector for one program.
///
/// The vector starts with the number of buffer stores, followed by one
/// fixed-length row per store (see [feature_row_len]).
pub fn per_store_features(
    stmt: &Stmt,
    options: &FeatureOptions,
    effects: &OpEffectTable,
) -> Result<Vec<f32>, FeatureError> {
    let sets = per_store_feature_sets(stmt, options, effects)?;
    Ok(pack::pack_features(sets.values(), options.max_n_bufs))
}

/// Extract packed feature vectors for a batch of programs, in parallel.
///
/// A program that fails extraction contributes an empty row; the failure
/// count is logged and otherwise ignored. The first `skip_first_n` rows are
/// left empty without extracting.
pub fn per_store_features_batch(
    programs: &[Stmt],
    options: &FeatureOptions,
    effects: &OpEffectTable,
    skip_first_n: usize,
) -> Vec<Vec<f32>> {
    let error_ct = AtomicUsize::new(0);
    let mut features = vec![Vec::new(); programs.len()];

    let skip = skip_first_n.min(programs.len());
    features[skip..]
        .par_iter_mut()
        .zip(&programs[skip..])
        .for_each(|(row, program)| {
            match per_store_features(program, options, effects) {
                Ok(vector) => *row = vector,
                Err(_) => {
                    error_ct.fetch_add(1, atomic::Ordering::Relaxed);
                }
            }
        });

    let errors = error_ct.load(atomic::Ordering::Relaxed);
    if errors > 0 {
        log::warn!("encountered {errors} errors during feature extraction, which are safely ignored");
    }
    features
}
