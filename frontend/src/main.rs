use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use std::fs;
use std::path::PathBuf;

use loopfeat::common::Dtype;
use loopfeat::expr::Var;
use loopfeat::opset::OpEffectTable;
use loopfeat::records::{normalize_throughputs, read_records};
use loopfeat::stmt::{Buffer, For, Stmt};
use loopfeat::{
    per_store_feature_names, per_store_features, serialize_features, FeatureOptions,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of per-buffer slots in each feature row
    #[arg(long, default_value_t = 5)]
    max_n_bufs: usize,

    /// Cache line size in bytes
    #[arg(long, default_value_t = 64)]
    cache_line_size: i64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Named)]
    format: OutputFormat,

    #[command(subcommand)]
    subcmd: Subcmd,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One `name = value` line per feature
    Named,
    /// The raw vector
    Raw,
}

#[derive(Subcommand)]
enum Subcmd {
    /// Print the feature names for the configured slot count
    Names,

    /// Features of a pointwise copy loop
    Copy {
        #[arg(default_value = "1024")]
        size: i64,
    },

    /// Features of a matrix multiplication with an update store
    Matmul {
        #[arg(default_value = "64")]
        size: i64,
    },

    /// Features of a GPU-style copy under thread bindings
    GpuCopy {
        #[arg(long, default_value = "128")]
        blocks: i64,
        #[arg(long, default_value = "256")]
        threads: i64,
    },

    /// Normalize throughputs from a measurement record file and write the
    /// serialized batch blob
    Records {
        file: PathBuf,

        /// Stop after this many records
        #[arg(long)]
        max_lines: Option<usize>,

        /// Where to write the blob
        #[arg(short, long, default_value = "features.bin")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let options = FeatureOptions {
        cache_line_size: args.cache_line_size,
        max_n_bufs: args.max_n_bufs,
    };
    let effects = OpEffectTable::builtin();

    let program = match &args.subcmd {
        Subcmd::Names => {
            for name in per_store_feature_names(options.max_n_bufs) {
                println!("{name}");
            }
            return Ok(());
        }
        Subcmd::Records {
            file,
            max_lines,
            out,
        } => {
            let records = read_records(file, *max_lines)?;
            info!("read {} records", records.len());
            let (throughputs, task_ids) = normalize_throughputs(&records);
            // Lowered programs are not recoverable from records alone, so
            // every feature row stays empty; downstream joins by position.
            let features = vec![Vec::new(); records.len()];
            let n_tasks = task_ids.iter().copied().max().map_or(0, |t| t + 1);
            let blob = serialize_features(&features, &throughputs, &task_ids);
            fs::write(out, &blob)?;
            println!(
                "{} records over {} tasks -> {} ({} bytes)",
                records.len(),
                n_tasks,
                out.display(),
                blob.len()
            );
            return Ok(());
        }
        Subcmd::Copy { size } => build_copy(*size)?,
        Subcmd::Matmul { size } => build_matmul(*size)?,
        Subcmd::GpuCopy { blocks, threads } => build_gpu_copy(*blocks, *threads)?,
    };

    let vector = per_store_features(&program, &options, &effects)?;
    match args.format {
        OutputFormat::Raw => {
            for value in &vector {
                println!("{value}");
            }
        }
        OutputFormat::Named => {
            let names = per_store_feature_names(options.max_n_bufs);
            println!("n_stores = {}", vector[0]);
            for (row, chunk) in vector[1..].chunks(names.len()).enumerate() {
                println!("store {row}:");
                for (name, value) in names.iter().zip(chunk) {
                    println!("  {name} = {value}");
                }
            }
        }
    }
    Ok(())
}

fn build_copy(size: i64) -> Result<Stmt> {
    if size <= 0 {
        bail!("size must be positive");
    }
    let i = Var::new("i");
    let a = Buffer::new("A", &[size], Dtype::Float32);
    let b = Buffer::new("B", &[size], Dtype::Float32);
    Ok(For::serial(
        &i,
        0i64,
        size,
        Stmt::store(&b, a.load(vec![(&i).into()]), vec![(&i).into()]),
    ))
}

fn build_matmul(size: i64) -> Result<Stmt> {
    if size <= 0 {
        bail!("size must be positive");
    }
    let (i, j, k) = (Var::new("i"), Var::new("j"), Var::new("k"));
    let a = Buffer::new("A", &[size, size], Dtype::Float32);
    let b = Buffer::new("B", &[size, size], Dtype::Float32);
    let c = Buffer::new("C", &[size, size], Dtype::Float32);

    let update = Stmt::store(
        &c,
        c.load(vec![(&i).into(), (&j).into()])
            + a.load(vec![(&i).into(), (&k).into()]) * b.load(vec![(&k).into(), (&j).into()]),
        vec![(&i).into(), (&j).into()],
    );
    Ok(For::serial(
        &i,
        0i64,
        size,
        For::serial(&j, 0i64, size, For::serial(&k, 0i64, size, update)),
    ))
}

fn build_gpu_copy(blocks: i64, threads: i64) -> Result<Stmt> {
    if blocks <= 0 || threads <= 0 {
        bail!("blocks and threads must be positive");
    }
    let bx = Var::new("blockIdx.x");
    let tx = Var::new("threadIdx.x");
    let total = blocks * threads;
    let a = Buffer::new("A", &[total], Dtype::Float32);
    let b = Buffer::new("B", &[total], Dtype::Float32);

    let index = || &bx * threads + &tx;
    Ok(Stmt::thread_extent(
        &bx,
        blocks,
        Stmt::thread_extent(
            &tx,
            threads,
            Stmt::store(&b, a.load(vec![index()]), vec![index()]),
        ),
    ))
}
