pub use gsplat_core as core;
pub use gsplat_io as io;
pub use gsplat_maths as maths;
pub use gsplat_ops as ops;
pub use gsplat_spatial as spatial;

use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize the global rayon thread pool used by the LOD unit writer.
///
/// Call once at startup. Repeated calls are idempotent and return the first
/// initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `GSPLAT_CPU_THREADS` env var
/// 3. rayon default (hardware concurrency)
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<(), String> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let configured = match num_threads {
            Some(n) => Some(n),
            None => read_cpu_threads_from_env()?,
        };
        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = configured {
            builder = builder.num_threads(n);
        }
        builder.build_global().map_err(|e| e.to_string())
    });
    res.clone()
}

fn read_cpu_threads_from_env() -> Result<Option<usize>, String> {
    let raw = match env::var("GSPLAT_CPU_THREADS") {
        Ok(v) => v,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(e) => return Err(format!("failed to read GSPLAT_CPU_THREADS: {e}")),
    };

    let parsed: usize = raw
        .parse()
        .map_err(|_| format!("GSPLAT_CPU_THREADS must be a positive integer, got '{raw}'"))?;
    if parsed == 0 {
        return Err("GSPLAT_CPU_THREADS must be >= 1".to_string());
    }
    Ok(Some(parsed))
}
