use crate::error::PipelineError;

/// Date format accepted on the command line and written to chart files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Configures a custom Rayon thread pool with specified size.
///
/// The pool is used to bound inference parallelism separately from the global
/// Rayon pool.
///
/// # Arguments
/// * `num_threads` - Desired number of threads for the pool.
///
/// # Returns
/// * `Result<ThreadPool>` - Created thread pool or an error if creation fails.
pub fn configure_thread_pool(num_threads: usize) -> anyhow::Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build thread pool: {}", e))
}

/// Resolves the requested thread count against the machine.
///
/// A request above the CPU count is capped with a warning; no request means
/// Rayon's default.
///
/// # Errors
/// * If the request is zero.
pub fn effective_threads(requested: Option<usize>) -> anyhow::Result<usize> {
    match requested {
        Some(n) if n > 0 => {
            let max_threads = num_cpus::get();
            if n > max_threads {
                println!("⚠️ Warning: Limiting thread count to {} (max available)", max_threads);
                anyhow::Ok(max_threads)
            } else {
                anyhow::Ok(n)
            }
        }
        Some(_) => Err(anyhow::anyhow!("Number of threads must be a positive integer")),
        None => anyhow::Ok(rayon::current_num_threads()),
    }
}

/// Parses a `%Y-%m-%d` date.
///
/// # Errors
/// * `PipelineError::InvalidConfig` naming the offending text.
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, PipelineError> {
    chrono::NaiveDate::parse_from_str(date_str.trim(), DATE_FORMAT)
        .map_err(|e| PipelineError::InvalidConfig(format!("invalid date '{}': {}", date_str, e)))
}

pub fn format_date(date: chrono::NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Creates the parent directory of `path` when it does not exist yet.
///
/// # Arguments
/// * `path` - File path whose directory must exist before writing.
///
/// # Errors
/// * If the directory cannot be created.
pub fn ensure_parent_dir_exist<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
        }
    }
    anyhow::Ok(())
}
