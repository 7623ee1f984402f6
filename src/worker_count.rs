//! Worker-count heuristic — resolves `workers: "auto"` to a concrete
//! count from host resources. See §4.13.

use std::num::NonZeroUsize;

/// Environment variable that overrides the heuristic outright.
pub const OVERRIDE_ENV_VAR: &str = "TABLE_SYNC_WORKERS";

/// Fraction of available CPU parallelism to use.
const CPU_FRACTION: f64 = 0.75;

/// Minimum memory budget per worker, in bytes (512 MiB), used as a coarse
/// ceiling against the detected available memory so worker count doesn't
/// outpace RAM on constrained hosts.
const MEMORY_PER_WORKER_BYTES: u64 = 512 * 1024 * 1024;

const MAX_WORKERS: usize = 32;

/// Resolve `workers: "auto"` to a concrete worker count: the CPU-derived
/// figure, capped by the memory-derived figure and an overall ceiling.
/// An env var override takes precedence over both.
pub fn optimal_worker_count() -> usize {
    if let Ok(raw) = std::env::var(OVERRIDE_ENV_VAR) {
        if let Ok(n) = raw.trim().parse::<usize>() {
            if n > 0 {
                return n;
            }
        }
    }

    let cpu_count = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let cpu_budget = ((cpu_count as f64) * CPU_FRACTION).round().max(1.0) as usize;

    let memory_budget = available_memory_bytes()
        .map(|bytes| (bytes / MEMORY_PER_WORKER_BYTES).max(1) as usize)
        .unwrap_or(cpu_budget);

    cpu_budget.min(memory_budget).min(MAX_WORKERS).max(1)
}

/// Best-effort available-memory reading from `/proc/meminfo`. Returns
/// `None` off Linux or if the file can't be parsed, in which case the CPU
/// budget alone governs.
fn available_memory_bytes() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            let kib: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kib * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_override_env_var_takes_precedence() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(OVERRIDE_ENV_VAR, "7");
        assert_eq!(optimal_worker_count(), 7);
        std::env::remove_var(OVERRIDE_ENV_VAR);
    }

    #[test]
    fn test_zero_override_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(OVERRIDE_ENV_VAR, "0");
        assert!(optimal_worker_count() >= 1);
        std::env::remove_var(OVERRIDE_ENV_VAR);
    }

    #[test]
    fn test_default_is_at_least_one_and_bounded() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(OVERRIDE_ENV_VAR);
        let count = optimal_worker_count();
        assert!(count >= 1);
        assert!(count <= MAX_WORKERS);
    }
}
