use std::thread;
use tracing_subscriber::EnvFilter;

/// Log directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_FILTER: &str = "info,facestore=info";

/// Builds the log filter from `RUST_LOG`-style directives, falling back to
/// [`DEFAULT_LOG_FILTER`].
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
    .filter(|d| !d.trim().is_empty())
    .and_then(|d| EnvFilter::try_new(d).ok())
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// How big a runtime to build for this machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeProfile {
    pub logical_cores: usize,
    pub worker_threads: usize,
}

impl RuntimeProfile {
    pub fn detect() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::for_cores(cores)
    }

    pub fn for_cores(cores: usize) -> Self {
        // Single core: still keep one thread free for accepting connections
        if cores <= 1 {
            tracing::warn!("CPU constraint detected (cores: {}), running with 2 worker threads", cores);
            Self { logical_cores: cores, worker_threads: 2 }
        } else {
            Self { logical_cores: cores, worker_threads: cores }
        }
    }

    /// Applies a `--workers` override. Zero means "keep the detected value".
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(n) = workers.filter(|n| *n > 0) {
            self.worker_threads = n;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn log_filter_honours_directives() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("warn,facestore=trace")).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn log_filter_falls_back_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn single_core_gets_two_workers() {
        assert_eq!(RuntimeProfile::for_cores(1).worker_threads, 2);
        assert_eq!(RuntimeProfile::for_cores(8).worker_threads, 8);
    }

    #[test]
    fn override_ignores_zero() {
        let p = RuntimeProfile::for_cores(4);
        assert_eq!(p.clone().with_workers(Some(0)).worker_threads, 4);
        assert_eq!(p.clone().with_workers(None).worker_threads, 4);
        assert_eq!(p.with_workers(Some(3)).worker_threads, 3);
    }
}
