use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Below this, preprocessing runs on a single thread.
pub const LOW_MEMORY_BYTES: u64 = 4 * GIB;
/// Below this, preprocessing runs on two threads.
pub const MODERATE_MEMORY_BYTES: u64 = 8 * GIB;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HostResources {
    pub available_memory: Option<u64>,
    pub free_disk: Option<u64>,
    pub cores: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceAdvice {
    pub threads: usize,
    pub warnings: Vec<String>,
}

/// `MemAvailable` of a `/proc/meminfo` dump, in bytes.
pub fn parse_meminfo(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("MemAvailable:")?;
        let mut parts = rest.split_whitespace();
        let value: u64 = parts.next()?.parse().ok()?;
        match parts.next() {
            Some("kB") | None => Some(value * 1024),
            _ => None,
        }
    })
}

/// Available bytes of the single filesystem reported by `df -Pk <path>`.
pub fn parse_df(output: &str) -> Option<u64> {
    let line = output.lines().nth(1)?;
    let available_kb: u64 = line.split_whitespace().nth(3)?.parse().ok()?;
    Some(available_kb * 1024)
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / GIB as f64
}

/// Thread count and warnings for the given host. Advisory only: nothing here
/// stops the pipeline.
pub fn advise(
    resources: &HostResources,
    requested_threads: Option<usize>,
    extract_size: Option<u64>,
) -> ResourceAdvice {
    let mut warnings = Vec::new();
    let cores = resources.cores.max(1);

    let threads = match resources.available_memory {
        Some(memory) if memory < LOW_MEMORY_BYTES => {
            warnings.push(format!(
                "Only {:.1} GiB of memory available, preprocessing a national extract will likely fail; using 1 thread",
                gib(memory)
            ));
            1
        }
        Some(memory) if memory < MODERATE_MEMORY_BYTES => {
            warnings.push(format!(
                "{:.1} GiB of memory available, using 2 threads",
                gib(memory)
            ));
            2.min(cores)
        }
        Some(_) => cores,
        None => {
            warnings.push(String::from("Could not read the available memory"));
            cores
        }
    };

    let threads = match requested_threads {
        Some(requested) if requested > threads => {
            warnings.push(format!(
                "{requested} threads requested, keeping {requested} despite the memory advice of {threads}"
            ));
            requested
        }
        Some(requested) => requested.max(1),
        None => threads,
    };

    match (resources.free_disk, extract_size) {
        (Some(free), Some(size)) if size > free => warnings.push(format!(
            "The extract needs {:.1} GiB but only {:.1} GiB are free",
            gib(size),
            gib(free)
        )),
        (None, _) => warnings.push(String::from("Could not read the free disk space")),
        _ => {}
    }

    ResourceAdvice { threads, warnings }
}

/// Reads memory, disk and cores of the host running the pipeline.
pub async fn probe(data_dir: &Path) -> HostResources {
    let available_memory = match tokio::fs::read_to_string("/proc/meminfo").await {
        Ok(content) => parse_meminfo(&content),
        Err(err) => {
            debug!("Cannot read /proc/meminfo: {}", err);
            None
        }
    };

    let free_disk = match tokio::process::Command::new("df")
        .arg("-Pk")
        .arg(data_dir)
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            parse_df(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            debug!("df exited with {}", output.status);
            None
        }
        Err(err) => {
            debug!("Cannot run df: {}", err);
            None
        }
    };

    let cores = std::thread::available_parallelism()
        .map(|cores| cores.get())
        .unwrap_or(1);

    HostResources {
        available_memory,
        free_disk,
        cores,
    }
}

pub fn log_advice(advice: &ResourceAdvice) {
    for warning in &advice.warnings {
        warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16318412 kB
MemFree:         1203344 kB
MemAvailable:    9876543 kB
Buffers:          123456 kB
";

    const DF: &str = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/nvme0n1p2   490617784 300000000 165644056      65% /
";

    #[test]
    fn test_parse_meminfo() {
        assert_eq!(parse_meminfo(MEMINFO), Some(9876543 * 1024));
        assert_eq!(parse_meminfo("MemTotal: 1 kB"), None);
    }

    #[test]
    fn test_parse_df() {
        assert_eq!(parse_df(DF), Some(165644056 * 1024));
        assert_eq!(parse_df("Filesystem"), None);
    }

    #[test]
    fn test_low_memory_uses_one_thread() {
        let resources = HostResources {
            available_memory: Some(3 * GIB),
            free_disk: Some(100 * GIB),
            cores: 16,
        };

        let advice = advise(&resources, None, None);
        assert_eq!(advice.threads, 1);
        assert_eq!(advice.warnings.len(), 1);
    }

    #[test]
    fn test_moderate_memory_uses_two_threads() {
        let resources = HostResources {
            available_memory: Some(6 * GIB),
            free_disk: Some(100 * GIB),
            cores: 16,
        };

        assert_eq!(advise(&resources, None, None).threads, 2);
    }

    #[test]
    fn test_enough_memory_uses_every_core() {
        let resources = HostResources {
            available_memory: Some(32 * GIB),
            free_disk: Some(100 * GIB),
            cores: 12,
        };

        let advice = advise(&resources, None, Some(10 * GIB));
        assert_eq!(advice.threads, 12);
        assert!(advice.warnings.is_empty());
    }

    #[test]
    fn test_requested_threads_win_with_warning() {
        let resources = HostResources {
            available_memory: Some(3 * GIB),
            free_disk: Some(100 * GIB),
            cores: 8,
        };

        let advice = advise(&resources, Some(4), None);
        assert_eq!(advice.threads, 4);
        assert_eq!(advice.warnings.len(), 2);
    }

    #[test]
    fn test_extract_larger_than_disk_warns() {
        let resources = HostResources {
            available_memory: Some(32 * GIB),
            free_disk: Some(5 * GIB),
            cores: 4,
        };

        let advice = advise(&resources, None, Some(11 * GIB));
        assert_eq!(advice.threads, 4);
        assert_eq!(advice.warnings.len(), 1);
    }
}
