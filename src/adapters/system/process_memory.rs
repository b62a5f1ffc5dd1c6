//! Resident memory of this process as a fraction of a configured budget.
//!
//! Reads the `VmRSS` line of `/proc/self/status`, which the kernel reports
//! in kB regardless of page size. On platforms without procfs the sampler
//! reports 0.0, which leaves scaling to the connection ratio alone.

use std::path::PathBuf;

use tracing::debug;

use crate::ports::LoadSampler;

pub struct ProcessMemorySampler {
    budget_bytes: u64,
    status: PathBuf,
}

impl ProcessMemorySampler {
    pub fn new(budget_mb: u64) -> Self {
        Self {
            budget_bytes: budget_mb.saturating_mul(1024 * 1024),
            status: PathBuf::from("/proc/self/status"),
        }
    }

    fn resident_bytes(&self) -> Option<u64> {
        let raw = std::fs::read_to_string(&self.status).ok()?;
        parse_vm_rss_kb(&raw).map(|kb| kb.saturating_mul(1024))
    }
}

impl LoadSampler for ProcessMemorySampler {
    fn memory_pressure(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        match self.resident_bytes() {
            Some(rss) => (rss as f64 / self.budget_bytes as f64).clamp(0.0, 1.0),
            None => {
                debug!(path = %self.status.display(), "Memory sample unavailable");
                0.0
            }
        }
    }
}

/// `VmRSS:    1234 kB` -> 1234
fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    let line = status.lines().find_map(|line| line.strip_prefix("VmRSS:"))?;
    let mut fields = line.split_whitespace();
    let value = fields.next()?.parse().ok()?;
    match fields.next() {
        Some(unit) if unit.eq_ignore_ascii_case("kB") => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tstream-relay\nVmPeak:\t  20480 kB\nVmRSS:\t   6144 kB\nThreads:\t4\n";

    #[test]
    fn parses_vm_rss_in_kb() {
        assert_eq!(parse_vm_rss_kb(STATUS), Some(6144));
    }

    #[test]
    fn rejects_missing_or_unitless_rss() {
        assert_eq!(parse_vm_rss_kb("Name:\tx\nThreads:\t1\n"), None);
        assert_eq!(parse_vm_rss_kb("VmRSS:\t6144\n"), None);
        assert_eq!(parse_vm_rss_kb("VmRSS:\tlots kB\n"), None);
    }

    #[test]
    fn pressure_uses_byte_count_from_kb() {
        let dir = std::env::temp_dir().join(format!("relay-status-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("status");
        std::fs::write(&path, STATUS).unwrap();

        let sampler = ProcessMemorySampler {
            budget_bytes: 12 * 1024 * 1024,
            status: path,
        };
        assert!((sampler.memory_pressure() - 0.5).abs() < 1e-9);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_status_reads_as_no_pressure() {
        let sampler = ProcessMemorySampler {
            budget_bytes: 1024,
            status: PathBuf::from("/nonexistent/status"),
        };
        assert_eq!(sampler.memory_pressure(), 0.0);
    }

    #[test]
    fn zero_budget_reads_as_no_pressure() {
        assert_eq!(ProcessMemorySampler::new(0).memory_pressure(), 0.0);
    }

    #[test]
    fn pressure_stays_within_unit_range() {
        let pressure = ProcessMemorySampler::new(1).memory_pressure();
        assert!((0.0..=1.0).contains(&pressure));
    }
}
