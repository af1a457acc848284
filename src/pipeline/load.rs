// src/pipeline/load.rs

//! System load sampling used for pacing between batch chunks.

/// One load sample, in percent of capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSample {
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
}

impl LoadSample {
    /// Whether either reading exceeds its threshold. Missing readings never do.
    pub fn exceeds(&self, max_cpu: f32, max_memory: f32) -> bool {
        self.cpu_percent.is_some_and(|c| c > max_cpu)
            || self.memory_percent.is_some_and(|m| m > max_memory)
    }
}

/// Source of load samples.
pub trait LoadProbe: Send + Sync {
    fn sample(&self) -> LoadSample;
}

/// Reads `/proc/loadavg` and `/proc/meminfo`. On other platforms every
/// sample is empty and pacing never backs off.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcLoadProbe;

impl LoadProbe for ProcLoadProbe {
    #[allow(unreachable_code)]
    fn sample(&self) -> LoadSample {
        #[cfg(target_os = "linux")]
        {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            return LoadSample {
                cpu_percent: std::fs::read_to_string("/proc/loadavg")
                    .ok()
                    .and_then(|c| cpu_percent_from_loadavg(&c, cpus)),
                memory_percent: std::fs::read_to_string("/proc/meminfo")
                    .ok()
                    .and_then(|c| memory_percent_from_meminfo(&c)),
            };
        }

        LoadSample::default()
    }
}

/// One-minute load average relative to the number of CPUs.
pub fn cpu_percent_from_loadavg(content: &str, cpus: usize) -> Option<f32> {
    let one_minute: f32 = content.split_whitespace().next()?.parse().ok()?;
    Some(one_minute * 100.0 / cpus.max(1) as f32)
}

/// Share of memory in use, from `MemTotal` and `MemAvailable` (kB).
pub fn memory_percent_from_meminfo(content: &str) -> Option<f32> {
    let field = |name: &str| -> Option<f32> {
        content
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((total - available) * 100.0 / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loadavg_is_normalized_by_cpus() {
        let percent = cpu_percent_from_loadavg("3.00 2.10 1.50 2/345 6789\n", 4).unwrap();
        assert!((percent - 75.0).abs() < 0.01);
        assert_eq!(cpu_percent_from_loadavg("", 4), None);
    }

    #[test]
    fn test_meminfo_usage() {
        let meminfo = "MemTotal:       16000000 kB\nMemFree:         1000000 kB\nMemAvailable:    4000000 kB\n";
        let percent = memory_percent_from_meminfo(meminfo).unwrap();
        assert!((percent - 75.0).abs() < 0.01);
        assert_eq!(memory_percent_from_meminfo("MemTotal: 100 kB\n"), None);
    }

    #[test]
    fn test_exceeds_ignores_missing_readings() {
        assert!(!LoadSample::default().exceeds(1.0, 1.0));
        let busy = LoadSample {
            cpu_percent: Some(95.0),
            memory_percent: None,
        };
        assert!(busy.exceeds(85.0, 90.0));
        assert!(!busy.exceeds(99.0, 90.0));
    }
}
