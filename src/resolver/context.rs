use super::Arch;
use sysinfo::{CpuExt, System, SystemExt};

/// Container-local readings used when no host view yields data. Collected
/// fresh for every resolution pass; there is no cross-request state.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub cpu_model: String,
    pub cpu_count: usize,
    pub memory_total: u64,
    pub memory_free: u64,
    pub memory_available: u64,
    pub uptime: f64,
    pub hostname: String,
    pub os_type: String,
    pub os_release: String,
    pub load_avg: [f64; 3],
    pub arch: Arch,
}

impl ContextInfo {
    pub fn collect() -> Self {
        let sys = System::new_all();

        let cpu_model = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let cpu_count = sys.cpus().len().max(1);

        let memory_total = sys.total_memory();
        let memory_free = sys.free_memory();
        let memory_available = match sys.available_memory() {
            0 => memory_free,
            v => v,
        };

        let load = sys.load_average();

        Self {
            cpu_model,
            cpu_count,
            memory_total,
            memory_free,
            memory_available,
            uptime: sys.uptime() as f64,
            hostname: sys.host_name().unwrap_or_else(|| "unknown".to_string()),
            os_type: kernel_name(),
            os_release: sys
                .kernel_version()
                .or_else(|| sys.os_version())
                .unwrap_or_else(|| "unknown".to_string()),
            load_avg: [load.one, load.five, load.fifteen],
            arch: Arch::from_token(std::env::consts::ARCH),
        }
    }
}

fn kernel_name() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "windows" => "Windows_NT".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_produces_sane_fallbacks() {
        let ctx = ContextInfo::collect();
        assert!(ctx.cpu_count >= 1);
        assert!(!ctx.cpu_model.is_empty());
        assert!(!ctx.hostname.is_empty());
        assert!(ctx.memory_total > 0);
    }
}
