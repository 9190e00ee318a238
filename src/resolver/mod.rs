//! Best-effort host metrics resolution from inside a container.
//!
//! One resolution pass per request: probe host pseudo-files through the
//! source chain, parse whatever text comes back, and fill every field of
//! the snapshot. Fields that cannot be read from a host view degrade to
//! the container-local reading, so the result is always complete.

pub mod context;
pub mod net;
pub mod nsenter;
pub mod parse;
pub mod sources;
#[cfg(test)]
pub mod testutil;

use crate::config::Config;
use context::ContextInfo;
use nsenter::{HostCommandRunner, NsenterRunner};
use serde::Serialize;
use sources::SourceChain;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    Arm64,
    Arm,
    Other,
}

impl Arch {
    pub fn from_token(token: &str) -> Self {
        match token {
            "x86_64" | "amd64" | "x64" => Self::X64,
            "aarch64" | "arm64" => Self::Arm64,
            "arm" | "armv7" | "armv6" => Self::Arm,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OsInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub release: String,
    pub arch: Arch,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub model: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub used: u64,
}

impl MemoryInfo {
    /// `used` is always derived as total - available, never read from a
    /// source directly.
    pub fn from_parts(total: u64, free: u64, available: u64) -> Self {
        Self {
            total,
            free,
            available,
            used: total.saturating_sub(available),
        }
    }
}

/// Complete point-in-time host view. Every field is always present; when
/// host data is out of reach a field carries its documented fallback.
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub os: OsInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub uptime: f64,
    pub hostname: String,
    #[serde(rename = "localIP")]
    pub local_ip: String,
    #[serde(rename = "loadAvg")]
    pub load_avg: [f64; 3],
    #[serde(rename = "cpuUsage")]
    pub cpu_usage: f64,
    #[serde(rename = "hostMounted")]
    pub host_mounted: bool,
}

pub struct Resolver {
    chain: SourceChain,
    runner: Box<dyn HostCommandRunner>,
}

impl Resolver {
    pub fn new(cfg: &Config) -> Self {
        Self {
            chain: SourceChain::new(&cfg.host_root, &cfg.pid1_root),
            runner: Box::new(NsenterRunner::new(Duration::from_secs(
                cfg.nsenter_timeout_secs,
            ))),
        }
    }

    #[cfg(test)]
    fn with_parts(chain: SourceChain, runner: Box<dyn HostCommandRunner>) -> Self {
        Self { chain, runner }
    }

    pub fn resolve(&self) -> HostSnapshot {
        self.resolve_with_context(&ContextInfo::collect())
    }

    fn resolve_with_context(&self, ctx: &ContextInfo) -> HostSnapshot {
        let cpuinfo = self
            .chain
            .read("/proc/cpuinfo", || synthetic_cpuinfo(ctx));
        let cpu = CpuInfo {
            model: parse::cpu_model(&cpuinfo).unwrap_or_else(|| "Unknown".to_string()),
            count: parse::cpu_count(&cpuinfo).unwrap_or(ctx.cpu_count).max(1),
        };

        let meminfo = self.chain.read("/proc/meminfo", String::new);
        let memory = MemoryInfo::from_parts(
            parse::meminfo_bytes(&meminfo, "MemTotal").unwrap_or(ctx.memory_total),
            parse::meminfo_bytes(&meminfo, "MemFree").unwrap_or(ctx.memory_free),
            parse::meminfo_bytes(&meminfo, "MemAvailable").unwrap_or(ctx.memory_available),
        );

        let uptime_text = self.chain.read("/proc/uptime", String::new);
        let uptime = parse::uptime_seconds(&uptime_text).unwrap_or(ctx.uptime);

        let version = self.chain.read("/proc/version", String::new);
        let os_release_text = self.chain.read("/etc/os-release", String::new);
        let (os_type, os_release) = os_identity(&version, &os_release_text, ctx);

        let loadavg_text = self.chain.read("/proc/loadavg", String::new);
        let load_avg = parse::load_avg(&loadavg_text).unwrap_or(ctx.load_avg);

        let stat = self.chain.read("/proc/stat", String::new);
        let cpu_usage = parse::cpu_usage_from_stat(&stat)
            .unwrap_or_else(|| (load_avg[0] / cpu.count as f64 * 100.0).min(100.0));

        let arch = parse::detect_arch(&cpuinfo, &version).unwrap_or(ctx.arch);

        HostSnapshot {
            os: OsInfo {
                kind: os_type,
                release: os_release,
                arch,
            },
            cpu,
            memory,
            uptime,
            hostname: self.hostname(ctx),
            local_ip: net::discover_local_ip(&self.chain, self.runner.as_ref()),
            load_avg,
            cpu_usage,
            host_mounted: self.chain.host_mounted(),
        }
    }

    /// Kernel hostname, then /etc/hostname, skipping values that look like
    /// container IDs, then the container's own hostname.
    fn hostname(&self, ctx: &ContextInfo) -> String {
        for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
            let value = self.chain.read(path, String::new);
            if !value.is_empty() && !parse::is_container_hostname(&value) {
                return value;
            }
        }
        ctx.hostname.clone()
    }
}

fn os_identity(version: &str, os_release: &str, ctx: &ContextInfo) -> (String, String) {
    let mut kind = ctx.os_type.clone();
    let mut release = ctx.os_release.clone();

    let version_usable = !version.is_empty() && !parse::is_vm_kernel(version);
    if version_usable {
        if let Some(rel) = parse::release_from_proc_version(version) {
            release = rel;
            kind = "Linux".to_string();
        }
    }

    if let Some(pretty) = parse::pretty_name(os_release) {
        kind = "Linux".to_string();
        if !version_usable {
            release = parse::format_pretty_release(&pretty);
        }
    }

    (kind, release)
}

// Keeps downstream parsing uniform when no source has a real cpuinfo.
fn synthetic_cpuinfo(ctx: &ContextInfo) -> String {
    let mut out = format!("model name\t: {}\n", ctx.cpu_model);
    for i in 0..ctx.cpu_count {
        out.push_str(&format!("processor\t: {i}\n"));
    }
    out
}
