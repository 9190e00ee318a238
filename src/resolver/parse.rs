//! Pure `text -> field` parsers for the /proc and /etc pseudo-file formats.
//!
//! Every function is total over arbitrary input: unparseable content maps
//! to `None` and the caller substitutes its documented fallback, so a flaky
//! source can never produce a partial snapshot.

use super::Arch;
use regex::Regex;

/// CPU model from /proc/cpuinfo. Tolerates colon or equals separators and
/// falls back to ARM identity keys when no "model name" line exists.
pub fn cpu_model(cpuinfo: &str) -> Option<String> {
    let key_re = Regex::new(r"(?i)^model\s+name\s*[:=]").expect("static regex");
    let line = cpuinfo
        .lines()
        .find(|line| line.to_lowercase().contains("model name") || key_re.is_match(line))
        .or_else(|| {
            cpuinfo.lines().find(|line| {
                line.contains("Hardware")
                    || line.contains("Processor")
                    || line.contains("CPU implementer")
            })
        })?;

    let value = line.splitn(2, [':', '=']).nth(1)?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Logical CPU count from /proc/cpuinfo: one "processor" line per CPU,
/// with an lscpu-style "CPU(s)" total as secondary source.
pub fn cpu_count(cpuinfo: &str) -> Option<usize> {
    let proc_re = Regex::new(r"(?i)^processor\s*([:=]|\d+)").expect("static regex");
    let count = cpuinfo
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("processor") && proc_re.is_match(line))
        .count();
    if count > 0 {
        return Some(count);
    }

    let total_line = cpuinfo
        .lines()
        .find(|line| line.to_lowercase().contains("cpu(s)"))?;
    let digits = Regex::new(r"\d+").expect("static regex");
    digits
        .find(total_line)?
        .as_str()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
}

/// One labeled /proc/meminfo value (`<Label>: <n> kB`) converted to bytes.
pub fn meminfo_bytes(meminfo: &str, label: &str) -> Option<u64> {
    let line = meminfo.lines().find(|line| line.starts_with(label))?;
    let digits = Regex::new(r"\d+").expect("static regex");
    let kb = digits.find(line)?.as_str().parse::<u64>().ok()?;
    Some(kb * 1024)
}

/// First whitespace-delimited float of /proc/uptime.
pub fn uptime_seconds(uptime: &str) -> Option<f64> {
    uptime.split_whitespace().next()?.parse::<f64>().ok()
}

/// 1/5/15-minute load averages from /proc/loadavg. Requires three fields;
/// an individual unparseable field degrades to 0.
pub fn load_avg(loadavg: &str) -> Option<[f64; 3]> {
    let parts: Vec<&str> = loadavg.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    Some([
        parts[0].parse().unwrap_or(0.0),
        parts[1].parse().unwrap_or(0.0),
        parts[2].parse().unwrap_or(0.0),
    ])
}

/// Since-boot CPU usage percentage from the aggregate "cpu " line of
/// /proc/stat: 100 * busy / (busy + idle + iowait), clamped to [0, 100].
/// A two-sample delta would be more accurate; the since-boot average is
/// the documented contract.
pub fn cpu_usage_from_stat(stat: &str) -> Option<f64> {
    let line = stat.lines().find(|line| line.starts_with("cpu "))?;
    let ticks: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|t| t.parse::<u64>().unwrap_or(0))
        .collect();
    if ticks.len() < 4 {
        return None;
    }
    let tick = |i: usize| ticks.get(i).copied().unwrap_or(0) as f64;

    // user nice system idle iowait irq softirq steal
    let idle_total = tick(3) + tick(4);
    let busy_total = tick(0) + tick(1) + tick(2) + tick(5) + tick(6) + tick(7);
    let total = idle_total + busy_total;
    if total <= 0.0 {
        return None;
    }
    Some((busy_total * 100.0 / total).clamp(0.0, 100.0))
}

/// Kernel release token following "Linux version " in /proc/version.
pub fn release_from_proc_version(version: &str) -> Option<String> {
    let re = Regex::new(r"Linux version (\S+)").expect("static regex");
    Some(re.captures(version)?.get(1)?.as_str().to_string())
}

/// PRETTY_NAME value from /etc/os-release.
pub fn pretty_name(os_release: &str) -> Option<String> {
    let re = Regex::new(r#"PRETTY_NAME="?([^"\n]+)"?"#).expect("static regex");
    Some(re.captures(os_release)?.get(1)?.as_str().trim().to_string())
}

/// Display form of a PRETTY_NAME: Ubuntu gets compressed to
/// "Ubuntu <major.minor>", everything else is kept verbatim.
pub fn format_pretty_release(pretty: &str) -> String {
    if pretty.contains("Ubuntu") {
        let re = Regex::new(r"\d+\.\d+").expect("static regex");
        if let Some(m) = re.find(pretty) {
            return format!("Ubuntu {}", m.as_str());
        }
    }
    pretty.to_string()
}

/// Marker substring of minimal VM-style kernel builds (Docker Desktop and
/// the like) whose /proc/version says nothing about the real host.
pub fn is_vm_kernel(version: &str) -> bool {
    version.contains("linuxkit")
}

/// Architecture heuristics over /proc/cpuinfo, then /proc/version.
pub fn detect_arch(cpuinfo: &str, version: &str) -> Option<Arch> {
    for line in cpuinfo.lines() {
        if let Some(arch) = arch_from_tokens(&line.to_lowercase()) {
            return Some(arch);
        }
    }

    if let Some(flags) = cpuinfo
        .lines()
        .find(|line| line.contains("flags") || line.contains("Features"))
    {
        // "lm" (long mode) only ever appears on x86-64.
        if flags.split_whitespace().any(|t| t == "lm") {
            return Some(Arch::X64);
        }
        if flags.contains("aarch64") {
            return Some(Arch::Arm64);
        }
    }

    if let Some(ident) = cpuinfo.lines().find(|line| {
        line.contains("Processor") || line.contains("CPU architecture") || line.contains("CPU implementer")
    }) {
        if ident.contains("aarch64") || ident.contains("ARMv8") {
            return Some(Arch::Arm64);
        }
        if ident.contains("armv7") || ident.contains("ARMv7") {
            return Some(Arch::Arm);
        }
    }

    arch_from_tokens(&version.to_lowercase())
}

fn arch_from_tokens(lower: &str) -> Option<Arch> {
    if lower.contains("x86_64") || lower.contains("amd64") {
        return Some(Arch::X64);
    }
    if lower.contains("aarch64") || lower.contains("arm64") {
        return Some(Arch::Arm64);
    }
    if lower.contains("armv7") || lower.contains("armv6") {
        return Some(Arch::Arm);
    }
    None
}

/// True for hostname values that identify the container rather than the
/// host: 12-hex-digit Docker container IDs and the literal "host".
pub fn is_container_hostname(hostname: &str) -> bool {
    if hostname == "host" {
        return true;
    }
    let re = Regex::new(r"(?i)^[0-9a-f]{12}$").expect("static regex");
    re.is_match(hostname)
}
