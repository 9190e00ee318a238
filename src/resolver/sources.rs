use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One candidate filesystem view of host pseudo-files. Implementations
/// probe their root on every call so a mount appearing or disappearing at
/// runtime changes the outcome without a restart.
pub trait PseudoFileSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_read(&self, path: &str) -> Option<String>;
}

/// Host root reachable through PID 1, available when the container shares
/// the host PID namespace (`--pid host`).
pub struct Pid1RootSource {
    root: PathBuf,
}

impl Pid1RootSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PseudoFileSource for Pid1RootSource {
    fn name(&self) -> &'static str {
        "pid1-root"
    }

    fn try_read(&self, path: &str) -> Option<String> {
        if !self.root.exists() {
            return None;
        }
        read_regular_file(&rooted(&self.root, path))
    }
}

/// Host root mounted as a volume (e.g. `-v /:/host:ro`). Only trusted when
/// the proc/sys/etc marker directories all exist under it, so an empty or
/// stub mount never shadows the container-local view.
pub struct HostVolumeSource {
    root: PathBuf,
}

impl HostVolumeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn is_mounted(&self) -> bool {
        markers_present(&self.root)
    }
}

impl PseudoFileSource for HostVolumeSource {
    fn name(&self) -> &'static str {
        "host-volume"
    }

    fn try_read(&self, path: &str) -> Option<String> {
        if !self.is_mounted() {
            return None;
        }
        read_regular_file(&rooted(&self.root, path))
    }
}

/// The container's own view, terminal filesystem fallback.
pub struct ContainerSource;

impl PseudoFileSource for ContainerSource {
    fn name(&self) -> &'static str {
        "container"
    }

    fn try_read(&self, path: &str) -> Option<String> {
        read_regular_file(Path::new(path))
    }
}

/// Ordered fallback chain over pseudo-file sources. Never fails: when no
/// source yields usable content the caller-supplied default is returned.
pub struct SourceChain {
    sources: Vec<Box<dyn PseudoFileSource>>,
    host_root: PathBuf,
}

impl SourceChain {
    pub fn new(host_root: impl Into<PathBuf>, pid1_root: impl Into<PathBuf>) -> Self {
        let host_root = host_root.into();
        Self {
            sources: vec![
                Box::new(Pid1RootSource::new(pid1_root.into())),
                Box::new(HostVolumeSource::new(host_root.clone())),
                Box::new(ContainerSource),
            ],
            host_root,
        }
    }

    #[cfg(test)]
    pub fn from_sources(
        sources: Vec<Box<dyn PseudoFileSource>>,
        host_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sources,
            host_root: host_root.into(),
        }
    }

    pub fn read(&self, path: &str, default: impl FnOnce() -> String) -> String {
        for source in &self.sources {
            if let Some(content) = source.try_read(path) {
                debug!(path, source = source.name(), bytes = content.len(), "pseudo-file read");
                return content;
            }
        }
        debug!(path, "no source yielded content, using default");
        default()
    }

    pub fn host_mounted(&self) -> bool {
        markers_present(&self.host_root)
    }
}

fn markers_present(root: &Path) -> bool {
    ["proc", "sys", "etc"].iter().all(|m| root.join(m).is_dir())
}

// Absolute pseudo-file paths are grafted under the root by concatenation,
// so PathBuf::join's absolute-path replacement does not apply.
fn rooted(root: &Path, path: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", root.display(), path))
}

fn read_regular_file(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let full = rooted(root, rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn markers(root: &Path) {
        for m in ["proc", "sys", "etc"] {
            fs::create_dir_all(root.join(m)).unwrap();
        }
    }

    #[test]
    fn returns_default_when_no_source_has_the_file() {
        let chain = SourceChain::new("/nonexistent-host-root", "/nonexistent-pid1-root");
        let got = chain.read("/no/such/pseudo-file", || "fallback".to_string());
        assert_eq!(got, "fallback");
    }

    #[test]
    fn pid1_root_wins_over_host_volume() {
        let pid1 = TempDir::new().unwrap();
        let host = TempDir::new().unwrap();
        markers(host.path());
        write(pid1.path(), "/proc/uptime", "111.0 222.0\n");
        write(host.path(), "/proc/uptime", "333.0 444.0\n");

        let chain = SourceChain::new(host.path(), pid1.path());
        let got = chain.read("/proc/uptime", String::new);
        assert_eq!(got, "111.0 222.0");
    }

    #[test]
    fn host_volume_skipped_without_markers() {
        let host = TempDir::new().unwrap();
        write(host.path(), "/proc/uptime", "333.0 444.0\n");

        // The host-volume source alone, so the outcome cannot be satisfied
        // by the runner's own /proc.
        let chain = SourceChain::from_sources(
            vec![Box::new(HostVolumeSource::new(host.path()))],
            host.path(),
        );
        let got = chain.read("/proc/uptime", || "default".to_string());
        assert_eq!(got, "default");
        assert!(!chain.host_mounted());
    }

    #[test]
    fn host_volume_used_when_markers_exist() {
        let host = TempDir::new().unwrap();
        markers(host.path());
        write(host.path(), "/proc/loadavg", "0.5 0.4 0.3 1/100 42\n");

        let chain = SourceChain::new(host.path(), "/nonexistent-pid1-root");
        let got = chain.read("/proc/loadavg", String::new);
        assert_eq!(got, "0.5 0.4 0.3 1/100 42");
        assert!(chain.host_mounted());
    }

    #[test]
    fn empty_and_non_regular_files_fall_through() {
        let host = TempDir::new().unwrap();
        markers(host.path());
        write(host.path(), "/proc/version", "   \n");
        fs::create_dir_all(rooted(host.path(), "/proc/meminfo")).unwrap();

        let chain = SourceChain::from_sources(
            vec![Box::new(HostVolumeSource::new(host.path()))],
            host.path(),
        );
        assert_eq!(chain.read("/proc/version", || "d1".to_string()), "d1");
        assert_eq!(chain.read("/proc/meminfo", || "d2".to_string()), "d2");
    }

    #[test]
    fn content_is_trimmed() {
        let host = TempDir::new().unwrap();
        markers(host.path());
        write(host.path(), "/etc/hostname", "  myhost  \n");

        let chain = SourceChain::new(host.path(), "/nonexistent-pid1-root");
        assert_eq!(chain.read("/etc/hostname", String::new), "myhost");
    }
}
