//! Canned sources and runners shared by resolver tests.

use super::nsenter::HostCommandRunner;
use super::sources::{PseudoFileSource, SourceChain};
use std::collections::HashMap;

pub struct MapSource {
    files: HashMap<&'static str, &'static str>,
}

impl PseudoFileSource for MapSource {
    fn name(&self) -> &'static str {
        "map"
    }

    fn try_read(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

pub fn chain_with(files: &[(&'static str, &'static str)]) -> SourceChain {
    SourceChain::from_sources(
        vec![Box::new(MapSource {
            files: files.iter().copied().collect(),
        })],
        "/nonexistent-host-root",
    )
}

pub struct FakeRunner {
    available: bool,
    replies: HashMap<&'static str, &'static str>,
}

impl FakeRunner {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            replies: HashMap::new(),
        }
    }

    pub fn with(replies: &[(&'static str, &'static str)]) -> Self {
        Self {
            available: true,
            replies: replies.iter().copied().collect(),
        }
    }
}

impl HostCommandRunner for FakeRunner {
    fn available(&self) -> bool {
        self.available
    }

    fn run(&self, command: &str) -> Option<String> {
        self.replies.get(command).map(|s| s.to_string())
    }
}
