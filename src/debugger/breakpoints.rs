use std::collections::{BTreeMap, BTreeSet};

/// Breakpoint lines per source file.
///
/// `setBreakpoints` replaces the whole list for one file, so every file that ever held a
/// breakpoint stays tracked until it is explicitly cleared.
#[derive(Debug, Default)]
pub struct Breakpoints {
    sources: BTreeMap<String, BTreeSet<u64>>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `line` and returns the file's full list.
    pub fn add(&mut self, source: &str, line: u64) -> Vec<u64> {
        let lines = self.sources.entry(source.to_string()).or_default();
        lines.insert(line);
        lines.iter().copied().collect()
    }

    /// Removes `line` and returns what remains for the file. The file stays tracked.
    pub fn remove(&mut self, source: &str, line: u64) -> Vec<u64> {
        match self.sources.get_mut(source) {
            Some(lines) => {
                lines.remove(&line);
                lines.iter().copied().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn lines(&self, source: &str) -> Vec<u64> {
        self.sources
            .get(source)
            .map(|lines| lines.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Forgets every file and returns them; each needs an empty `setBreakpoints`.
    pub fn clear(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sources).into_keys().collect()
    }
}
