use std::collections::BTreeMap;

use tracing::trace;

/// Per-request quorum overrides, keyed by option name.
///
/// Write paths read `w`, `dw` and `pw`; read paths read `r` and `pr`. Keys a
/// path does not recognize are ignored. Unset keys leave the store default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuorumOptions {
    values: BTreeMap<String, u32>,
}

/// Write-path overrides extracted from [`QuorumOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WriteQuorum {
    pub w: Option<u32>,
    pub dw: Option<u32>,
    pub pw: Option<u32>,
}

/// Read-path overrides extracted from [`QuorumOptions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReadQuorum {
    pub r: Option<u32>,
    pub pr: Option<u32>,
}

impl QuorumOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one override.
    pub fn with(mut self, key: impl Into<String>, value: u32) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: u32) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.values.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn write_quorum(&self) -> WriteQuorum {
        let mut quorum = WriteQuorum::default();
        for (key, &value) in &self.values {
            match key.as_str() {
                "w" => quorum.w = Some(value),
                "dw" => quorum.dw = Some(value),
                "pw" => quorum.pw = Some(value),
                other => trace!(option = other, "ignoring option on write path"),
            }
        }
        quorum
    }

    pub(crate) fn read_quorum(&self) -> ReadQuorum {
        let mut quorum = ReadQuorum::default();
        for (key, &value) in &self.values {
            match key.as_str() {
                "r" => quorum.r = Some(value),
                "pr" => quorum.pr = Some(value),
                other => trace!(option = other, "ignoring option on read path"),
            }
        }
        quorum
    }
}

impl<K: Into<String>, const N: usize> From<[(K, u32); N]> for QuorumOptions {
    fn from(entries: [(K, u32); N]) -> Self {
        entries
            .into_iter()
            .fold(QuorumOptions::new(), |opts, (k, v)| opts.with(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_path_picks_write_keys() {
        let opts = QuorumOptions::from([("w", 2), ("dw", 1), ("r", 3), ("bogus", 9)]);
        let quorum = opts.write_quorum();
        assert_eq!(quorum.w, Some(2));
        assert_eq!(quorum.dw, Some(1));
        assert_eq!(quorum.pw, None);
    }

    #[test]
    fn read_path_picks_read_keys() {
        let opts = QuorumOptions::new().with("pr", 1).with("w", 3);
        let quorum = opts.read_quorum();
        assert_eq!(quorum.r, None);
        assert_eq!(quorum.pr, Some(1));
    }

    #[test]
    fn later_value_replaces_earlier() {
        let mut opts = QuorumOptions::new().with("r", 1);
        opts.set("r", 2);
        assert_eq!(opts.get("r"), Some(2));
        assert!(!opts.is_empty());
    }
}
