/// Which `stopped` reasons make the session inspect the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPolicy {
    reasons: Vec<String>,
}

impl StopPolicy {
    pub fn new<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    /// Breakpoints and steps only; signals are left alone.
    pub fn without_signal() -> Self {
        Self::new(["breakpoint", "step"])
    }

    pub fn inspects(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::new(["breakpoint", "step", "signal"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_includes_signal() {
        let policy = StopPolicy::default();
        assert!(policy.inspects("breakpoint"));
        assert!(policy.inspects("step"));
        assert!(policy.inspects("signal"));
        assert!(!policy.inspects("exception"));
        assert!(!policy.inspects("entry"));
    }

    #[test]
    fn signal_can_be_dropped() {
        assert!(!StopPolicy::without_signal().inspects("signal"));
    }
}
