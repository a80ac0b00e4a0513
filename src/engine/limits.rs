const DEFAULT_MAX_STEPS: usize = 25;
pub(crate) const MAX_STEPS_ENV: &str = "PALAVER_MAX_STEPS";

/// Per-turn execution bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Agent and tool steps allowed in one turn.
    pub max_steps: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EngineLimits {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }

    /// Defaults, overridden by `PALAVER_MAX_STEPS` when it holds a positive integer.
    pub fn from_env() -> Self {
        std::env::var(MAX_STEPS_ENV)
            .ok()
            .and_then(|value| parse_positive_usize(&value))
            .map(Self::new)
            .unwrap_or_default()
    }
}

pub(crate) fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}
