// Module: Flow
// Resolves the `{loop, enable}` pair for a scenario or step.

use crate::protocol::FlowOverrides;

pub const DEFAULT_LOOP: u32 = 1;

/// Resolved repetition/activation settings. Recomputed on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    pub loop_count: u32,
    pub enable: bool,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self {
            loop_count: DEFAULT_LOOP,
            enable: true,
        }
    }
}

impl FlowControl {
    /// Merges the overrides present in the document onto the defaults.
    pub fn resolve(overrides: Option<&FlowOverrides>) -> Self {
        let mut flow = Self::default();
        if let Some(raw) = overrides {
            if let Some(loop_count) = raw.loop_count {
                flow.loop_count = loop_count;
            }
            if let Some(enable) = raw.enable {
                flow.enable = enable;
            }
        }
        flow
    }

    /// Number of times the body actually runs: zero when disabled.
    pub fn effective_iterations(&self) -> u32 {
        if self.enable {
            self.loop_count
        } else {
            0
        }
    }
}
