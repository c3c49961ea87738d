//! Knobs for the frame lookup.

/// When `DW_CFA_def_cfa_offset_sf` takes effect during FDE replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetRule {
    /// The instruction belongs to the row at the current location, like every
    /// other instruction. Once the location has moved past the pc, replay
    /// stops before it.
    #[default]
    Positional,
    /// The instruction is applied even after the location has moved past the
    /// pc. Only the next location advance stops the replay.
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub offset_rule: OffsetRule,
    /// Upper bound on the number of CIE/FDE records scanned for one lookup.
    pub max_entries: usize,
}

impl Config {
    pub const DEFAULT_MAX_ENTRIES: usize = 1 << 20;

    pub fn with_offset_rule(mut self, offset_rule: OffsetRule) -> Self {
        self.offset_rule = offset_rule;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offset_rule: OffsetRule::default(),
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }
}
