//! Operation priority tiers.

use std::fmt;

/// Priority tier of an operation.
///
/// Tiers map one-to-one onto stack indices, with index 0 the most urgent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    VeryHigh = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    VeryLow = 4,
}

impl Priority {
    /// Number of tiers (and therefore stacks) in a pool.
    pub const COUNT: usize = 5;

    /// All tiers, most urgent first.
    pub const ALL: [Priority; Self::COUNT] = [
        Self::VeryHigh,
        Self::High,
        Self::Normal,
        Self::Low,
        Self::VeryLow,
    ];

    /// Index of the stack this tier is admitted to.
    pub fn stack_index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryHigh => "very_high",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::VeryHigh,
            1 => Self::High,
            2 => Self::Normal,
            3 => Self::Low,
            _ => Self::VeryLow,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
