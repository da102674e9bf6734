//! Enumeration types for the Cadence controller.
//!
//! The controlled junction is a two-phase, four-lane intersection:
//! phase group A gives right-of-way to lanes 1 and 3, phase group B to
//! lanes 2 and 4.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lanes
// ---------------------------------------------------------------------------

/// A monitored approach lane of the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Westbound-entering approach (served by phase group A).
    Lane1,
    /// Southbound-entering approach (served by phase group B).
    Lane2,
    /// Eastbound-entering approach (served by phase group A).
    Lane3,
    /// Northbound-entering approach (served by phase group B).
    Lane4,
}

impl Lane {
    /// All lanes in numeric order.
    pub const ALL: [Self; 4] = [Self::Lane1, Self::Lane2, Self::Lane3, Self::Lane4];

    /// The 1-based lane number.
    pub const fn number(self) -> u8 {
        match self {
            Self::Lane1 => 1,
            Self::Lane2 => 2,
            Self::Lane3 => 3,
            Self::Lane4 => 4,
        }
    }

    /// The phase group that gives this lane right-of-way.
    pub const fn phase_group(self) -> PhaseGroup {
        match self {
            Self::Lane1 | Self::Lane3 => PhaseGroup::A,
            Self::Lane2 | Self::Lane4 => PhaseGroup::B,
        }
    }
}

impl core::fmt::Display for Lane {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "lane{}", self.number())
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Signal timing strategy of a simulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fixed-time baseline: every green phase gets the configured cycle time.
    Fixed,
    /// Fuzzy adaptive control: the green phase is shortened per tick from
    /// the inferred cycle time.
    Fuzzy,
}

impl Strategy {
    /// Both strategies, baseline first.
    pub const ALL: [Self; 2] = [Self::Fixed, Self::Fuzzy];

    /// Lowercase name used in file names and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl core::fmt::Display for Strategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Phase groups
// ---------------------------------------------------------------------------

/// A green phase of the two-phase signal program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseGroup {
    /// Lanes 1 and 3 have right-of-way.
    A,
    /// Lanes 2 and 4 have right-of-way.
    B,
}

impl PhaseGroup {
    /// Lanes served by this phase group.
    pub const fn lanes(self) -> [Lane; 2] {
        match self {
            Self::A => [Lane::Lane1, Lane::Lane3],
            Self::B => [Lane::Lane2, Lane::Lane4],
        }
    }

    /// The conflicting phase group, whose lanes queue while this one is green.
    pub const fn opposing(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}
