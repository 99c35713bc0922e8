//! Sleep-stage coding and the hypnogram-derived statistics built on top of
//! it. [`SleepStage`] mirrors the original engine's `sleep_stage_t` values;
//! the submodules implement the edit, cycle, transition, flanking, density
//! and complexity analyses that operate on a scored sequence of stages.

pub mod cycles;
pub mod density;
pub mod derived;
pub mod edits;
pub mod flanking;
pub mod lzw;
pub mod stats;
pub mod transitions;

use serde::{Deserialize, Serialize};

/// One epoch's sleep-stage code. Variant order matches the original
/// `sleep_stage_t` enumeration; `Unscored` and `Unknown` are distinct:
/// `Unscored` means no source annotation covered the epoch at all, `Unknown`
/// means sources disagreed or a scorer explicitly coded ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    Wake,
    N1,
    N2,
    N3,
    N4,
    Rem,
    Movement,
    LightsOn,
    Artifact,
    Gap,
    Unknown,
    Unscored,
}

impl SleepStage {
    /// The canonical short textual code stored as the `SleepStage`
    /// annotation's instance id (`"W"`, `"N1"`, `"N2"`, `"N3"`, `"N4"`,
    /// `"R"`, `"M"`, `"L"`, `"A"`, `"G"`, `"?"`).
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            SleepStage::Wake => "W",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::N4 => "N4",
            SleepStage::Rem => "R",
            SleepStage::Movement => "M",
            SleepStage::LightsOn => "L",
            SleepStage::Artifact => "A",
            SleepStage::Gap => "G",
            SleepStage::Unknown => "?",
            SleepStage::Unscored => "?",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "W" => SleepStage::Wake,
            "N1" => SleepStage::N1,
            "N2" => SleepStage::N2,
            "N3" => SleepStage::N3,
            "N4" => SleepStage::N4,
            "R" | "REM" => SleepStage::Rem,
            "M" => SleepStage::Movement,
            "L" => SleepStage::LightsOn,
            "A" => SleepStage::Artifact,
            "G" => SleepStage::Gap,
            "?" => SleepStage::Unknown,
            _ => return None,
        })
    }

    #[must_use]
    pub fn is_rem(self) -> bool {
        matches!(self, SleepStage::Rem)
    }

    #[must_use]
    pub fn is_nrem(self) -> bool {
        matches!(self, SleepStage::N1 | SleepStage::N2 | SleepStage::N3 | SleepStage::N4)
    }

    #[must_use]
    pub fn is_sleep(self) -> bool {
        self.is_nrem() || self.is_rem()
    }

    #[must_use]
    pub fn is_wake(self) -> bool {
        matches!(self, SleepStage::Wake)
    }

    /// Epochs that carry no clinically meaningful stage: unscored, unknown,
    /// movement, lights-on, artifact.
    #[must_use]
    pub fn is_absent(self) -> bool {
        matches!(
            self,
            SleepStage::Unscored | SleepStage::Unknown | SleepStage::Movement | SleepStage::LightsOn | SleepStage::Artifact
        )
    }

    /// Collapse to the 5-class scheme used by most summary statistics:
    /// wake / N1 / N2 / N3-N4 / REM. Returns `None` for non-sleep codes.
    #[must_use]
    pub fn class5(self) -> Option<Class5> {
        Some(match self {
            SleepStage::Wake => Class5::Wake,
            SleepStage::N1 => Class5::N1,
            SleepStage::N2 => Class5::N2,
            SleepStage::N3 | SleepStage::N4 => Class5::N3,
            SleepStage::Rem => Class5::Rem,
            _ => return None,
        })
    }

    /// Collapse to the 3-class scheme: wake / NREM / REM.
    #[must_use]
    pub fn class3(self) -> Option<Class3> {
        Some(match self {
            SleepStage::Wake => Class3::Wake,
            SleepStage::N1 | SleepStage::N2 | SleepStage::N3 | SleepStage::N4 => Class3::Nrem,
            SleepStage::Rem => Class3::Rem,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class5 {
    Wake,
    N1,
    N2,
    N3,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class3 {
    Wake,
    Nrem,
    Rem,
}

/// An epoch-indexed scored hypnogram: the analysis unit every submodule in
/// this tree consumes. `epoch_sec` is the fixed epoch duration in seconds
/// (conventionally 30).
#[derive(Debug, Clone)]
pub struct HypnogramState {
    pub stages: Vec<SleepStage>,
    pub epoch_sec: f64,
}

impl HypnogramState {
    #[must_use]
    pub fn new(stages: Vec<SleepStage>, epoch_sec: f64) -> Self {
        Self { stages, epoch_sec }
    }

    #[must_use]
    pub fn num_epochs(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn epoch_minutes(&self) -> f64 {
        self.epoch_sec / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrips_through_from_code() {
        for stage in [SleepStage::Wake, SleepStage::N1, SleepStage::N2, SleepStage::N3, SleepStage::N4, SleepStage::Rem] {
            assert_eq!(SleepStage::from_code(stage.code()), Some(stage));
        }
    }

    #[test]
    fn class5_collapses_n3_n4() {
        assert_eq!(SleepStage::N3.class5(), Some(Class5::N3));
        assert_eq!(SleepStage::N4.class5(), Some(Class5::N3));
    }

    #[test]
    fn class3_collapses_all_nrem() {
        assert_eq!(SleepStage::N1.class3(), Some(Class3::Nrem));
        assert_eq!(SleepStage::N2.class3(), Some(Class3::Nrem));
    }

    #[test]
    fn absent_stages_are_not_sleep_or_wake() {
        assert!(!SleepStage::Unscored.is_sleep());
        assert!(!SleepStage::Unscored.is_wake());
        assert!(SleepStage::Unscored.is_absent());
    }
}
