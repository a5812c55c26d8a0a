use serde::{Deserialize, Serialize};
use std::fmt;

/// The stages of one mock oral exam, in the only order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamPhase {
    Setup,
    Part1,
    Part2,
    Part3,
    Part4,
    Feedback,
}

/// The four timed parts, in order.
pub const EXAM_PARTS: [ExamPhase; 4] = [
    ExamPhase::Part1,
    ExamPhase::Part2,
    ExamPhase::Part3,
    ExamPhase::Part4,
];

impl ExamPhase {
    /// The phase that follows this one. `Feedback` is terminal.
    pub fn next(self) -> Option<ExamPhase> {
        match self {
            ExamPhase::Setup => Some(ExamPhase::Part1),
            ExamPhase::Part1 => Some(ExamPhase::Part2),
            ExamPhase::Part2 => Some(ExamPhase::Part3),
            ExamPhase::Part3 => Some(ExamPhase::Part4),
            ExamPhase::Part4 => Some(ExamPhase::Feedback),
            ExamPhase::Feedback => None,
        }
    }

    /// Nominal length of a timed part in seconds; `None` for setup and feedback.
    pub fn duration_secs(self) -> Option<u32> {
        match self {
            ExamPhase::Part1 => Some(360),
            ExamPhase::Part2 => Some(420),
            ExamPhase::Part3 | ExamPhase::Part4 => Some(720),
            ExamPhase::Setup | ExamPhase::Feedback => None,
        }
    }

    pub fn is_timed(self) -> bool {
        self.duration_secs().is_some()
    }

    /// 1-based part number for the timed parts.
    pub fn part_number(self) -> Option<u8> {
        EXAM_PARTS
            .iter()
            .position(|p| *p == self)
            .map(|i| i as u8 + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExamPhase::Setup => "setup",
            ExamPhase::Part1 => "part1",
            ExamPhase::Part2 => "part2",
            ExamPhase::Part3 => "part3",
            ExamPhase::Part4 => "part4",
            ExamPhase::Feedback => "feedback",
        }
    }
}

impl fmt::Display for ExamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target proficiency level chosen at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamLevel {
    B,
    C,
}

impl ExamLevel {
    /// Minimum overall score that counts as a pass for this target.
    pub fn pass_mark(self) -> u32 {
        match self {
            ExamLevel::B => 55,
            ExamLevel::C => 70,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExamLevel::B => "B",
            ExamLevel::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
        }
    }
}

/// Coaching personas available to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoachKey {
    Steven,
    Preciosa,
}

impl CoachKey {
    pub fn as_str(self) -> &'static str {
        match self {
            CoachKey::Steven => "STEVEN",
            CoachKey::Preciosa => "PRECIOSA",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CoachKey::Steven => "Coach Steven",
            CoachKey::Preciosa => "Coach Preciosa",
        }
    }

    /// Steven coaches French oral, Preciosa coaches English oral.
    pub fn language(self) -> Language {
        match self {
            CoachKey::Steven => Language::Fr,
            CoachKey::Preciosa => Language::En,
        }
    }
}

/// Chosen once at setup and fixed for the rest of the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamConfig {
    pub level: ExamLevel,
    pub coach: CoachKey,
    pub language: Language,
}

impl ExamConfig {
    pub fn for_coach(level: ExamLevel, coach: CoachKey) -> Self {
        Self {
            level,
            coach,
            language: coach.language(),
        }
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self::for_coach(ExamLevel::B, CoachKey::Steven)
    }
}
