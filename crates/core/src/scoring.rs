//! Per-part scores.
//!
//! Real evaluation is not available from the backend yet, so every completed
//! part is scored by a [`PhaseScorer`]. [`SyntheticScorer`] invents plausible
//! numbers and must be read as synthetic: it says nothing about the learner.

use crate::phase::ExamPhase;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// The five named sub-scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Criteria {
    pub fluency: u32,
    pub comprehension: u32,
    pub vocabulary: u32,
    pub grammar: u32,
    pub pronunciation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseScores {
    pub score: u32,
    pub criteria: Criteria,
}

pub trait PhaseScorer: Send {
    fn score(&mut self, phase: ExamPhase) -> PhaseScores;
}

/// Uniformly random placeholder scores.
pub struct SyntheticScorer {
    rng: StdRng,
}

impl SyntheticScorer {
    const OVERALL: RangeInclusive<f64> = 60.0..=90.0;
    const FLUENCY: RangeInclusive<f64> = 55.0..=90.0;
    const COMPREHENSION: RangeInclusive<f64> = 60.0..=90.0;
    const VOCABULARY: RangeInclusive<f64> = 55.0..=90.0;
    const GRAMMAR: RangeInclusive<f64> = 50.0..=90.0;
    const PRONUNCIATION: RangeInclusive<f64> = 55.0..=90.0;

    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn draw(&mut self, range: RangeInclusive<f64>) -> u32 {
        self.rng.gen_range(range).round() as u32
    }
}

impl Default for SyntheticScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseScorer for SyntheticScorer {
    fn score(&mut self, phase: ExamPhase) -> PhaseScores {
        let scores = PhaseScores {
            score: self.draw(Self::OVERALL),
            criteria: Criteria {
                fluency: self.draw(Self::FLUENCY),
                comprehension: self.draw(Self::COMPREHENSION),
                vocabulary: self.draw(Self::VOCABULARY),
                grammar: self.draw(Self::GRAMMAR),
                pronunciation: self.draw(Self::PRONUNCIATION),
            },
        };
        tracing::debug!("Synthetic score for {}: {:?}", phase, scores);
        scores
    }
}

/// Hands out a fixed sequence of overall scores, cycling when exhausted.
/// Sub-scores mirror the overall score.
pub struct FixedScorer {
    scores: Vec<u32>,
    next: usize,
}

impl FixedScorer {
    pub fn new(scores: Vec<u32>) -> Self {
        Self { scores, next: 0 }
    }
}

impl PhaseScorer for FixedScorer {
    fn score(&mut self, _phase: ExamPhase) -> PhaseScores {
        let score = if self.scores.is_empty() {
            0
        } else {
            self.scores[self.next % self.scores.len()]
        };
        self.next += 1;
        PhaseScores {
            score,
            criteria: Criteria {
                fluency: score,
                comprehension: score,
                vocabulary: score,
                grammar: score,
                pronunciation: score,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_scores_stay_in_their_bands() {
        let mut scorer = SyntheticScorer::seeded(7);
        for _ in 0..200 {
            let s = scorer.score(ExamPhase::Part2);
            assert!((60..=90).contains(&s.score));
            assert!((55..=90).contains(&s.criteria.fluency));
            assert!((60..=90).contains(&s.criteria.comprehension));
            assert!((55..=90).contains(&s.criteria.vocabulary));
            assert!((50..=90).contains(&s.criteria.grammar));
            assert!((55..=90).contains(&s.criteria.pronunciation));
        }
    }

    #[test]
    fn fixed_scorer_cycles() {
        let mut scorer = FixedScorer::new(vec![70, 80]);
        assert_eq!(scorer.score(ExamPhase::Part1).score, 70);
        assert_eq!(scorer.score(ExamPhase::Part2).score, 80);
        assert_eq!(scorer.score(ExamPhase::Part3).score, 70);
    }
}
