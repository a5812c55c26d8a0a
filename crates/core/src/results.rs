use crate::backend::SessionFeedback;
use crate::labels;
use crate::phase::{ExamLevel, ExamPhase, Language};
use crate::scoring::Criteria;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score record for one completed part. Created once, when the part ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: ExamPhase,
    pub score: u32,
    pub criteria: Criteria,
    pub feedback: String,
    /// Wall-clock seconds from part start to advance.
    pub duration: u64,
}

/// SLE proficiency tier derived from the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallLevel {
    A,
    B,
    C,
    X,
}

impl OverallLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            75.. => OverallLevel::C,
            55.. => OverallLevel::B,
            35.. => OverallLevel::A,
            _ => OverallLevel::X,
        }
    }
}

impl fmt::Display for OverallLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallLevel::A => "A",
            OverallLevel::B => "B",
            OverallLevel::C => "C",
            OverallLevel::X => "X",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResults {
    pub overall_level: OverallLevel,
    pub overall_score: u32,
    pub average_criteria: Criteria,
    pub phases: Vec<PhaseResult>,
    pub total_duration: u64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub recommendation: String,
}

impl ExamResults {
    /// Combines the part results. Backend feedback wins over the localized
    /// fallback text field by field.
    pub fn aggregate(
        phases: Vec<PhaseResult>,
        feedback: Option<SessionFeedback>,
        language: Language,
    ) -> Self {
        let overall_score = mean(phases.iter().map(|p| p.score));
        let average_criteria = Criteria {
            fluency: mean(phases.iter().map(|p| p.criteria.fluency)),
            comprehension: mean(phases.iter().map(|p| p.criteria.comprehension)),
            vocabulary: mean(phases.iter().map(|p| p.criteria.vocabulary)),
            grammar: mean(phases.iter().map(|p| p.criteria.grammar)),
            pronunciation: mean(phases.iter().map(|p| p.criteria.pronunciation)),
        };
        let total_duration = phases.iter().map(|p| p.duration).sum();

        let feedback = feedback.unwrap_or_default();
        Self {
            overall_level: OverallLevel::from_score(overall_score),
            overall_score,
            average_criteria,
            phases,
            total_duration,
            strengths: feedback
                .strengths
                .unwrap_or_else(|| labels::fallback_strengths(language)),
            improvements: feedback
                .improvements
                .unwrap_or_else(|| labels::fallback_improvements(language)),
            recommendation: feedback
                .recommendation
                .unwrap_or_else(|| labels::fallback_recommendation(language).to_string()),
        }
    }

    pub fn passed(&self, target: ExamLevel) -> bool {
        self.overall_score >= target.pass_mark()
    }
}

/// Rounded arithmetic mean; zero for an empty list.
fn mean(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + v as u64, c + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(phase: ExamPhase, score: u32, duration: u64) -> PhaseResult {
        PhaseResult {
            phase,
            score,
            criteria: Criteria {
                fluency: score,
                comprehension: score,
                vocabulary: score,
                grammar: score,
                pronunciation: score,
            },
            feedback: String::new(),
            duration,
        }
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(OverallLevel::from_score(75), OverallLevel::C);
        assert_eq!(OverallLevel::from_score(74), OverallLevel::B);
        assert_eq!(OverallLevel::from_score(55), OverallLevel::B);
        assert_eq!(OverallLevel::from_score(54), OverallLevel::A);
        assert_eq!(OverallLevel::from_score(35), OverallLevel::A);
        assert_eq!(OverallLevel::from_score(34), OverallLevel::X);
    }

    #[test]
    fn aggregate_rounds_mean_and_sums_duration() {
        let phases = vec![
            result(ExamPhase::Part1, 70, 300),
            result(ExamPhase::Part2, 71, 420),
            result(ExamPhase::Part3, 80, 700),
            result(ExamPhase::Part4, 80, 720),
        ];
        let results = ExamResults::aggregate(phases.clone(), None, Language::En);
        // 301 / 4 = 75.25
        assert_eq!(results.overall_score, 75);
        assert_eq!(results.overall_level, OverallLevel::C);
        assert_eq!(results.total_duration, 2140);
        assert_eq!(results.phases.len(), 4);
        assert_eq!(results.average_criteria.grammar, 75);

        let again = ExamResults::aggregate(phases, None, Language::En);
        assert_eq!(again.overall_score, results.overall_score);
    }

    #[test]
    fn half_rounds_up() {
        let phases = vec![
            result(ExamPhase::Part1, 54, 1),
            result(ExamPhase::Part2, 55, 1),
        ];
        let results = ExamResults::aggregate(phases, None, Language::Fr);
        assert_eq!(results.overall_score, 55);
        assert_eq!(results.overall_level, OverallLevel::B);
    }

    #[test]
    fn backend_feedback_overrides_fallback() {
        let feedback = SessionFeedback {
            strengths: Some(vec!["Clear structure".into()]),
            improvements: None,
            recommendation: Some("Book a debate session".into()),
        };
        let results = ExamResults::aggregate(
            vec![result(ExamPhase::Part1, 60, 10)],
            Some(feedback),
            Language::En,
        );
        assert_eq!(results.strengths, vec!["Clear structure".to_string()]);
        assert_eq!(results.improvements, labels::fallback_improvements(Language::En));
        assert_eq!(results.recommendation, "Book a debate session");
    }

    #[test]
    fn pass_marks_depend_on_target() {
        let results = ExamResults::aggregate(
            vec![result(ExamPhase::Part1, 60, 10)],
            None,
            Language::En,
        );
        assert!(results.passed(ExamLevel::B));
        assert!(!results.passed(ExamLevel::C));
    }

    #[test]
    fn empty_results_score_zero() {
        let results = ExamResults::aggregate(vec![], None, Language::En);
        assert_eq!(results.overall_score, 0);
        assert_eq!(results.overall_level, OverallLevel::X);
    }
}
