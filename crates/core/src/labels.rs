//! Localized strings the engine needs when the backend is silent.

use crate::phase::{ExamPhase, Language};

pub fn fallback_greeting(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "Bonjour ! Bienvenue à votre simulation d'examen oral. Commençons par la partie échauffement. Parlez-moi de votre travail actuel."
        }
        Language::En => {
            "Hello! Welcome to your oral exam simulation. Let's start with the warm-up. Tell me about your current work."
        }
    }
}

pub fn fallback_strengths(language: Language) -> Vec<String> {
    let items: [&str; 2] = match language {
        Language::Fr => [
            "Bonne compréhension des questions",
            "Vocabulaire professionnel approprié",
        ],
        Language::En => [
            "Good understanding of questions",
            "Appropriate professional vocabulary",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fallback_improvements(language: Language) -> Vec<String> {
    let items: [&str; 2] = match language {
        Language::Fr => [
            "Travailler la fluidité des réponses longues",
            "Varier les structures grammaticales",
        ],
        Language::En => [
            "Work on fluency in longer responses",
            "Vary grammatical structures",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fallback_recommendation(language: Language) -> &'static str {
    match language {
        Language::Fr => {
            "Continuez à pratiquer régulièrement. Concentrez-vous sur les parties III et IV."
        }
        Language::En => "Keep practicing regularly. Focus on Parts III and IV.",
    }
}

pub fn phase_title(phase: ExamPhase, language: Language) -> &'static str {
    match (phase, language) {
        (ExamPhase::Part1, Language::Fr) => "Partie I — Échauffement",
        (ExamPhase::Part1, Language::En) => "Part I — Warm-up",
        (ExamPhase::Part2, Language::Fr) => "Partie II — Écoute",
        (ExamPhase::Part2, Language::En) => "Part II — Listening",
        (ExamPhase::Part3, Language::Fr) => "Partie III — Réponse étendue",
        (ExamPhase::Part3, Language::En) => "Part III — Extended Response",
        (ExamPhase::Part4, Language::Fr) => "Partie IV — Débat",
        (ExamPhase::Part4, Language::En) => "Part IV — Debate",
        (ExamPhase::Setup, Language::Fr) => "Configuration",
        (ExamPhase::Setup, Language::En) => "Setup",
        (ExamPhase::Feedback, Language::Fr) => "Résultats de la simulation",
        (ExamPhase::Feedback, Language::En) => "Simulation Results",
    }
}

pub fn verdict(passed: bool, language: Language) -> &'static str {
    match (passed, language) {
        (true, Language::Fr) => "Réussi",
        (true, Language::En) => "Passed",
        (false, Language::Fr) => "À améliorer",
        (false, Language::En) => "Needs Improvement",
    }
}
