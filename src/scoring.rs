//! Score aggregation: speaking statistics, achievements, quiz and reading
//! comprehension grading.

use serde::Serialize;

use crate::model::{QuizAnswer, QuizKind, QuizQuestion, ReadingQuestion};

/// Pronunciation scores at or above this (0..=10) count as a completed challenge.
pub const CHALLENGE_PASS_SCORE: f64 = 7.0;

/// Running pronunciation statistics for the session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingStats {
    pub total_recordings: u32,
    /// Running mean, rounded to a whole number after every update.
    pub average_score: f64,
    pub best_score: f64,
    pub challenges_completed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Achievement {
    FirstRecording,
    PersistentLearner,
    PronunciationMaster,
    ChallengeChampion,
    ConsistentExcellence,
}

impl Achievement {
    pub const ALL: [Achievement; 5] = [
        Achievement::FirstRecording,
        Achievement::PersistentLearner,
        Achievement::PronunciationMaster,
        Achievement::ChallengeChampion,
        Achievement::ConsistentExcellence,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Achievement::FirstRecording => "first-recording",
            Achievement::PersistentLearner => "persistent-learner",
            Achievement::PronunciationMaster => "pronunciation-master",
            Achievement::ChallengeChampion => "challenge-champion",
            Achievement::ConsistentExcellence => "consistent-excellence",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstRecording => "First Recording",
            Achievement::PersistentLearner => "Persistent Learner",
            Achievement::PronunciationMaster => "Pronunciation Master",
            Achievement::ChallengeChampion => "Challenge Champion",
            Achievement::ConsistentExcellence => "Consistent Excellence",
        }
    }

    fn unlocked_by(&self, stats: &SpeakingStats) -> bool {
        match self {
            Achievement::FirstRecording => stats.total_recordings == 1,
            Achievement::PersistentLearner => stats.total_recordings == 10,
            Achievement::PronunciationMaster => stats.best_score >= 9.0,
            Achievement::ChallengeChampion => stats.challenges_completed >= 3,
            Achievement::ConsistentExcellence => {
                stats.average_score >= 8.0 && stats.total_recordings >= 5
            }
        }
    }

    /// Text of the synthetic AI message announcing the unlock.
    pub fn announcement(&self) -> String {
        format!("🏆 Achievement unlocked: {}!", self.title())
    }
}

/// Unlocked achievements in unlock order. Grows only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AchievementSet(Vec<Achievement>);

impl AchievementSet {
    /// Returns `true` if the achievement was not already present.
    pub fn unlock(&mut self, achievement: Achievement) -> bool {
        if self.0.contains(&achievement) {
            return false;
        }
        self.0.push(achievement);
        true
    }

    pub fn contains(&self, achievement: Achievement) -> bool {
        self.0.contains(&achievement)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
        self.0.iter()
    }
}

/// Bring a raw collaborator score onto the 0..=10 scale. Anything above 10 is
/// read as a percentage.
pub fn canonical_score(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 10.0 { raw / 10.0 } else { raw };
    scaled.clamp(0.0, 10.0)
}

/// Fold one pronunciation score into the running statistics.
pub fn record_pronunciation(stats: &SpeakingStats, raw_score: f64) -> SpeakingStats {
    let score = canonical_score(raw_score);
    let n = stats.total_recordings as f64;
    let average = ((stats.average_score * n + score) / (n + 1.0)).round();

    SpeakingStats {
        total_recordings: stats.total_recordings + 1,
        average_score: average,
        best_score: stats.best_score.max(score),
        challenges_completed: stats.challenges_completed
            + u32::from(score >= CHALLENGE_PASS_SCORE),
    }
}

/// Unlock every achievement whose threshold `stats` now satisfies and return
/// the newly unlocked ones in definition order.
pub fn evaluate_achievements(stats: &SpeakingStats, set: &mut AchievementSet) -> Vec<Achievement> {
    Achievement::ALL
        .iter()
        .copied()
        .filter(|a| a.unlocked_by(stats))
        .filter(|a| set.unlock(*a))
        .collect()
}

/// `round(correct / total * 100)`, or 0 for an empty question set.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

fn quiz_answer_is_correct(question: &QuizQuestion, answer: Option<&QuizAnswer>) -> bool {
    match (question.kind, answer) {
        (_, None) => false,
        (QuizKind::MultipleChoice, Some(QuizAnswer::Choice(selected))) => question
            .options
            .iter()
            .position(|o| *o == question.correct_answer)
            .is_some_and(|correct| correct == *selected),
        (QuizKind::TrueFalse, Some(QuizAnswer::Text(text))) => *text == question.correct_answer,
        // Option index for a true/false question: compare the option text.
        (QuizKind::TrueFalse, Some(QuizAnswer::Choice(selected))) => question
            .options
            .get(*selected)
            .is_some_and(|o| *o == question.correct_answer),
        (QuizKind::MultipleChoice, Some(QuizAnswer::Text(_))) => false,
    }
}

/// Grade a quiz. Unanswered questions count as incorrect.
pub fn score_quiz(questions: &[QuizQuestion], answers: &[Option<QuizAnswer>]) -> u32 {
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(i, q)| quiz_answer_is_correct(q, answers.get(*i).and_then(|a| a.as_ref())))
        .count();
    percentage(correct, questions.len())
}

/// Grade a reading passage by comparing selected indices directly.
pub fn score_reading(questions: &[ReadingQuestion], answers: &[Option<usize>]) -> u32 {
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i).copied().flatten() == Some(q.correct_answer))
        .count();
    percentage(correct, questions.len())
}
