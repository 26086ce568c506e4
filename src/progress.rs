use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::Serialize;

use crate::content::ContentAccessor;
use crate::models::{Module, QuizResult, UserProgress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub total_points: u32,
    pub earned_points: u32,
    pub overall_percentage: u32,
    pub module_progress: BTreeMap<String, u32>,
}

impl ProgressData {
    /// Shown when the course content cannot be loaded at all.
    pub fn fallback() -> Self {
        Self {
            total_lessons: 30,
            completed_lessons: 0,
            total_points: 3000,
            earned_points: 0,
            overall_percentage: 0,
            module_progress: BTreeMap::new(),
        }
    }
}

/// Rounded percentage, 0 when there is nothing to complete.
pub fn percentage(done: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(done) * 100.0 / f64::from(total)).round() as u32;
    pct.min(100)
}

/// Derives course progress from a user's completion records.
///
/// Percentages (per module and overall) count lessons only. A quiz record
/// adds the quiz's points to `earned_points` but never moves a percentage.
pub fn calculate_progress(
    modules: &[Module],
    completed_concepts: &BTreeSet<String>,
    completed_quizzes: &BTreeMap<String, QuizResult>,
) -> ProgressData {
    let mut data = ProgressData {
        total_lessons: 0,
        completed_lessons: 0,
        total_points: 0,
        earned_points: 0,
        overall_percentage: 0,
        module_progress: BTreeMap::new(),
    };

    for module in modules {
        let mut module_done = 0u32;

        for lesson in &module.lessons {
            data.total_lessons += 1;
            data.total_points = data.total_points.saturating_add(lesson.points);

            if completed_concepts.contains(&lesson.id) {
                module_done += 1;
                data.earned_points = data.earned_points.saturating_add(lesson.points);
            }
        }

        data.total_points = data.total_points.saturating_add(module.quiz.points);
        if completed_quizzes.contains_key(&module.quiz.id) {
            data.earned_points = data.earned_points.saturating_add(module.quiz.points);
        }

        data.completed_lessons += module_done;
        data.module_progress.insert(
            module.id.clone(),
            percentage(module_done, module.lessons.len() as u32),
        );
    }

    data.overall_percentage = percentage(data.completed_lessons, data.total_lessons);
    data
}

/// Progress for one user against the live manifest.
pub async fn progress_for(content: &ContentAccessor, user: &UserProgress) -> ProgressData {
    match content.try_modules().await {
        Ok(modules) => calculate_progress(
            &modules,
            &user.completed_concepts,
            &user.completed_quizzes,
        ),
        Err(e) => {
            warn!("progress for {} falls back, content unavailable: {}", user.user_id, e);
            ProgressData::fallback()
        }
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
