//! Shared course fixtures for unit tests.

use std::path::Path;

use serde_json::json;

use crate::models::{Difficulty, Lesson, LessonType, Manifest, Module, ModuleColor, ModuleStatus, QuizInfo};

/// A: Beginner (l1, l2), B: Intermediate (l3), C: Advanced (l4, l5).
pub fn manifest_json() -> String {
    json!({
        "modules": [
            {
                "id": "A", "title": "Budgeting", "description": "Plan your spending",
                "duration": "30 min", "difficulty": "Beginner", "icon": "wallet", "color": "green",
                "lessons": [
                    {"id": "l1", "title": "Why budget", "type": "reading", "duration": "10 min", "points": 100, "contentFile": "lessons/l1.json"},
                    {"id": "l2", "title": "The 50/30/20 rule", "type": "exercise", "duration": "15 min", "points": 150, "contentFile": "lessons/l2.json"}
                ],
                "quiz": {"id": "A-quiz", "title": "Budgeting Quiz", "duration": "10 min", "points": 200, "contentFile": "quizzes/A.json"}
            },
            {
                "id": "B", "title": "Saving", "description": "Build a cushion",
                "duration": "20 min", "difficulty": "Intermediate", "icon": "piggy-bank", "color": "blue",
                "lessons": [
                    {"id": "l3", "title": "Emergency funds", "type": "video", "duration": "12 min", "points": 200, "contentFile": "lessons/l3.json"}
                ],
                "quiz": {"id": "B-quiz", "title": "Saving Quiz", "duration": "10 min", "points": 250, "contentFile": "quizzes/B.json"}
            },
            {
                "id": "C", "title": "Investing", "description": "Grow your money",
                "duration": "40 min", "difficulty": "Advanced", "icon": "chart", "color": "purple",
                "lessons": [
                    {"id": "l4", "title": "Compound interest", "type": "reading", "duration": "15 min", "points": 300, "contentFile": "lessons/l4.json"},
                    {"id": "l5", "title": "Index funds", "type": "reading", "duration": "15 min", "points": 300, "contentFile": "lessons/l5.json"}
                ],
                "quiz": {"id": "C-quiz", "title": "Investing Quiz", "duration": "10 min", "points": 300, "contentFile": "quizzes/C.json"}
            }
        ]
    })
    .to_string()
}

pub fn modules() -> Vec<Module> {
    let manifest: Manifest = serde_json::from_str(&manifest_json()).unwrap();
    manifest.modules
}

fn quiz_json(title: &str) -> String {
    json!({
        "title": title,
        "duration": "10 min",
        "points": 200,
        "passingScore": 70,
        "questions": [
            {"id": 1, "type": "multiple-choice", "question": "How much should go to needs?",
             "options": ["20%", "50%", "80%"], "correct": 1, "explanation": "Half goes to needs."},
            {"id": 2, "type": "true-false", "question": "A budget is a spending plan.",
             "correct": true, "explanation": "It plans where money goes."}
        ]
    })
    .to_string()
}

/// Writes the manifest plus every lesson file and the quizzes of A and B.
pub fn write_course(dir: &Path) {
    std::fs::create_dir_all(dir.join("lessons")).unwrap();
    std::fs::create_dir_all(dir.join("quizzes")).unwrap();
    std::fs::write(dir.join("manifest.json"), manifest_json()).unwrap();

    for module in modules() {
        for lesson in &module.lessons {
            let body = json!({
                "title": format!("Lesson {}", lesson.id),
                "type": lesson.kind,
                "duration": lesson.duration,
                "points": lesson.points,
                "sections": [
                    {"type": "hero", "title": lesson.title},
                    {"type": "keypoints", "points": ["Spend less than you earn"]}
                ]
            });
            std::fs::write(dir.join(&lesson.content_file), body.to_string()).unwrap();
        }
    }
    std::fs::write(dir.join("quizzes/A.json"), quiz_json("Budgeting Quiz")).unwrap();
    std::fs::write(dir.join("quizzes/B.json"), quiz_json("Saving Quiz")).unwrap();
}

pub fn lesson(id: &str, points: u32) -> Lesson {
    Lesson {
        id: id.to_string(),
        title: format!("Lesson {}", id),
        kind: LessonType::Reading,
        duration: "10 min".to_string(),
        points,
        content_file: format!("lessons/{}.json", id),
    }
}

pub fn module(id: &str, difficulty: Difficulty, lessons: &[(&str, u32)], quiz_points: u32) -> Module {
    Module {
        id: id.to_string(),
        title: format!("Module {}", id),
        description: String::new(),
        duration: "30 min".to_string(),
        difficulty,
        icon: String::new(),
        color: ModuleColor::Neutral,
        status: ModuleStatus::Available,
        lessons: lessons.iter().map(|(id, points)| lesson(id, *points)).collect(),
        quiz: QuizInfo {
            id: format!("{}-quiz", id),
            title: format!("Quiz {}", id),
            duration: "5 min".to_string(),
            points: quiz_points,
            content_file: format!("quizzes/{}.json", id),
        },
    }
}
