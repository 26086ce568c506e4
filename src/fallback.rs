//! Placeholder content served when the content repository is unreachable.

use serde_json::{json, Map, Value};

use crate::models::{
    Answer, Difficulty, Lesson, LessonContent, LessonType, Manifest, Module, ModuleColor,
    ModuleStatus, Question, QuestionType, QuizContent, QuizInfo, Section, SectionKind,
};

pub const PLACEHOLDER_MODULE_ID: &str = "getting-started";
pub const PLACEHOLDER_LESSON_ID: &str = "getting-started-1";
pub const PLACEHOLDER_QUIZ_ID: &str = "getting-started-quiz";

const UNAVAILABLE: &str = "This content is temporarily unavailable. Please check back shortly.";

pub fn manifest() -> Manifest {
    Manifest {
        modules: vec![Module {
            id: PLACEHOLDER_MODULE_ID.to_string(),
            title: "Getting Started".to_string(),
            description: "An introduction to managing your money.".to_string(),
            duration: "10 min".to_string(),
            difficulty: Difficulty::Beginner,
            icon: "book".to_string(),
            color: ModuleColor::Blue,
            status: ModuleStatus::Available,
            lessons: vec![Lesson {
                id: PLACEHOLDER_LESSON_ID.to_string(),
                title: "Welcome".to_string(),
                kind: LessonType::Reading,
                duration: "5 min".to_string(),
                points: 100,
                content_file: "lessons/getting-started-1.json".to_string(),
            }],
            quiz: QuizInfo {
                id: PLACEHOLDER_QUIZ_ID.to_string(),
                title: "Getting Started Quiz".to_string(),
                duration: "5 min".to_string(),
                points: 100,
                content_file: "quizzes/getting-started.json".to_string(),
            },
        }],
    }
}

fn section(kind: SectionKind, body: Value) -> Section {
    let body = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Section { kind, body }
}

/// Keeps the manifest's title and points so the lesson still renders.
pub fn lesson_content(info: &Lesson) -> LessonContent {
    LessonContent {
        title: info.title.clone(),
        kind: info.kind,
        duration: info.duration.clone(),
        points: info.points,
        sections: vec![
            section(SectionKind::Hero, json!({ "title": info.title })),
            section(SectionKind::Content, json!({ "text": UNAVAILABLE })),
        ],
    }
}

pub fn quiz_content(info: &QuizInfo) -> QuizContent {
    QuizContent {
        title: info.title.clone(),
        duration: info.duration.clone(),
        points: info.points,
        passing_score: 70,
        questions: vec![Question {
            id: 1,
            kind: QuestionType::TrueFalse,
            question: "A budget helps you decide in advance where your money goes.".to_string(),
            options: Vec::new(),
            correct: Answer::Truth(true),
            explanation: UNAVAILABLE.to_string(),
        }],
    }
}
