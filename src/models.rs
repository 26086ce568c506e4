use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnlockError;
use crate::streak::{calculate_streak, parse_login_date, StreakUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    #[serde(other)]
    Unknown,
}

impl Difficulty {
    /// Gating order. Unknown difficulties sort after every known tier.
    pub fn tier(self) -> u8 {
        match self {
            Difficulty::Beginner => 0,
            Difficulty::Intermediate => 1,
            Difficulty::Advanced => 2,
            Difficulty::Unknown => u8::MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleStatus {
    #[default]
    Available,
    ComingSoon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleColor {
    Blue,
    Green,
    Purple,
    Orange,
    Red,
    Yellow,
    Teal,
    Pink,
    #[default]
    #[serde(other)]
    Neutral,
}

impl ModuleColor {
    /// Pre-defined accent token for the presentation layer.
    pub fn style_token(self) -> &'static str {
        match self {
            ModuleColor::Blue => "accent-blue",
            ModuleColor::Green => "accent-green",
            ModuleColor::Purple => "accent-purple",
            ModuleColor::Orange => "accent-orange",
            ModuleColor::Red => "accent-red",
            ModuleColor::Yellow => "accent-yellow",
            ModuleColor::Teal => "accent-teal",
            ModuleColor::Pink => "accent-pink",
            ModuleColor::Neutral => "accent-neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Reading,
    Quiz,
    Exercise,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonType,
    pub duration: String,
    pub points: u32,
    pub content_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInfo {
    pub id: String,
    pub title: String,
    pub duration: String,
    pub points: u32,
    pub content_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: ModuleColor,
    #[serde(default)]
    pub status: ModuleStatus,
    pub lessons: Vec<Lesson>,
    pub quiz: QuizInfo,
}

impl Module {
    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Content,
    Keypoints,
    Actionsteps,
    Protip,
    Calculator,
    Resources,
    #[serde(other)]
    Other,
}

/// A renderable block of lesson content. Only the tag is interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: LessonType,
    pub duration: String,
    pub points: u32,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
}

/// Option index for multiple choice, a boolean for true/false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(usize),
    Truth(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct: Answer,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizContent {
    pub title: String,
    pub duration: String,
    pub points: u32,
    pub passing_score: u32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockReceipt {
    pub module_id: String,
    pub cost: u32,
    pub balance: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub completed_concepts: BTreeSet<String>,
    #[serde(default, deserialize_with = "deserialize_quiz_records")]
    pub completed_quizzes: BTreeMap<String, QuizResult>,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub learning_streak: u32,
    #[serde(default, deserialize_with = "deserialize_login_date")]
    pub last_login_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unlocked_modules: BTreeSet<String>,
}

impl UserProgress {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
            completed_concepts: BTreeSet::new(),
            completed_quizzes: BTreeMap::new(),
            total_points: 0,
            learning_streak: 0,
            last_login_date: None,
            unlocked_modules: BTreeSet::new(),
        }
    }

    /// Marks a lesson complete. Points are only awarded the first time.
    pub fn complete_lesson(&mut self, lesson: &Lesson) -> bool {
        let newly = self.completed_concepts.insert(lesson.id.clone());
        if newly {
            self.total_points = self.total_points.saturating_add(lesson.points);
        }
        newly
    }

    /// Records a passing quiz score, keeping the best one seen.
    /// Returns true when this is the first recorded pass.
    pub fn record_quiz(&mut self, quiz_id: &str, score: u32, points: u32) -> bool {
        match self.completed_quizzes.get_mut(quiz_id) {
            Some(existing) => {
                existing.score = existing.score.max(score);
                false
            }
            None => {
                self.completed_quizzes
                    .insert(quiz_id.to_string(), QuizResult { score });
                self.total_points = self.total_points.saturating_add(points);
                true
            }
        }
    }

    pub fn apply_login<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> StreakUpdate {
        let update = calculate_streak(self.last_login_date, self.learning_streak, now.clone());
        self.learning_streak = update.streak;
        self.last_login_date = Some(now.with_timezone(&Utc));
        update
    }

    /// Check-and-deduct in one step. `&mut self` makes it exclusive.
    pub fn spend_for_unlock(&mut self, module_id: &str, cost: u32) -> Result<UnlockReceipt, UnlockError> {
        if self.unlocked_modules.contains(module_id) {
            return Err(UnlockError::AlreadyUnlocked(module_id.to_string()));
        }
        let balance = self
            .total_points
            .checked_sub(cost)
            .ok_or(UnlockError::InsufficientPoints {
                needed: cost,
                available: self.total_points,
            })?;
        self.total_points = balance;
        self.unlocked_modules.insert(module_id.to_string());
        Ok(UnlockReceipt {
            module_id: module_id.to_string(),
            cost,
            balance,
        })
    }
    /// Folds a copy written elsewhere (the local fallback) into this one.
    /// Sets are unioned and quiz scores keep the best.
    ///
    /// If `other` holds everything this record has, it continued from it and
    /// its balance is the newer one. If the two share nothing, `other` started
    /// empty and its balance is added. Otherwise the larger balance is kept,
    /// so no item is credited twice.
    pub fn absorb(&mut self, other: UserProgress) {
        let continues = self.completed_concepts.is_subset(&other.completed_concepts)
            && self.unlocked_modules.is_subset(&other.unlocked_modules)
            && self.completed_quizzes.keys().all(|id| other.completed_quizzes.contains_key(id));
        let disjoint = self.completed_concepts.is_disjoint(&other.completed_concepts)
            && self.unlocked_modules.is_disjoint(&other.unlocked_modules)
            && !self.completed_quizzes.keys().any(|id| other.completed_quizzes.contains_key(id));

        self.total_points = if continues {
            other.total_points
        } else if disjoint {
            self.total_points.saturating_add(other.total_points)
        } else {
            self.total_points.max(other.total_points)
        };

        if other.last_login_date > self.last_login_date {
            self.last_login_date = other.last_login_date;
            self.learning_streak = other.learning_streak;
        }
        if other.email.is_some() {
            self.email = other.email;
        }
        if other.display_name.is_some() {
            self.display_name = other.display_name;
        }

        self.completed_concepts.extend(other.completed_concepts);
        self.unlocked_modules.extend(other.unlocked_modules);
        for (quiz_id, result) in other.completed_quizzes {
            let best = self.completed_quizzes.entry(quiz_id).or_insert(result);
            best.score = best.score.max(result.score);
        }
    }
}

/// Converts `"<quizId>:<score>"` entries into structured records.
pub fn parse_legacy_quiz_records<'a>(
    entries: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, QuizResult> {
    let mut records = BTreeMap::new();
    for entry in entries {
        let (quiz_id, score) = match entry.rsplit_once(':') {
            Some((id, score)) => (id, score.trim().parse().unwrap_or(0)),
            None => (entry, 0),
        };
        if quiz_id.is_empty() {
            continue;
        }
        let record = records
            .entry(quiz_id.to_string())
            .or_insert(QuizResult { score });
        record.score = record.score.max(score);
    }
    records
}

fn deserialize_quiz_records<'de, D>(deserializer: D) -> Result<BTreeMap<String, QuizResult>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Records {
        Structured(BTreeMap<String, QuizResult>),
        Legacy(Vec<String>),
    }

    Ok(match Records::deserialize(deserializer)? {
        Records::Structured(map) => map,
        Records::Legacy(entries) => parse_legacy_quiz_records(entries.iter().map(String::as_str)),
    })
}

/// Older records store plain dates; anything unparseable counts as no login.
fn deserialize_login_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_login_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, points: u32) -> Lesson {
        Lesson {
            id: id.to_string(),
            title: id.to_string(),
            kind: LessonType::Reading,
            duration: "5 min".to_string(),
            points,
            content_file: format!("lessons/{}.json", id),
        }
    }

    #[test]
    fn test_manifest_wire_format() {
        let json = r#"{
            "modules": [{
                "id": "budgeting",
                "title": "Budgeting Basics",
                "description": "Where your money goes",
                "duration": "45 min",
                "difficulty": "Beginner",
                "icon": "wallet",
                "color": "green",
                "lessons": [{
                    "id": "budgeting-1",
                    "title": "Why budget",
                    "type": "reading",
                    "duration": "10 min",
                    "points": 100,
                    "contentFile": "lessons/budgeting-1.json"
                }],
                "quiz": {
                    "id": "budgeting-quiz",
                    "title": "Budgeting Quiz",
                    "duration": "10 min",
                    "points": 200,
                    "contentFile": "quizzes/budgeting.json"
                }
            }, {
                "id": "crypto",
                "title": "Crypto",
                "description": "Soon",
                "duration": "1 h",
                "difficulty": "Expert",
                "icon": "coin",
                "color": "chartreuse",
                "status": "coming-soon",
                "lessons": [],
                "quiz": {
                    "id": "crypto-quiz",
                    "title": "Crypto Quiz",
                    "duration": "5 min",
                    "points": 50,
                    "contentFile": "quizzes/crypto.json"
                }
            }]
        }"#;

        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let budgeting = &manifest.modules[0];
        assert_eq!(budgeting.difficulty, Difficulty::Beginner);
        assert_eq!(budgeting.status, ModuleStatus::Available);
        assert_eq!(budgeting.color.style_token(), "accent-green");
        assert_eq!(budgeting.lesson("budgeting-1").unwrap().points, 100);
        assert!(budgeting.lesson("missing").is_none());

        let crypto = &manifest.modules[1];
        assert_eq!(crypto.difficulty, Difficulty::Unknown);
        assert_eq!(crypto.status, ModuleStatus::ComingSoon);
        assert_eq!(crypto.color, ModuleColor::Neutral);
    }

    #[test]
    fn test_sections_keep_their_body() {
        let json = r#"{
            "title": "Why budget",
            "type": "reading",
            "duration": "10 min",
            "points": 100,
            "sections": [
                {"type": "hero", "heading": "Take control"},
                {"type": "keypoints", "items": ["a", "b"]},
                {"type": "infographic", "src": "x.png"}
            ]
        }"#;
        let content: LessonContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.sections.len(), 3);
        assert_eq!(content.sections[0].kind, SectionKind::Hero);
        assert_eq!(content.sections[0].body["heading"], "Take control");
        assert_eq!(content.sections[2].kind, SectionKind::Other);
    }

    #[test]
    fn test_question_answers() {
        let json = r#"[
            {"id": 1, "type": "multiple-choice", "question": "q", "options": ["a", "b"], "correct": 1, "explanation": "e"},
            {"id": 2, "type": "true-false", "question": "q", "correct": false}
        ]"#;
        let questions: Vec<Question> = serde_json::from_str(json).unwrap();
        assert_eq!(questions[0].correct, Answer::Choice(1));
        assert_eq!(questions[1].correct, Answer::Truth(false));
        assert!(questions[1].options.is_empty());
    }

    #[test]
    fn test_legacy_quiz_records_are_structured() {
        let json = r#"{
            "userId": "u1",
            "completedQuizzes": ["budgeting-quiz:80", "budgeting-quiz:95", "saving-quiz:70", "odd"]
        }"#;
        let user: UserProgress = serde_json::from_str(json).unwrap();
        assert_eq!(user.completed_quizzes["budgeting-quiz"].score, 95);
        assert_eq!(user.completed_quizzes["saving-quiz"].score, 70);
        assert_eq!(user.completed_quizzes["odd"].score, 0);

        let round: UserProgress =
            serde_json::from_str(&serde_json::to_string(&user).unwrap()).unwrap();
        assert_eq!(round, user);
    }

    #[test]
    fn test_login_date_formats() {
        let user: UserProgress =
            serde_json::from_str(r#"{"userId": "u1", "lastLoginDate": "2024-03-10"}"#).unwrap();
        assert_eq!(
            user.last_login_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap())
        );

        let user: UserProgress =
            serde_json::from_str(r#"{"userId": "u1", "lastLoginDate": "yesterday"}"#).unwrap();
        assert!(user.last_login_date.is_none());
    }

    #[test]
    fn test_apply_login_stores_date() {
        let mut user = UserProgress::new("u1");
        user.learning_streak = 4;
        user.last_login_date = Some(Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap());

        let update = user.apply_login(Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap());
        assert_eq!(update.streak, 5);
        assert_eq!(user.learning_streak, 5);
        assert_eq!(
            user.last_login_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_complete_lesson_awards_points_once() {
        let mut user = UserProgress::new("u1");
        let l1 = lesson("l1", 100);
        assert!(user.complete_lesson(&l1));
        assert!(!user.complete_lesson(&l1));
        assert_eq!(user.total_points, 100);
        assert_eq!(user.completed_concepts.len(), 1);
    }

    #[test]
    fn test_record_quiz_keeps_best_score() {
        let mut user = UserProgress::new("u1");
        assert!(user.record_quiz("q", 80, 200));
        assert!(!user.record_quiz("q", 70, 200));
        assert!(!user.record_quiz("q", 90, 200));
        assert_eq!(user.completed_quizzes["q"].score, 90);
        assert_eq!(user.total_points, 200);
    }

    #[test]
    fn test_spend_for_unlock() {
        let mut user = UserProgress::new("u1");
        user.total_points = 1000;

        let receipt = user.spend_for_unlock("B", 800).unwrap();
        assert_eq!(receipt.balance, 200);
        assert!(user.unlocked_modules.contains("B"));

        assert!(matches!(
            user.spend_for_unlock("B", 800),
            Err(UnlockError::AlreadyUnlocked(_))
        ));
        assert!(matches!(
            user.spend_for_unlock("C", 800),
            Err(UnlockError::InsufficientPoints { needed: 800, available: 200 })
        ));
        assert_eq!(user.total_points, 200);
        assert!(!user.unlocked_modules.contains("C"));
    }

    #[test]
    fn test_absorb_continued_copy_takes_its_balance() {
        let mut stored = UserProgress::new("u1");
        stored.complete_lesson(&lesson("l1", 100));

        let mut local = stored.clone();
        local.complete_lesson(&lesson("l2", 50));
        local.total_points = 1000;
        local.spend_for_unlock("B", 800).unwrap();
        local.apply_login(Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap());

        stored.absorb(local);
        assert_eq!(stored.total_points, 200);
        assert_eq!(stored.completed_concepts.len(), 2);
        assert!(stored.unlocked_modules.contains("B"));
        assert_eq!(stored.learning_streak, 1);
    }

    #[test]
    fn test_absorb_fresh_copy_adds_its_balance() {
        let mut stored = UserProgress::new("u1");
        stored.complete_lesson(&lesson("l1", 100));
        stored.record_quiz("q", 70, 200);

        let mut local = UserProgress::new("u1");
        local.complete_lesson(&lesson("l2", 50));
        local.email = Some("ada@example.com".to_string());

        stored.absorb(local);
        assert_eq!(stored.total_points, 350);
        assert_eq!(stored.completed_concepts.len(), 2);
        assert_eq!(stored.completed_quizzes["q"].score, 70);
        assert_eq!(stored.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_absorb_overlapping_copy_never_double_credits() {
        let mut stored = UserProgress::new("u1");
        stored.complete_lesson(&lesson("l1", 100));
        stored.complete_lesson(&lesson("l2", 100));
        stored.record_quiz("q", 70, 200);

        let mut local = UserProgress::new("u1");
        local.complete_lesson(&lesson("l1", 100));
        local.complete_lesson(&lesson("l3", 100));
        local.record_quiz("q", 90, 200);

        stored.absorb(local);
        assert_eq!(stored.total_points, 400);
        assert_eq!(stored.completed_concepts.len(), 3);
        assert_eq!(stored.completed_quizzes["q"].score, 90);
    }
}
