use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};

use crate::error::ContentError;
use crate::fallback;
use crate::models::{Lesson, LessonContent, Manifest, Module, QuizContent, QuizInfo};

pub const MANIFEST_PATH: &str = "manifest.json";

/// Where course JSON lives: a static file server or a local directory.
#[derive(Clone)]
pub enum ContentSource {
    Http { base: Url, client: reqwest::Client },
    Dir(PathBuf),
}

impl ContentSource {
    pub fn from_location(location: &str) -> Result<Self, ContentError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            // Url::join drops the last segment unless the base ends with '/'.
            let normalized = if location.ends_with('/') {
                location.to_string()
            } else {
                format!("{}/", location)
            };
            let base = Url::parse(&normalized)
                .map_err(|_| ContentError::InvalidPath(location.to_string()))?;
            Ok(ContentSource::Http {
                base,
                client: reqwest::Client::new(),
            })
        } else {
            Ok(ContentSource::Dir(PathBuf::from(location)))
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ContentError> {
        check_relative(path)?;
        match self {
            ContentSource::Http { base, client } => {
                let url = base
                    .join(path)
                    .map_err(|_| ContentError::InvalidPath(path.to_string()))?;
                let resp = client.get(url).send().await?;
                if !resp.status().is_success() {
                    return Err(ContentError::Status {
                        path: path.to_string(),
                        status: resp.status().as_u16(),
                    });
                }
                Ok(resp.bytes().await?.to_vec())
            }
            ContentSource::Dir(root) => Ok(tokio::fs::read(root.join(path)).await?),
        }
    }
}

fn check_relative(path: &str) -> Result<(), ContentError> {
    let ok = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(ContentError::InvalidPath(path.to_string()))
    }
}

/// `placeholder` is set when `content` is the fallback document, which is
/// for display only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonView {
    pub info: Lesson,
    pub content: LessonContent,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizView {
    pub info: QuizInfo,
    pub content: QuizContent,
    pub placeholder: bool,
}

/// Loads course content on demand and keeps what it has parsed.
///
/// Built once at startup and shared behind an `Arc`. The manifest is fetched
/// at most once per process; lesson and quiz documents are cached by content
/// path. Fallback records are never cached, so a later call can still pick
/// up the real content once the source recovers.
pub struct ContentAccessor {
    source: ContentSource,
    manifest: OnceCell<Arc<[Module]>>,
    lessons: RwLock<HashMap<String, Arc<LessonContent>>>,
    quizzes: RwLock<HashMap<String, Arc<QuizContent>>>,
}

impl ContentAccessor {
    pub fn new(source: ContentSource) -> Self {
        Self {
            source,
            manifest: OnceCell::new(),
            lessons: RwLock::new(HashMap::new()),
            quizzes: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ContentError> {
        let bytes = self.source.fetch(path).await?;
        serde_json::from_slice(&bytes).map_err(|source| ContentError::Json {
            path: path.to_string(),
            source,
        })
    }

    async fn cached<T: DeserializeOwned>(
        &self,
        cache: &RwLock<HashMap<String, Arc<T>>>,
        path: &str,
    ) -> Result<Arc<T>, ContentError> {
        if let Some(doc) = cache.read().await.get(path) {
            return Ok(Arc::clone(doc));
        }
        debug!("fetching {}", path);
        let doc = Arc::new(self.fetch_json::<T>(path).await?);
        // Two concurrent misses both fetch; the first insert wins.
        let mut cache = cache.write().await;
        Ok(Arc::clone(cache.entry(path.to_string()).or_insert(doc)))
    }

    pub async fn try_modules(&self) -> Result<Arc<[Module]>, ContentError> {
        let modules = self
            .manifest
            .get_or_try_init(|| async {
                let manifest: Manifest = self.fetch_json(MANIFEST_PATH).await?;
                info!("loaded manifest with {} modules", manifest.modules.len());
                Ok::<_, ContentError>(Arc::from(manifest.modules))
            })
            .await?;
        Ok(Arc::clone(modules))
    }

    pub async fn modules(&self) -> Arc<[Module]> {
        match self.try_modules().await {
            Ok(modules) => modules,
            Err(e) => {
                warn!("manifest unavailable, serving placeholder module: {}", e);
                Arc::from(fallback::manifest().modules)
            }
        }
    }

    pub async fn module(&self, module_id: &str) -> Option<Module> {
        self.modules()
            .await
            .iter()
            .find(|m| m.id == module_id)
            .cloned()
    }

    pub async fn lesson(&self, module_id: &str, lesson_id: &str) -> Option<LessonView> {
        let module = self.module(module_id).await?;
        let info = module.lesson(lesson_id)?.clone();

        let (content, placeholder) = match self.cached(&self.lessons, &info.content_file).await {
            Ok(doc) => ((*doc).clone(), false),
            Err(e) => {
                warn!("lesson {} unavailable, serving placeholder: {}", info.id, e);
                (fallback::lesson_content(&info), true)
            }
        };
        Some(LessonView {
            info,
            content,
            placeholder,
        })
    }

    pub async fn quiz(&self, module_id: &str) -> Option<QuizView> {
        let info = self.module(module_id).await?.quiz;

        let (content, placeholder) = match self.cached(&self.quizzes, &info.content_file).await {
            Ok(doc) => ((*doc).clone(), false),
            Err(e) => {
                warn!("quiz {} unavailable, serving placeholder: {}", info.id, e);
                (fallback::quiz_content(&info), true)
            }
        };
        Some(QuizView {
            info,
            content,
            placeholder,
        })
    }
}
