//! Scene sources: fetch a scene by name and split it into script lines

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Extension of scene files read by [`FileSceneSource`]
pub const SCENE_EXTENSION: &str = "txt";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Scene not found: {0}")]
    NotFound(String),
    #[error("Failed to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Something that can deliver the lines of a scene
#[async_trait]
pub trait SceneSource: Send + Sync {
    async fn fetch(&self, scene: &str) -> Result<Vec<String>, SourceError>;
}

/// Split raw scene text into executable lines.
///
/// Lines are trimmed; blank lines and `;` comments are dropped.
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .map(str::to_string)
        .collect()
}

/// In-memory scenes, mainly for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemorySceneSource {
    scenes: HashMap<String, String>,
}

impl MemorySceneSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scene(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.scenes.insert(name.into(), content.into());
    }
}

#[async_trait]
impl SceneSource for MemorySceneSource {
    async fn fetch(&self, scene: &str) -> Result<Vec<String>, SourceError> {
        self.scenes
            .get(scene)
            .map(|content| split_lines(content))
            .ok_or_else(|| SourceError::NotFound(scene.to_string()))
    }
}

/// Scenes stored as `<dir>/<scene>.txt`
#[derive(Debug, Clone)]
pub struct FileSceneSource {
    base_path: PathBuf,
}

impl FileSceneSource {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn scene_path(&self, scene: &str) -> PathBuf {
        self.base_path.join(format!("{scene}.{SCENE_EXTENSION}"))
    }
}

#[async_trait]
impl SceneSource for FileSceneSource {
    async fn fetch(&self, scene: &str) -> Result<Vec<String>, SourceError> {
        let path = self.scene_path(scene);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(split_lines(&content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(scene.to_string()))
            }
            Err(source) => Err(SourceError::Io { path, source }),
        }
    }
}
