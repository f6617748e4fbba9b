//! Posts and comments persisted as one pretty-printed JSON document.
//!
//! Every call reloads the document from disk. Mutations hold `write_lock`
//! across their load-modify-save cycle so concurrent likes are never lost.

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;

use crate::error::AppError;

/// Author recorded when none is given.
pub const ANONYMOUS: &str = "Anonymous";

const POST_ID_SUFFIX: usize = 6;
const COMMENT_ID_SUFFIX: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub image_url: String,
    pub description: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub likes: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ContentStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl ContentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the document (and its parent directories) as an empty list if
    /// it does not exist yet.
    pub async fn init(&self) -> io::Result<()> {
        if tokio::fs::try_exists(self.path.as_path()).await? {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(self.path.as_path(), b"[]\n").await?;
        tracing::info!("Initialized empty posts file at {}", self.path.display());
        Ok(())
    }

    /// All posts, newest first. An unreadable document reads as empty.
    pub async fn load_all(&self) -> Vec<Post> {
        match self.read().await {
            Ok(mut posts) => {
                posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                posts
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub async fn create_post(
        &self,
        image_url: &str,
        description: &str,
        author: Option<&str>,
    ) -> Result<Post, AppError> {
        if image_url.trim().is_empty() || description.trim().is_empty() {
            return Err(AppError::invalid("imageUrl and description are required"));
        }

        let post = Post {
            id: generate_id(POST_ID_SUFFIX),
            image_url: image_url.to_string(),
            description: description.to_string(),
            author: author_or_default(author),
            created_at: Utc::now(),
            likes: 0,
            comments: Vec::new(),
        };

        let _guard = self.write_lock.lock().await;
        let mut posts = self.read().await?;
        posts.push(post.clone());
        self.write(&posts).await?;

        tracing::info!(id = %post.id, "Created post");
        Ok(post)
    }

    /// Add one like and return the new total.
    pub async fn like_post(&self, post_id: &str) -> Result<u64, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut posts = self.read().await?;
        let post = find_post(&mut posts, post_id)?;
        post.likes += 1;
        let likes = post.likes;
        self.write(&posts).await?;
        Ok(likes)
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        author: Option<&str>,
        text: &str,
    ) -> Result<Comment, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::invalid("Comment text is required"));
        }

        let comment = Comment {
            id: generate_id(COMMENT_ID_SUFFIX),
            author: author_or_default(author),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        let mut posts = self.read().await?;
        find_post(&mut posts, post_id)?
            .comments
            .push(comment.clone());
        self.write(&posts).await?;

        tracing::info!(post = %post_id, id = %comment.id, "Added comment");
        Ok(comment)
    }

    /// Strict read used by mutations: a corrupt document is an error, not an
    /// empty list, so it never gets overwritten.
    async fn read(&self) -> Result<Vec<Post>, AppError> {
        let raw = match tokio::fs::read_to_string(self.path.as_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write to a sibling temp file, then rename over the document.
    async fn write(&self, posts: &[Post]) -> Result<(), AppError> {
        let mut body = serde_json::to_string_pretty(posts)?;
        body.push('\n');

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, self.path.as_path()).await?;
        Ok(())
    }
}

fn find_post<'a>(posts: &'a mut [Post], id: &str) -> Result<&'a mut Post, AppError> {
    posts
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

fn author_or_default(author: Option<&str>) -> String {
    match author.map(str::trim) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}

/// Millisecond timestamp in base 36 followed by a short random suffix.
/// Collisions are improbable but not checked.
fn generate_id(suffix_len: usize) -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(suffix_len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", to_base36(millis), suffix)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
