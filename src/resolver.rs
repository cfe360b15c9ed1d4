//! 源文件解析
//!
//! 把提交里的文件引用变成可读取的本地路径。

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;

/// 解析后的源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
}

#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, file: &str) -> Result<ResolvedFile>;
}

/// 在固定根目录下按相对路径查找文件
#[derive(Debug, Clone)]
pub struct LocalFileResolver {
    root: PathBuf,
}

impl LocalFileResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileResolver for LocalFileResolver {
    async fn resolve(&self, file: &str) -> Result<ResolvedFile> {
        let relative = Path::new(file);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("文件引用不能跳出根目录: {}", file);
        }

        let path = self.root.join(relative);
        let metadata = fs::metadata(&path)
            .await
            .with_context(|| format!("无法访问文件: {}", path.display()))?;
        if !metadata.is_file() {
            bail!("不是普通文件: {}", path.display());
        }

        Ok(ResolvedFile { path })
    }
}
