//! 浏览器能力层
//!
//! 只暴露"开页面、导航、执行 JS、等待条件、关页面"这几种能力，
//! 不认识题目、提交或评测结果。真实实现见 `chromium`，测试桩见 `stubs`。

pub mod blocker;
pub mod chromium;
pub mod stubs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::BrowserError;

pub use blocker::ResourceBlocker;
pub use chromium::ChromiumLauncher;

/// 单个浏览器页面
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// 导航到指定 URL 并等待加载完成
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// 等待由页面自身触发的下一次导航完成
    async fn wait_for_navigation(&self) -> Result<(), BrowserError>;

    /// 执行 JS 表达式并返回 JSON 结果（Promise 会被等待）
    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError>;

    /// 等待 JS 谓词为真，超时返回 `BrowserError::WaitTimeout`
    async fn wait_for(&self, predicate: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// 关闭页面
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// 一个浏览器上下文，登录态（cookie）在其中的所有页面间共享
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// 创建浏览器上下文
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

/// 执行 JS 并反序列化为指定类型
pub async fn evaluate_as<T: DeserializeOwned>(
    page: &dyn PageHandle,
    script: &str,
) -> Result<T, BrowserError> {
    let value = page.evaluate(script).await?;
    Ok(serde_json::from_value(value)?)
}

/// 关闭页面，失败只记日志
///
/// 调用方此时已经拿到了自己的结果，关页面失败不应覆盖它。
pub async fn release_page(page: Box<dyn PageHandle>) {
    if let Err(e) = page.close().await {
        warn!("关闭页面失败: {}", e);
    }
}
