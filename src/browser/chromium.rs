//! 基于 chromiumoxide 的浏览器实现

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::{BrowserLauncher, BrowserSession, PageHandle, ResourceBlocker};
use crate::config::Config;
use crate::error::BrowserError;

/// `wait_for` 的轮询间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 启动无头浏览器
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    headless: bool,
    blocker: Arc<ResourceBlocker>,
}

impl ChromiumLauncher {
    pub fn new(config: &Config, blocker: ResourceBlocker) -> Self {
        Self {
            executable: config.chrome_executable.clone(),
            headless: config.headless,
            blocker: Arc::new(blocker),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder();
        builder = if self.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .args(vec![
                "--no-sandbox",            // 容器内运行时没有沙盒权限
                "--disable-dev-shm-usage", // 防止共享内存不足
                "--disable-gpu",
            ])
            .build()
            .map_err(|e| {
                error!("配置无头浏览器失败: {}", e);
                BrowserError::Launch(e)
            })
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        info!("🚀 启动无头浏览器...");
        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            BrowserError::Launch(e.to_string())
        })?;
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(browser),
            handler_task,
            blocker: self.blocker.clone(),
        }))
    }
}

/// 一个已启动的浏览器进程
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    blocker: Arc<ResourceBlocker>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| {
                error!("创建页面失败: {}", e);
                BrowserError::PageCreation(e.to_string())
            })?;

        let interceptor = intercept_requests(&page, self.blocker.clone()).await?;
        Ok(Box::new(ChromiumPage { page, interceptor }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        browser.close().await?;
        self.handler_task.abort();
        info!("浏览器已关闭");
        Ok(())
    }
}

/// 开启 Fetch 域拦截，按屏蔽策略放行或丢弃每个请求
async fn intercept_requests(
    page: &Page,
    blocker: Arc<ResourceBlocker>,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    page.execute(EnableParams::default()).await?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let request_id = event.request_id.clone();
            let outcome = if blocker.allows(&event.request.url) {
                page.execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            } else {
                debug!("已屏蔽请求: {}", event.request.url);
                page.execute(FailRequestParams::new(
                    request_id,
                    ErrorReason::BlockedByClient,
                ))
                .await
                .map(|_| ())
            };
            if let Err(e) = outcome {
                debug!("请求拦截结束: {}", e);
                break;
            }
        }
    }))
}

pub struct ChromiumPage {
    page: Page,
    interceptor: JoinHandle<()>,
}

impl ChromiumPage {
    async fn poll_until(&self, predicate: &str) -> Result<(), BrowserError> {
        loop {
            if self.evaluate(predicate).await?.as_bool() == Some(true) {
                return Ok(());
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("导航到: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        // 脚本返回 undefined 时没有值，统一视为 null
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    async fn wait_for(&self, predicate: &str, timeout: Duration) -> Result<(), BrowserError> {
        tokio::time::timeout(timeout, self.poll_until(predicate))
            .await
            .map_err(|_| BrowserError::WaitTimeout(timeout))?
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromiumPage { page, interceptor } = *self;
        interceptor.abort();
        page.close().await?;
        Ok(())
    }
}
