//! 内存中的浏览器桩，测试用
//!
//! 页面行为由闭包决定：闭包拿到当前页面 URL 和脚本文本，返回脚本结果。
//! 同时记录启动次数、页面开关次数和导航历史，便于断言资源是否被正确释放。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use super::{BrowserLauncher, BrowserSession, PageHandle};
use crate::config::Config;
use crate::error::BrowserError;

type EvaluateFn = dyn Fn(&str, &str) -> Result<JsonValue, BrowserError> + Send + Sync;
type UrlFn = dyn Fn(&str) -> Result<(), BrowserError> + Send + Sync;

#[derive(Default)]
struct StubStats {
    launches: AtomicUsize,
    sessions_closed: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

/// 可编程的浏览器桩
///
/// 克隆出来的实例共享同一份计数。
#[derive(Clone)]
pub struct StubBrowser {
    evaluate: Arc<EvaluateFn>,
    navigate: Arc<UrlFn>,
    wait: Arc<UrlFn>,
    launch_error: Option<String>,
    stats: Arc<StubStats>,
}

impl Default for StubBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBrowser {
    /// 所有脚本返回 null，所有导航和等待都成功
    pub fn new() -> Self {
        Self {
            evaluate: Arc::new(|_: &str, _: &str| Ok(JsonValue::Null)),
            navigate: Arc::new(|_: &str| Ok(())),
            wait: Arc::new(|_: &str| Ok(())),
            launch_error: None,
            stats: Arc::new(StubStats::default()),
        }
    }

    pub fn on_evaluate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<JsonValue, BrowserError> + Send + Sync + 'static,
    {
        self.evaluate = Arc::new(f);
        self
    }

    /// 登录表单和登录探测都成功的站点，其余脚本交给 `f`
    pub fn logged_in<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<JsonValue, BrowserError> + Send + Sync + 'static,
    {
        let marker = Config::default().logged_in_marker;
        Self::new().on_evaluate(move |url, script| {
            if script.contains("document.querySelector(\"#username\")") {
                Ok(JsonValue::Bool(true))
            } else if script.contains("await res.text()") {
                Ok(json!({ "status": 200, "body": marker }))
            } else {
                f(url, script)
            }
        })
    }

    pub fn on_navigate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), BrowserError> + Send + Sync + 'static,
    {
        self.navigate = Arc::new(f);
        self
    }

    pub fn on_wait<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), BrowserError> + Send + Sync + 'static,
    {
        self.wait = Arc::new(f);
        self
    }

    /// 每次启动都失败
    pub fn failing_launch(mut self, reason: impl Into<String>) -> Self {
        self.launch_error = Some(reason.into());
        self
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(self.clone())
    }

    pub fn launches(&self) -> usize {
        self.stats.launches.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.stats.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.stats.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.stats.pages_closed.load(Ordering::SeqCst)
    }

    /// 所有页面的导航记录（按发生顺序）
    pub fn navigations(&self) -> Vec<String> {
        self.stats
            .navigations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl BrowserLauncher for StubBrowser {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.launch_error {
            return Err(BrowserError::Launch(reason.clone()));
        }
        Ok(Arc::new(StubSession {
            browser: self.clone(),
        }))
    }
}

struct StubSession {
    browser: StubBrowser,
}

#[async_trait]
impl BrowserSession for StubSession {
    async fn new_page(&self) -> Result<Box<dyn PageHandle>, BrowserError> {
        self.browser.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubPage {
            browser: self.browser.clone(),
            url: Mutex::new(String::from("about:blank")),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.browser.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StubPage {
    browser: StubBrowser,
    url: Mutex<String>,
}

impl StubPage {
    fn current_url(&self) -> String {
        self.url.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PageHandle for StubPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.browser
            .stats
            .navigations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
        (self.browser.navigate)(url)?;
        *self.url.lock().unwrap_or_else(|e| e.into_inner()) = url.to_string();
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError> {
        (self.browser.evaluate)(&self.current_url(), script)
    }

    async fn wait_for(&self, _predicate: &str, timeout: Duration) -> Result<(), BrowserError> {
        match (self.browser.wait)(&self.current_url()) {
            Err(BrowserError::WaitTimeout(_)) => Err(BrowserError::WaitTimeout(timeout)),
            other => other,
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.browser.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
