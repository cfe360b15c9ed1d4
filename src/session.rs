//! 会话管理
//!
//! 唯一持有浏览器会话的模块。其他组件只通过 `ensure_session()` 拿到会话去开页面，
//! 从不自己创建或替换会话。

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser::{evaluate_as, release_page, BrowserLauncher, BrowserSession, PageHandle};
use crate::config::Config;
use crate::error::{BrowserError, JudgeError, JudgeResult};

/// 登录页路径，已登录时访问会显示"请先注销"
const LOGIN_PATH: &str = "login?url=";

/// 登录探测请求的结果
#[derive(Debug, Deserialize)]
struct ProbeResponse {
    status: u16,
    body: String,
}

pub struct SessionManager {
    launcher: Arc<dyn BrowserLauncher>,
    config: Arc<Config>,
    session: Mutex<Option<Arc<dyn BrowserSession>>>,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: Arc<Config>) -> Self {
        Self {
            launcher,
            config,
            session: Mutex::new(None),
        }
    }

    /// 保证返回一个已登录的会话
    ///
    /// 已有会话时先探测登录状态，仍有效就复用；失效则关闭浏览器重新登录。
    /// 登录未通过验证则丢弃这个半初始化的会话，下次调用从头再来。
    /// 并发调用会排队，同一时间只有一个登录流程。
    pub async fn ensure_session(&self) -> JudgeResult<Arc<dyn BrowserSession>> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.clone() {
            if self.probe_session(session.as_ref()).await {
                return Ok(session);
            }
            warn!("[LOJ] 登录状态已失效，重新登录");
            slot.take();
            close_session(session.as_ref()).await;
        }

        info!("[LOJ] 浏览器正在初始化");
        let session = self
            .launcher
            .launch()
            .await
            .map_err(|e| JudgeError::Authentication(e.to_string()))?;

        match self.login(session.as_ref()).await {
            Ok(()) => {
                info!("[LOJ] ✓ 浏览器初始化完成，已登录");
                *slot = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!("[LOJ] ❌ 登录失败: {}", e);
                close_session(session.as_ref()).await;
                Err(e)
            }
        }
    }

    /// 当前会话是否仍处于登录状态
    ///
    /// 没有会话、网络错误、超时都返回 false，从不返回错误。
    /// 探测为 false 时丢弃当前会话，下次 `ensure_session()` 重新登录。
    pub async fn probe_logged_in(&self) -> bool {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.clone() else {
            return false;
        };
        if self.probe_session(session.as_ref()).await {
            return true;
        }
        info!("[LOJ] 会话未登录，丢弃当前会话");
        slot.take();
        close_session(session.as_ref()).await;
        false
    }

    /// 是否持有会话（不检查登录状态）
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// 丢弃当前会话，下次 `ensure_session()` 会重新登录
    pub async fn invalidate(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            info!("[LOJ] 丢弃当前会话");
            close_session(session.as_ref()).await;
        }
    }

    /// 进程退出前关闭浏览器
    pub async fn shutdown(&self) {
        self.invalidate().await;
    }

    async fn login(&self, session: &dyn BrowserSession) -> JudgeResult<()> {
        let page = session
            .new_page()
            .await
            .map_err(|e| JudgeError::Authentication(e.to_string()))?;
        let outcome = self.submit_credentials(page.as_ref()).await;
        release_page(page).await;
        outcome.map_err(|e| JudgeError::Authentication(e.to_string()))?;

        if !self.probe_session(session).await {
            return Err(JudgeError::Authentication(
                "session is not logged in after submitting credentials".to_string(),
            ));
        }
        Ok(())
    }

    async fn submit_credentials(&self, page: &dyn PageHandle) -> Result<(), BrowserError> {
        page.navigate(&self.config.url(LOGIN_PATH)).await?;

        let script = login_script(&self.config.username, &self.config.password)?;
        if page.evaluate(&script).await?.as_bool() != Some(true) {
            return Err(BrowserError::Script("login form not found".to_string()));
        }
        page.wait_for_navigation().await
    }

    async fn probe_session(&self, session: &dyn BrowserSession) -> bool {
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                debug!("登录探测无法打开页面: {}", e);
                return false;
            }
        };
        let outcome = self.fetch_login_page(page.as_ref()).await;
        release_page(page).await;

        match outcome {
            Ok(res) => {
                let logged_in = res.status == 200 && res.body.contains(&self.config.logged_in_marker);
                debug!("登录探测: status={}, logged_in={}", res.status, logged_in);
                logged_in
            }
            Err(e) => {
                debug!("登录探测失败: {}", e);
                false
            }
        }
    }

    async fn fetch_login_page(&self, page: &dyn PageHandle) -> Result<ProbeResponse, BrowserError> {
        let url = self.config.url(LOGIN_PATH);
        page.navigate(&url).await?;
        evaluate_as(page, &probe_script(&url)?).await
    }
}

async fn close_session(session: &dyn BrowserSession) {
    if let Err(e) = session.close().await {
        warn!("关闭浏览器失败: {}", e);
    }
}

fn login_script(username: &str, password: &str) -> Result<String, BrowserError> {
    Ok(format!(
        r##"
        (() => {{
            const usr = document.querySelector("#username");
            const pwd = document.querySelector("#password");
            const btn = document.querySelector("#login");
            if (!usr || !pwd || !btn) return false;
            usr.value = {};
            pwd.value = {};
            btn.click();
            return true;
        }})()
        "##,
        serde_json::to_string(username)?,
        serde_json::to_string(password)?
    ))
}

fn probe_script(url: &str) -> Result<String, BrowserError> {
    Ok(format!(
        r#"
        (async () => {{
            const res = await fetch({}, {{ credentials: "include" }});
            return {{ status: res.status, body: await res.text() }};
        }})()
        "#,
        serde_json::to_string(url)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::stubs::StubBrowser;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const MARKER: &str = "您已经登录了，请先注销。";

    fn manager(stub: &StubBrowser) -> SessionManager {
        let config = Config {
            loj_addr: "https://loj.test/".to_string(),
            username: "robot".to_string(),
            password: "p\"ss".to_string(),
            ..Default::default()
        };
        SessionManager::new(stub.launcher(), Arc::new(config))
    }

    /// 登录表单脚本返回 true，探测脚本返回给定响应
    fn site(status: u16, body: &'static str) -> StubBrowser {
        StubBrowser::new().on_evaluate(move |_, script| {
            if script.contains("#username") {
                Ok(json!(true))
            } else {
                Ok(json!({ "status": status, "body": body }))
            }
        })
    }

    #[tokio::test]
    async fn test_ensure_session_logs_in_once() {
        let stub = site(200, "<p>您已经登录了，请先注销。</p>");
        let manager = manager(&stub);

        manager.ensure_session().await.unwrap();
        manager.ensure_session().await.unwrap();

        assert_eq!(stub.launches(), 1);
        assert!(manager.has_session().await);
        assert!(manager.probe_logged_in().await);
        assert_eq!(stub.pages_opened(), stub.pages_closed());
        assert_eq!(stub.navigations()[0], "https://loj.test/login?url=");
    }

    #[tokio::test]
    async fn test_probe_false_without_marker() {
        let stub = site(200, "<form id=\"login\"></form>");
        let manager = manager(&stub);

        let err = manager.ensure_session().await.err().unwrap();
        assert!(matches!(err, JudgeError::Authentication(_)));
        assert!(!manager.has_session().await);
        assert!(!manager.probe_logged_in().await);
        assert_eq!(stub.sessions_closed(), 1);

        // 下一次调用重新启动浏览器
        let _ = manager.ensure_session().await;
        assert_eq!(stub.launches(), 2);
        assert_eq!(stub.pages_opened(), stub.pages_closed());
    }

    #[tokio::test]
    async fn test_probe_false_on_bad_status() {
        let stub = site(500, MARKER);
        let manager = manager(&stub);
        assert!(manager.ensure_session().await.is_err());
    }

    #[tokio::test]
    async fn test_probe_swallows_errors() {
        let stub = StubBrowser::new().on_evaluate(|_, script| {
            if script.contains("#username") {
                Ok(json!(true))
            } else {
                Err(BrowserError::Script("net::ERR_CONNECTION_RESET".to_string()))
            }
        });
        let manager = manager(&stub);
        let err = manager.ensure_session().await.err().unwrap();
        assert!(err.to_string().starts_with("Login failed"));
        assert_eq!(stub.pages_opened(), stub.pages_closed());
    }

    #[tokio::test]
    async fn test_missing_login_form() {
        let stub = StubBrowser::new().on_evaluate(|_, _| Ok(json!(false)));
        let manager = manager(&stub);
        let err = manager.ensure_session().await.err().unwrap();
        assert!(err.to_string().contains("login form not found"));
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let stub = StubBrowser::new().failing_launch("chrome not found");
        let manager = manager(&stub);
        let err = manager.ensure_session().await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "Login failed: failed to launch browser: chrome not found"
        );
        assert_eq!(stub.pages_opened(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_relogin() {
        let stub = site(200, MARKER);
        let manager = manager(&stub);
        manager.ensure_session().await.unwrap();
        manager.invalidate().await;
        assert!(!manager.has_session().await);
        manager.ensure_session().await.unwrap();
        assert_eq!(stub.launches(), 2);
        assert_eq!(stub.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_reauthenticated() {
        let expired = Arc::new(AtomicBool::new(false));
        let flag = expired.clone();
        let stub = StubBrowser::new().on_evaluate(move |_, script| {
            if script.contains("#username") {
                flag.store(false, Ordering::SeqCst);
                Ok(json!(true))
            } else if flag.load(Ordering::SeqCst) {
                Ok(json!({ "status": 200, "body": "<form id=\"login\"></form>" }))
            } else {
                Ok(json!({ "status": 200, "body": MARKER }))
            }
        });
        let manager = manager(&stub);
        manager.ensure_session().await.unwrap();

        // 站点 cookie 过期后探测为 false，并丢弃会话
        expired.store(true, Ordering::SeqCst);
        assert!(!manager.probe_logged_in().await);
        assert!(!manager.has_session().await);
        assert_eq!(stub.sessions_closed(), 1);

        manager.ensure_session().await.unwrap();
        assert_eq!(stub.launches(), 2);
        assert!(manager.probe_logged_in().await);
        assert_eq!(stub.pages_opened(), stub.pages_closed());
    }

    #[tokio::test]
    async fn test_ensure_session_checks_cached_session() {
        let expired = Arc::new(AtomicBool::new(false));
        let flag = expired.clone();
        let stub = StubBrowser::new().on_evaluate(move |_, script| {
            if script.contains("#username") {
                flag.store(false, Ordering::SeqCst);
                Ok(json!(true))
            } else if flag.load(Ordering::SeqCst) {
                Ok(json!({ "status": 200, "body": "" }))
            } else {
                Ok(json!({ "status": 200, "body": MARKER }))
            }
        });
        let manager = manager(&stub);
        manager.ensure_session().await.unwrap();
        manager.ensure_session().await.unwrap();
        assert_eq!(stub.launches(), 1);

        expired.store(true, Ordering::SeqCst);
        manager.ensure_session().await.unwrap();
        assert_eq!(stub.launches(), 2);
        assert_eq!(stub.sessions_closed(), 1);
        assert!(manager.has_session().await);
    }

    #[test]
    fn test_login_script_targets_login_form() {
        let script = login_script("robot", "secret").unwrap();
        assert!(script.contains(r##"document.querySelector("#username")"##));
        assert!(script.contains(r##"document.querySelector("#password")"##));
        assert!(script.contains(r##"document.querySelector("#login")"##));
    }

    #[test]
    fn test_login_script_escapes_credentials() {
        let script = login_script("robot", "p\"ss").unwrap();
        assert!(script.contains(r#"pwd.value = "p\"ss";"#));
    }
}
