//! 评测结果轮询
//!
//! 持有待评测运行的登记表。调度循环每隔固定间隔扫描一遍登记表，
//! 逐个打开状态页抓取结果并回调；终态或抓取失败时把该运行移出登记表。

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::{evaluate_as, release_page, BrowserSession, PageHandle};
use crate::config::Config;
use crate::error::{BrowserError, JudgeError, JudgeResult};
use crate::session::SessionManager;
use crate::verdict::{translate_status, Verdict};

/// 调用方的结果回调，每次状态更新调用一次
pub type UpdateCallback = Arc<dyn Fn(Verdict) -> BoxFuture<'static, ()> + Send + Sync>;

/// 把异步闭包包装成 `UpdateCallback`
pub fn update_callback<F, Fut>(f: F) -> UpdateCallback
where
    F: Fn(Verdict) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |verdict| f(verdict).boxed())
}

/// 状态页异步填充结果数据后该谓词为真
const RESULT_READY: &str =
    r#"typeof vueApp !== "undefined" && vueApp.$data.roughData.result !== null"#;

/// 读取状态表第一行的 状态 / 分数 / 用时 / 内存 四列
const STATUS_ROW_SCRIPT: &str = r#"
    (() => {
        const cell = (n) => document
            .querySelector(`#status_table > tbody > tr > td:nth-child(${n})`)
            .textContent.trim();
        return { statusText: cell(3), score: cell(4), time: cell(5), memory: cell(6) };
    })()
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRow {
    status_text: String,
    score: String,
    time: String,
    memory: String,
}

pub struct ResultPoller {
    sessions: Arc<SessionManager>,
    config: Arc<Config>,
    registry: Mutex<BTreeMap<u64, UpdateCallback>>,
}

impl ResultPoller {
    pub fn new(sessions: Arc<SessionManager>, config: Arc<Config>) -> Self {
        Self {
            sessions,
            config,
            registry: Mutex::new(BTreeMap::new()),
        }
    }

    /// 登记一个待评测的运行
    pub async fn register(&self, run_id: u64, callback: UpdateCallback) {
        if self.registry.lock().await.insert(run_id, callback).is_some() {
            warn!("[运行 {}] 重复登记，覆盖原回调", run_id);
        }
        debug!("[运行 {}] 已登记", run_id);
    }

    pub async fn pending_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn is_pending(&self, run_id: u64) -> bool {
        self.registry.lock().await.contains_key(&run_id)
    }

    /// 启动调度循环
    ///
    /// 每轮扫描结束后等待一个间隔再开始下一轮，直到 `PollerHandle::stop()`
    /// 或句柄被丢弃。
    pub fn spawn(self: &Arc<Self>) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let poller = self.clone();
        let interval = self.config.poll_interval();

        let task = tokio::spawn(async move {
            info!("结果轮询已启动，间隔 {:?}", interval);
            loop {
                poller.scan_once().await;
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            info!("结果轮询已停止");
        });

        PollerHandle {
            stop: stop_tx,
            task,
        }
    }

    /// 扫描一遍登记表
    ///
    /// 先在锁内复制一份快照，抓取时不持锁，提交路径可以同时登记新运行。
    /// 每轮只确认一次会话；会话建立失败时本轮所有运行都以该错误结束。
    pub async fn scan_once(&self) {
        let pending: Vec<(u64, UpdateCallback)> = self
            .registry
            .lock()
            .await
            .iter()
            .map(|(run_id, callback)| (*run_id, callback.clone()))
            .collect();
        if pending.is_empty() {
            return;
        }
        debug!("开始扫描 {} 个待评测运行", pending.len());

        let session = match self.sessions.ensure_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("❌ 无法建立会话，{} 个运行拉取失败: {}", pending.len(), e);
                for (run_id, callback) in pending {
                    deliver(&callback, Verdict::failed(e.to_string(), Some(run_id)), run_id)
                        .await;
                    self.registry.lock().await.remove(&run_id);
                }
                return;
            }
        };

        for (run_id, callback) in pending {
            match self.fetch(session.as_ref(), run_id).await {
                Ok(verdict) => {
                    let terminal = verdict.is_terminal();
                    debug!("[运行 {}] 状态: {:?}", run_id, verdict.status);
                    deliver(&callback, verdict, run_id).await;
                    if terminal {
                        self.registry.lock().await.remove(&run_id);
                        info!("[运行 {}] ✓ 评测结束", run_id);
                    }
                }
                Err(e) => {
                    warn!("[运行 {}] ❌ 拉取评测状态失败: {}", run_id, e);
                    deliver(&callback, Verdict::failed(e.to_string(), Some(run_id)), run_id)
                        .await;
                    self.registry.lock().await.remove(&run_id);
                }
            }
        }
    }

    /// 抓取一次运行状态
    ///
    /// 等待结果数据超时说明评测机还没给出结果，返回 WaitingJudge 而不是错误。
    pub async fn fetch(&self, session: &dyn BrowserSession, run_id: u64) -> JudgeResult<Verdict> {
        let page = session.new_page().await.map_err(JudgeError::Poll)?;
        let outcome = self.fetch_on_page(page.as_ref(), run_id).await;
        release_page(page).await;

        match outcome {
            Ok(verdict) => Ok(verdict),
            Err(e) if e.is_wait_timeout() => {
                debug!("[运行 {}] 结果尚未生成", run_id);
                Ok(Verdict::waiting(run_id))
            }
            Err(e) => Err(JudgeError::Poll(e)),
        }
    }

    async fn fetch_on_page(&self, page: &dyn PageHandle, run_id: u64) -> Result<Verdict, BrowserError> {
        page.navigate(&self.config.url(&format!("submission/{}", run_id)))
            .await?;
        page.wait_for(RESULT_READY, self.config.result_wait()).await?;

        let row: StatusRow = evaluate_as(page, STATUS_ROW_SCRIPT).await?;
        Ok(Verdict::judged(
            translate_status(&row.status_text),
            parse_score(&row.score),
            row.time,
            row.memory,
            run_id,
        ))
    }
}

/// 调用回调；回调 panic 不能带崩调度循环
///
/// 回调在返回 future 之前和 future 执行期间都可能 panic，两处分别捕获。
async fn deliver(callback: &UpdateCallback, verdict: Verdict, run_id: u64) {
    let future = match panic::catch_unwind(AssertUnwindSafe(|| callback(verdict))) {
        Ok(future) => future,
        Err(_) => {
            error!("[运行 {}] 回调 panic", run_id);
            return;
        }
    };
    if AssertUnwindSafe(future).catch_unwind().await.is_err() {
        error!("[运行 {}] 回调 panic", run_id);
    }
}

/// 取分数文本开头的整数，取不到记 0
fn parse_score(text: &str) -> i64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}

/// 调度循环句柄
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// 停止调度循环并等待当前一轮扫描结束
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!("结果轮询任务异常退出: {}", e);
        }
    }
}
