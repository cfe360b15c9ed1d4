//! 评测入口
//!
//! 校验输入 → 翻译语言 → 读取源文件 → 确保会话 → 提交 → 登记轮询。
//! 会话之前的步骤都不访问网络。
//! 任何失败都以一次 JudgementFailed 回调结束，`judge` 本身从不返回错误。

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::browser::BrowserLauncher;
use crate::config::Config;
use crate::error::{JudgeError, JudgeResult};
use crate::models::{Language, Problem, Solution};
use crate::poller::{PollerHandle, ResultPoller, UpdateCallback};
use crate::resolver::FileResolver;
use crate::session::SessionManager;
use crate::submit::SubmissionDispatcher;
use crate::verdict::Verdict;

pub struct JudgeAdapter {
    config: Arc<Config>,
    sessions: Arc<SessionManager>,
    dispatcher: SubmissionDispatcher,
    poller: Arc<ResultPoller>,
}

impl JudgeAdapter {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: Config) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionManager::new(launcher, config.clone()));
        Self {
            dispatcher: SubmissionDispatcher::new(config.clone()),
            poller: Arc::new(ResultPoller::new(sessions.clone(), config.clone())),
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn poller(&self) -> &Arc<ResultPoller> {
        &self.poller
    }

    /// 启动结果轮询循环
    pub fn start_polling(&self) -> PollerHandle {
        self.poller.spawn()
    }

    /// 停止轮询并关闭浏览器
    pub async fn shutdown(&self, handle: PollerHandle) {
        handle.stop().await;
        let pending = self.poller.pending_count().await;
        if pending > 0 {
            warn!("仍有 {} 个运行未得到最终结果", pending);
        }
        self.sessions.shutdown().await;
    }

    /// 提交一次评测
    ///
    /// 成功提交后 `on_update` 由轮询器在每次状态更新时调用；
    /// 提交前的任何失败立即以 JudgementFailed 调用一次。
    pub async fn judge(
        &self,
        problem: &JsonValue,
        solution: &JsonValue,
        resolver: &dyn FileResolver,
        on_update: UpdateCallback,
    ) {
        match self.try_judge(problem, solution, resolver).await {
            Ok(run_id) => self.poller.register(run_id, on_update).await,
            Err(e) => {
                warn!("❌ 评测请求失败: {}", e);
                on_update(Verdict::failed(e.to_string(), None)).await;
            }
        }
    }

    async fn try_judge(
        &self,
        problem: &JsonValue,
        solution: &JsonValue,
        resolver: &dyn FileResolver,
    ) -> JudgeResult<u64> {
        let problem = Problem::from_value(problem)?;
        let solution = Solution::from_value(solution)?;
        let language = Language::from_tag(&solution.language)
            .ok_or_else(|| JudgeError::LanguageRejected(solution.language.clone()))?;
        info!(
            "[题目 {}] 收到提交: 语言 {}, 文件 {}",
            problem.id, solution.language, solution.file
        );

        let source = self
            .read_source(&solution.file, resolver)
            .await
            .map_err(|e| match e {
                JudgeError::Resource { .. } => e,
                other => {
                    warn!("[题目 {}] 读取源文件失败: {}", problem.id, other);
                    JudgeError::Validation("Invalid solution".to_string())
                }
            })?;

        let session = self.sessions.ensure_session().await?;

        self.dispatcher
            .submit(session.as_ref(), problem.id, &source, language)
            .await
            .map_err(|e| {
                warn!("[题目 {}] 提交失败: {}", problem.id, e);
                JudgeError::Validation("Invalid solution".to_string())
            })
    }

    /// 解析并读取源文件，超过大小上限时不读取内容
    async fn read_source(&self, file: &str, resolver: &dyn FileResolver) -> JudgeResult<String> {
        let resolved = resolver
            .resolve(file)
            .await
            .map_err(|e| JudgeError::Validation(format!("{:#}", e)))?;

        let size = fs::metadata(&resolved.path)
            .await
            .map_err(|e| JudgeError::io(&resolved.path, e))?
            .len();
        if size > self.config.max_source_size {
            return Err(JudgeError::Resource {
                size,
                limit: self.config.max_source_size,
            });
        }

        let bytes = fs::read(&resolved.path)
            .await
            .map_err(|e| JudgeError::io(&resolved.path, e))?;
        Ok(decode_source(bytes, file))
    }
}

/// 源文件按 UTF-8 解码，非法字节替换为 U+FFFD
fn decode_source(bytes: Vec<u8>, file: &str) -> String {
    match String::from_utf8(bytes) {
        Ok(source) => source,
        Err(e) => {
            debug!(
                "源文件 {} 不是合法 UTF-8 (偏移 {})，非法字节已替换",
                file,
                e.utf8_error().valid_up_to()
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
