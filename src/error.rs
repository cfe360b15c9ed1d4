use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 浏览器能力层错误
///
/// 由 `PageHandle` / `BrowserSession` 的实现返回，真实浏览器和测试桩共用。
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// 创建页面失败
    #[error("failed to open page: {0}")]
    PageCreation(String),
    /// 导航失败
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    /// 执行脚本失败
    #[error("script evaluation failed: {0}")]
    Script(String),
    /// 等待页面条件超时
    ///
    /// 轮询器依赖这个变体区分"评测结果尚未生成"和真正的失败。
    #[error("waiting for function failed: timeout {0:?} exceeded")]
    WaitTimeout(Duration),
    /// 脚本返回值无法解析
    #[error("unexpected script result: {0}")]
    Decode(#[from] serde_json::Error),
    /// CDP 协议错误
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

impl BrowserError {
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, BrowserError::WaitTimeout(_))
    }
}

/// 评测适配器错误
///
/// `Display` 文本会原样写进 `Verdict.details.error`，所以保持英文短句。
#[derive(Debug, Error)]
pub enum JudgeError {
    /// 登录后未能确认会话有效
    #[error("Login failed: {0}")]
    Authentication(String),
    /// 提交后没有拿到运行编号
    #[error("Submit failed: {0}")]
    Submission(String),
    /// 题目或提交结构不合法
    #[error("{0}")]
    Validation(String),
    /// 语言不在支持列表中
    #[error("Language rejected")]
    LanguageRejected(String),
    /// 源文件超过大小上限
    #[error("File is too big")]
    Resource { size: u64, limit: u64 },
    /// 拉取评测状态失败（等待超时不算）
    #[error("{0}")]
    Poll(BrowserError),
    /// 其他浏览器错误
    #[error(transparent)]
    Browser(#[from] BrowserError),
    /// 文件读写错误
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JudgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JudgeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 屏蔽规则不是合法正则
    #[error("屏蔽规则 '{pattern}' 不是合法正则: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 评测流程结果类型
pub type JudgeResult<T> = Result<T, JudgeError>;
