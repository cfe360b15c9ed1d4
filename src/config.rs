use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LOJ 站点地址（总是以 `/` 结尾）
    pub loj_addr: String,
    /// 登录用户名
    pub username: String,
    /// 登录密码
    pub password: String,
    /// 登录页上表示"已登录"的提示文本
    pub logged_in_marker: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 状态页等待结果数据的超时（毫秒）
    pub result_wait_ms: u64,
    /// 源文件大小上限（字节）
    pub max_source_size: u64,
    /// 浏览器可执行文件路径，为空时由 chromiumoxide 自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 是否无头模式
    pub headless: bool,
    /// 需要屏蔽的请求 URL 正则
    pub blocked_resources: Vec<String>,
    /// 提交文件所在目录
    pub solution_root: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

pub const DEFAULT_MAX_SOURCE_SIZE: u64 = 16 * 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            loj_addr: "https://loj.ac/".to_string(),
            username: String::new(),
            password: String::new(),
            logged_in_marker: "您已经登录了，请先注销。".to_string(),
            poll_interval_ms: 1000,
            result_wait_ms: 500,
            max_source_size: DEFAULT_MAX_SOURCE_SIZE,
            chrome_executable: None,
            headless: true,
            blocked_resources: vec!["google".to_string(), "gstatic".to_string()],
            solution_root: PathBuf::from("."),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再叠加环境变量
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())?.with_env_overrides()
    }

    fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
                path: origin.to_string(),
                source,
            })?;
        Ok(config.normalized())
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("LOJ_ADDR") {
            self.loj_addr = v;
        }
        if let Ok(v) = std::env::var("LOJ_USERNAME") {
            self.username = v;
        }
        if let Ok(v) = std::env::var("LOJ_PASSWORD") {
            self.password = v;
        }
        if let Ok(v) = std::env::var("LOJ_LOGGED_IN_MARKER") {
            self.logged_in_marker = v;
        }
        if let Some(v) = parse_env("POLL_INTERVAL_MS", "u64")? {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parse_env("RESULT_WAIT_MS", "u64")? {
            self.result_wait_ms = v;
        }
        if let Some(v) = parse_env("MAX_SOURCE_SIZE", "u64")? {
            self.max_source_size = v;
        }
        if let Ok(v) = std::env::var("CHROME_EXECUTABLE") {
            self.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = parse_env("HEADLESS", "bool")? {
            self.headless = v;
        }
        if let Ok(v) = std::env::var("SOLUTION_ROOT") {
            self.solution_root = PathBuf::from(v);
        }
        if let Some(v) = parse_env("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(self.normalized())
    }

    fn normalized(mut self) -> Self {
        if !self.loj_addr.ends_with('/') {
            self.loj_addr.push('/');
        }
        self
    }

    /// 拼接站点内路径，开头的 `/` 会被去掉
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.loj_addr, path.strip_prefix('/').unwrap_or(path))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_millis(self.result_wait_ms)
    }
}

fn parse_env<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_with_single_slash() {
        let config = Config {
            loj_addr: "https://loj.example.com".to_string(),
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.loj_addr, "https://loj.example.com/");
        assert_eq!(config.url("/login?url="), "https://loj.example.com/login?url=");
        assert_eq!(config.url("problem/1"), "https://loj.example.com/problem/1");
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            loj_addr = "http://127.0.0.1:5283"
            username = "robot"
            password = "secret"
            "#,
            "inline",
        )
        .unwrap();
        assert_eq!(config.loj_addr, "http://127.0.0.1:5283/");
        assert_eq!(config.username, "robot");
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.result_wait(), Duration::from_millis(500));
        assert_eq!(config.max_source_size, 16 * 1024 * 1024);
        assert_eq!(config.blocked_resources, vec!["google", "gstatic"]);
    }

    #[test]
    fn test_toml_parse_error() {
        let err = Config::from_toml_str("poll_interval_ms = \"fast\"", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }
}
