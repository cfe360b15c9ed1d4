//! # LOJ Judge
//!
//! 把只能通过浏览器使用的 LOJ 评测站包装成可编程的评测后端。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层
//! - `browser/` - 浏览器能力（开页面、导航、执行 JS、等待），以及请求屏蔽策略
//! - `session` - 唯一持有浏览器会话，负责登录与登录态探测
//!
//! ### ② 业务能力层
//! - `submit` - 在题目页提交代码，取回运行编号
//! - `poller` - 待评测运行登记表 + 定时轮询状态页
//! - `verdict` - 状态文本翻译与评测结果模型
//!
//! ### ③ 入口
//! - `adapter` - 校验输入并串起 会话 → 提交 → 轮询

pub mod adapter;
pub mod browser;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod poller;
pub mod resolver;
pub mod session;
pub mod submit;
pub mod verdict;

// 重新导出常用类型
pub use adapter::JudgeAdapter;
pub use config::Config;
pub use error::{BrowserError, ConfigError, JudgeError, JudgeResult};
pub use models::{Language, Problem, Solution};
pub use poller::{update_callback, PollerHandle, ResultPoller, UpdateCallback};
pub use resolver::{FileResolver, LocalFileResolver, ResolvedFile};
pub use session::SessionManager;
pub use verdict::{SolutionStatus, Verdict, VerdictDetails};
