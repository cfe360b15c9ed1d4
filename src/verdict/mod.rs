//! 评测结果模型
//!
//! `Verdict` 是交给调用方回调的唯一数据结构，构造之后不再修改。

mod status;

pub use status::{translate_status, RemoteStatus};

use serde::{Deserialize, Serialize};

/// 归一化后的评测状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolutionStatus {
    WaitingJudge,
    Judging,
    CompileError,
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    JudgementFailed,
    Skipped,
    OtherError,
}

impl SolutionStatus {
    /// 是否为终态（除 WaitingJudge / Judging 之外都是）
    pub fn is_terminal(self) -> bool {
        !matches!(self, SolutionStatus::WaitingJudge | SolutionStatus::Judging)
    }
}

/// 结果附加信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(rename = "runID", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 评测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: SolutionStatus,
    pub score: i64,
    pub details: VerdictDetails,
}

/// 远端尚未给出结果时 time / memory 的占位符
pub const PLACEHOLDER: &str = "/";

impl Verdict {
    /// 由状态页抓取到的字段构造结果
    pub fn judged(
        status: SolutionStatus,
        score: i64,
        time: impl Into<String>,
        memory: impl Into<String>,
        run_id: u64,
    ) -> Self {
        Self {
            status,
            score,
            details: VerdictDetails {
                time: Some(time.into()),
                memory: Some(memory.into()),
                run_id: Some(run_id),
                error: None,
            },
        }
    }

    /// 页面数据尚未就绪，视为排队中
    pub fn waiting(run_id: u64) -> Self {
        Self::judged(
            SolutionStatus::WaitingJudge,
            0,
            PLACEHOLDER,
            PLACEHOLDER,
            run_id,
        )
    }

    /// 评测失败结果，`run_id` 仅在已经提交成功后才有
    pub fn failed(error: impl Into<String>, run_id: Option<u64>) -> Self {
        Self {
            status: SolutionStatus::JudgementFailed,
            score: 0,
            details: VerdictDetails {
                run_id,
                error: Some(error.into()),
                ..Default::default()
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
