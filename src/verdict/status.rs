//! 远端状态文本 → 归一化状态

use phf::phf_map;

use super::SolutionStatus;

/// LOJ 状态页上出现的状态文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Waiting,
    Compiling,
    Running,
    CompileError,
    JudgementFailed,
    SystemError,
    NoTestdata,
    FileError,
    InvalidInteraction,
    Accepted,
    WrongAnswer,
    PartiallyCorrect,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    Skipped,
}

static REMOTE_STATUS_TEXT: phf::Map<&'static str, RemoteStatus> = phf_map! {
    "Waiting" => RemoteStatus::Waiting,
    "Compiling" => RemoteStatus::Compiling,
    "Running" => RemoteStatus::Running,
    "Compile Error" => RemoteStatus::CompileError,
    "Judgement Failed" => RemoteStatus::JudgementFailed,
    "System Error" => RemoteStatus::SystemError,
    "No Testdata" => RemoteStatus::NoTestdata,
    "File Error" => RemoteStatus::FileError,
    "Invalid Interaction" => RemoteStatus::InvalidInteraction,
    "Accepted" => RemoteStatus::Accepted,
    "Wrong Answer" => RemoteStatus::WrongAnswer,
    "Partially Correct" => RemoteStatus::PartiallyCorrect,
    "Runtime Error" => RemoteStatus::RuntimeError,
    "Time Limit Exceeded" => RemoteStatus::TimeLimitExceeded,
    "Memory Limit Exceeded" => RemoteStatus::MemoryLimitExceeded,
    "Skipped" => RemoteStatus::Skipped,
};

impl RemoteStatus {
    /// 精确匹配状态文本，未知文本返回 None
    pub fn parse(text: &str) -> Option<Self> {
        REMOTE_STATUS_TEXT.get(text).copied()
    }

    pub fn verdict(self) -> SolutionStatus {
        match self {
            RemoteStatus::Waiting => SolutionStatus::WaitingJudge,
            RemoteStatus::Compiling | RemoteStatus::Running => SolutionStatus::Judging,
            RemoteStatus::CompileError => SolutionStatus::CompileError,
            RemoteStatus::JudgementFailed
            | RemoteStatus::SystemError
            | RemoteStatus::NoTestdata
            | RemoteStatus::FileError
            | RemoteStatus::InvalidInteraction => SolutionStatus::JudgementFailed,
            RemoteStatus::Accepted => SolutionStatus::Accepted,
            RemoteStatus::WrongAnswer | RemoteStatus::PartiallyCorrect => {
                SolutionStatus::WrongAnswer
            }
            RemoteStatus::RuntimeError => SolutionStatus::RuntimeError,
            RemoteStatus::TimeLimitExceeded => SolutionStatus::TimeLimitExceeded,
            RemoteStatus::MemoryLimitExceeded => SolutionStatus::MemoryLimitExceeded,
            RemoteStatus::Skipped => SolutionStatus::Skipped,
        }
    }
}

/// 把状态文本翻译成归一化状态
///
/// 永不失败：站点改版导致的未知文本落到 `OtherError`。
pub fn translate_status(text: &str) -> SolutionStatus {
    RemoteStatus::parse(text)
        .map(RemoteStatus::verdict)
        .unwrap_or(SolutionStatus::OtherError)
}
