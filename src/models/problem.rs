use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::JudgeError;

/// 题目（只关心 LOJ 上的题号，其他字段忽略）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Problem {
    pub id: u64,
}

/// 一次提交
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Solution {
    /// 内部语言标签，是否支持由 `Language::from_tag` 判断
    pub language: String,
    /// 源文件引用，交给 `FileResolver` 解析
    pub file: String,
}

impl Problem {
    /// 结构校验，失败统一报 "Invalid problem"
    pub fn from_value(value: &JsonValue) -> Result<Self, JudgeError> {
        Problem::deserialize(value).map_err(|e| {
            debug!("题目结构不合法: {}", e);
            JudgeError::Validation("Invalid problem".to_string())
        })
    }
}

impl Solution {
    /// 结构校验，失败统一报 "Invalid solution"
    pub fn from_value(value: &JsonValue) -> Result<Self, JudgeError> {
        let solution = Solution::deserialize(value).map_err(|e| {
            debug!("提交结构不合法: {}", e);
            JudgeError::Validation("Invalid solution".to_string())
        })?;
        if solution.language.is_empty() || solution.file.is_empty() {
            return Err(JudgeError::Validation("Invalid solution".to_string()));
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_problem_shape() {
        assert_eq!(
            Problem::from_value(&json!({ "id": 1001, "title": "A+B" })).unwrap(),
            Problem { id: 1001 }
        );
        for bad in [json!({}), json!({ "id": "1001" }), json!({ "id": -1 }), json!(null)] {
            let err = Problem::from_value(&bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid problem");
        }
    }

    #[test]
    fn test_solution_shape() {
        let solution =
            Solution::from_value(&json!({ "language": "go", "file": "main.go" })).unwrap();
        assert_eq!(solution.language, "go");

        for bad in [
            json!({ "language": "cpp11" }),
            json!({ "language": 11, "file": "a.cpp" }),
            json!({ "language": "", "file": "a.cpp" }),
            json!({ "language": "cpp11", "file": "" }),
        ] {
            let err = Solution::from_value(&bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid solution");
        }
    }
}
