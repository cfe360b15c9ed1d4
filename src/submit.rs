//! 提交分发
//!
//! 打开题目页，在页面里填代码、选语言、提交表单，取回运行编号。

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::browser::{release_page, BrowserSession, PageHandle};
use crate::config::Config;
use crate::error::{BrowserError, JudgeError, JudgeResult};
use crate::models::Language;

pub struct SubmissionDispatcher {
    config: Arc<Config>,
}

impl SubmissionDispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// 在已登录的会话里提交代码，返回 LOJ 分配的运行编号
    pub async fn submit(
        &self,
        session: &dyn BrowserSession,
        problem_id: u64,
        source: &str,
        language: Language,
    ) -> JudgeResult<u64> {
        let page = session.new_page().await?;
        let outcome = self
            .submit_on_page(page.as_ref(), problem_id, source, language)
            .await;
        release_page(page).await;

        let run_id = parse_run_id(&outcome?)?;
        info!(
            "[题目 {}] ✓ 已提交 ({} → {})，运行编号 {}",
            problem_id,
            language.tag(),
            language.remote_tag(),
            run_id
        );
        Ok(run_id)
    }

    async fn submit_on_page(
        &self,
        page: &dyn PageHandle,
        problem_id: u64,
        source: &str,
        language: Language,
    ) -> Result<JsonValue, BrowserError> {
        page.navigate(&self.config.url(&format!("problem/{}", problem_id)))
            .await?;
        debug!(
            "[题目 {}] 提交代码，长度 {} 字节",
            problem_id,
            source.len()
        );
        page.evaluate(&submit_script(language.remote_tag(), source)?)
            .await
    }
}

/// 页面脚本返回响应 URL 的最后一段
fn parse_run_id(value: &JsonValue) -> JudgeResult<u64> {
    let segment = match value {
        JsonValue::String(s) if !s.is_empty() => s.as_str(),
        _ => {
            warn!("提交后没有拿到运行编号: {}", value);
            return Err(JudgeError::Submission("no run id in response".to_string()));
        }
    };
    segment
        .parse()
        .map_err(|_| JudgeError::Submission(format!("unexpected run id '{}'", segment)))
}

fn submit_script(remote_tag: &str, source: &str) -> Result<String, BrowserError> {
    Ok(format!(
        r##"
        (async () => {{
            if (typeof editor === "undefined" || !editor) return null;
            editor.setValue({source});
            const menu = document.querySelector("#languages-menu");
            if (!menu) return null;
            const item = menu.querySelector('[data-value=' + JSON.stringify({lang}) + ']');
            if (!item) return null;
            item.click();
            submit_code();
            const form = document.querySelector("#submit_code");
            if (!form) return null;
            const res = await fetch(form.action, {{ method: "POST", body: new FormData(form) }});
            return res.url.substr(res.url.lastIndexOf("/") + 1);
        }})()
        "##,
        source = serde_json::to_string(source)?,
        lang = serde_json::to_string(remote_tag)?,
    ))
}
