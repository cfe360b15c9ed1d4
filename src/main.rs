use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use loj_judge::browser::{ChromiumLauncher, ResourceBlocker};
use loj_judge::{logger, update_callback, Config, JudgeAdapter, LocalFileResolver, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

/// 标准输入中的一行评测请求
#[derive(Debug, Deserialize)]
struct JobRequest {
    problem: JsonValue,
    solution: JsonValue,
}

/// 标准输出中的一行评测结果
#[derive(Debug, Serialize)]
struct JobUpdate {
    job: usize,
    verdict: Verdict,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：有参数时读 TOML 文件，否则只用环境变量
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_toml_file(Path::new(&path))?,
        None => Config::from_env()?,
    };

    logger::init(config.verbose_logging);
    logger::log_startup(&config);

    let blocker = ResourceBlocker::new(&config.blocked_resources)?;
    let launcher = Arc::new(ChromiumLauncher::new(&config, blocker));
    let resolver = LocalFileResolver::new(config.solution_root.clone());
    let poll_interval = config.poll_interval();
    let adapter = JudgeAdapter::new(launcher, config);
    let poller = adapter.start_polling();

    let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(out_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut job = 0;
    let interrupted = loop {
        tokio::select! {
            line = lines.next_line() => match line.context("读取标准输入失败")? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    job += 1;
                    submit_job(&adapter, &resolver, job, &line, out_tx.clone()).await;
                }
                None => break false,
            },
            _ = tokio::signal::ctrl_c() => break true,
        }
    };

    if interrupted {
        info!("收到中断信号，停止接收评测请求");
    } else {
        info!("输入结束，等待剩余评测结果...");
        loop {
            if adapter.poller().pending_count().await == 0 {
                break;
            }
            tokio::select! {
                _ = sleep(poll_interval) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
        }
    }

    adapter.shutdown(poller).await;
    drop(out_tx);
    writer.await.context("结果输出任务异常退出")??;
    Ok(())
}

async fn submit_job(
    adapter: &JudgeAdapter,
    resolver: &LocalFileResolver,
    job: usize,
    line: &str,
    out_tx: mpsc::UnboundedSender<String>,
) {
    let on_update = update_callback(move |verdict| {
        let out_tx = out_tx.clone();
        async move {
            match serde_json::to_string(&JobUpdate { job, verdict }) {
                Ok(json) => {
                    let _ = out_tx.send(json);
                }
                Err(e) => warn!("[任务 {}] 序列化结果失败: {}", job, e),
            }
        }
    });

    match serde_json::from_str::<JobRequest>(line) {
        Ok(request) => {
            adapter
                .judge(&request.problem, &request.solution, resolver, on_update)
                .await
        }
        Err(e) => {
            warn!("[任务 {}] 无法解析评测请求: {}", job, e);
            on_update(Verdict::failed(format!("Invalid job: {}", e), None)).await;
        }
    }
}

async fn write_lines(mut rx: mpsc::UnboundedReceiver<String>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = rx.recv().await {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
