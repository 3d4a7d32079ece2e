//! Agent Playground 命令行入口
//!
//! 加载配置、初始化日志、装配 Agent；单次提问或 --interactive 多轮对话，
//! 进度事件实时打印到 stderr，答案打印到 stdout。

use std::path::{Path, PathBuf};

use agent_playground::config::load_config;
use agent_playground::memory::{ConversationMemory, HistoryMessage};
use agent_playground::pipeline::{Intent, ProgressEvent, RawImage};
use agent_playground::{observability, Agent, AgentOutput, AgentRequest};
use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "playground", version, about = "Route a request to chat / search / reasoning / image tools")]
struct Cli {
    /// 用户输入
    text: Option<String>,

    /// 图片：本地文件路径、http(s) URL 或 data URI，可重复
    #[arg(long = "image", value_name = "PATH|URL")]
    images: Vec<String>,

    /// 跳过路由，按给定意图顺序执行，可重复
    #[arg(long = "intent", value_name = "NAME", value_parser = parse_intent)]
    intents: Vec<Intent>,

    /// 额外的 TOML 配置文件
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 以 JSON 打印完整输出
    #[arg(long)]
    json: bool,

    /// 多轮对话，保留历史
    #[arg(long)]
    interactive: bool,

    /// 打印模型配置检查结果后退出
    #[arg(long)]
    status: bool,
}

fn parse_intent(name: &str) -> Result<Intent, String> {
    Intent::parse(name).ok_or_else(|| {
        let known: Vec<&str> = Intent::ALL.iter().map(Intent::as_str).collect();
        format!("unknown intent '{name}' (expected one of: {})", known.join(", "))
    })
}

fn load_image(arg: &str) -> anyhow::Result<RawImage> {
    if arg.starts_with("http://") || arg.starts_with("https://") || arg.starts_with("data:") {
        return Ok(RawImage::from(arg));
    }
    let bytes = std::fs::read(Path::new(arg))
        .with_context(|| format!("Failed to read image file {arg}"))?;
    Ok(RawImage::File {
        bytes,
        mime_type: None,
    })
}

/// 组装一轮请求；待发送的图片只随第一轮请求发出
fn turn_request(
    text: &str,
    intents: &[Intent],
    history: Vec<HistoryMessage>,
    pending_images: &mut Vec<RawImage>,
    cancel: CancellationToken,
) -> AgentRequest {
    let mut request = AgentRequest::new(text)
        .with_intents(intents.to_vec())
        .with_history(history)
        .with_cancel(cancel);
    if !pending_images.is_empty() {
        request = request.with_image(std::mem::take(pending_images));
    }
    request
}

/// 空答案不写入历史
fn remember_turn(memory: &mut ConversationMemory, text: &str, answer: &str) {
    if !answer.is_empty() {
        memory.push_turn(text, answer);
    }
}

/// 执行一次请求；进度事件由后台任务打印，结束后再返回
async fn ask(agent: &Agent, request: AgentRequest) -> anyhow::Result<AgentOutput> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            print_progress(&ev);
        }
    });

    let result = agent.handle(request.with_progress(tx)).await;
    let _ = printer.await;
    result.map_err(anyhow::Error::from)
}

fn print_progress(ev: &ProgressEvent) {
    match ev {
        ProgressEvent::RouteComplete { intents } => {
            let names: Vec<&str> = intents.iter().map(Intent::as_str).collect();
            eprintln!("[{}] {}", ev.kind(), names.join(" → "));
        }
        ProgressEvent::StepStart { step } | ProgressEvent::StepComplete { step } => {
            eprintln!("[{}] {} {}", ev.kind(), step.id, step.tool);
        }
        ProgressEvent::StepError { step, error } => {
            eprintln!("[{}] {} {}: {}", ev.kind(), step.id, step.tool, error);
        }
        _ => eprintln!("[{}]", ev.kind()),
    }
}

fn print_output(output: &AgentOutput, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    if output.answer.is_empty() {
        println!("No response");
    } else {
        println!("{}", output.answer);
    }
    if let Some(images) = &output.images {
        println!("({} image(s))", images.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    observability::init(cfg.app.debug_mode);

    if cli.status {
        let status = cfg.config_status();
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let agent = Agent::from_config(&cfg);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut images = cli
        .images
        .iter()
        .map(|arg| load_image(arg))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if !cli.interactive {
        let text = cli.text.clone().context("Missing input text (or use --interactive)")?;
        let request = turn_request(&text, &cli.intents, Vec::new(), &mut images, cancel);
        let output = ask(&agent, request).await?;
        return print_output(&output, cli.json);
    }

    let mut memory = ConversationMemory::new(cfg.app.max_context_turns);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("Interactive mode. Type 'exit' to quit, '/clear' to reset history.");

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        match text {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                memory.clear();
                continue;
            }
            _ => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        let request = turn_request(
            text,
            &cli.intents,
            memory.history(),
            &mut images,
            cancel.child_token(),
        );
        match ask(&agent, request).await {
            Ok(output) => {
                print_output(&output, cli.json)?;
                remember_turn(&mut memory, text, &output.answer);
            }
            Err(e) => eprintln!("Error: {e:#}"),
        }
    }

    Ok(())
}
