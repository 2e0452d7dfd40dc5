//! scanfeed 命令行入口
//!
//! 记录输出到 stdout，提示与日志输出到 stderr。
//! Ctrl-C 取消扫描；再次 Ctrl-C（或在请求尚未建立时按下）直接退出。

use anyhow::Context;
use clap::{ArgAction, Parser};
use scanfeed_lib::config::default_config_path;
use scanfeed_lib::{
    CompletionStatus, DispatchSink, FeedConfig, Notice, Record, ScanClient, ScanRequest,
    ScanSession, StopHandle,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "scanfeed", version, about = "Stream a live link-scan log from a scan server")]
struct Cli {
    /// 要扫描的 URL
    url: String,

    /// 逗号分隔的排除关键字
    #[arg(long, default_value = "")]
    exclude: String,

    /// 过滤级别（-1 表示不设置）
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    filter_level: i32,

    #[arg(long)]
    exclude_external: bool,

    #[arg(long)]
    exclude_internal: bool,

    #[arg(long)]
    follow: bool,

    #[arg(long)]
    get: bool,

    #[arg(long)]
    ordered: bool,

    #[arg(long)]
    recursive: bool,

    /// 让扫描器输出详细结果
    #[arg(long = "scan-verbose")]
    scan_verbose: bool,

    #[arg(long, default_value_t = 0)]
    requests: u32,

    #[arg(long, default_value_t = 0)]
    host_requests: u32,

    #[arg(long, default_value = "Mozilla/5.0")]
    user_agent: String,

    /// 覆盖配置中的扫描服务地址
    #[arg(long)]
    endpoint: Option<String>,

    /// 配置文件路径，默认 ~/.scanfeed/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// 会话总期限（毫秒）
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// 日志详细程度，可重复
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// 只输出错误日志
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn scan_request(&self) -> ScanRequest {
        ScanRequest::new(self.url.clone())
            .with_exclude(self.exclude.clone())
            .with_filter_level(self.filter_level)
            .with_exclude_external(self.exclude_external)
            .with_exclude_internal(self.exclude_internal)
            .with_follow(self.follow)
            .with_get(self.get)
            .with_ordered(self.ordered)
            .with_recursive(self.recursive)
            .with_verbose(self.scan_verbose)
            .with_requests(self.requests)
            .with_host_requests(self.host_requests)
            .with_user_agent(self.user_agent.clone())
    }

    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// 终端输出端
///
/// 写入失败（例如 `scanfeed URL | head -1` 的管道另一端已退出）时
/// 通过停止句柄取消会话，之后的记录不再写入。
struct ConsoleSink<W: Write> {
    out: W,
    stop: StopHandle,
    closed: bool,
}

impl<W: Write> ConsoleSink<W> {
    fn new(out: W, stop: StopHandle) -> Self {
        Self {
            out,
            stop,
            closed: false,
        }
    }

    fn write_record(&mut self, record: &Record) -> std::io::Result<()> {
        writeln!(self.out, "{}", record)?;
        self.out.flush()
    }
}

impl<W: Write> DispatchSink for ConsoleSink<W> {
    fn dispatch(&mut self, record: Record) {
        if self.closed {
            return;
        }
        if let Err(err) = self.write_record(&record) {
            self.closed = true;
            tracing::warn!(error = %err, "写入 stdout 失败，停止扫描");
            self.stop.stop();
        }
    }

    fn notify(&mut self, notice: &Notice) {
        eprintln!("{}", notice);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = FeedConfig::load(&path)
        .await
        .with_context(|| format!("加载配置失败: {}", path.display()))?;

    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if cli.timeout_ms.is_some() {
        config = config.with_timeout_ms(cli.timeout_ms);
    }

    let client = ScanClient::new(config)?;
    let session = ScanSession::new(client);
    tracing::debug!(session_id = %session.session_id(), "会话已创建");
    tokio::spawn(watch_ctrl_c(session.stop_handle()));

    let request = cli.scan_request();
    let mut sink = ConsoleSink::new(std::io::stdout().lock(), session.stop_handle());
    let status = session.run(&request, &mut sink).await;

    Ok(match status {
        CompletionStatus::Completed => ExitCode::SUCCESS,
        CompletionStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        CompletionStatus::Failed(_) => ExitCode::FAILURE,
    })
}

async fn watch_ctrl_c(stop: StopHandle) {
    loop {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if !stop.stop() {
            tracing::debug!(state = ?stop.state(), "取消未生效，直接退出");
            std::process::exit(EXIT_CANCELLED.into());
        }
    }
}
