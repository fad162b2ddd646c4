//! yin-play 的日志输出.
//!
//! 终端 (stderr, 彩色) 与文件 (logs/{prefix}.{date}.log, 无色) 共用同一套过滤规则.
//! 过滤优先级: YIN_LOG, RUST_LOG, 最后才是 `-v` 的次数.
//!
//! | `-v` 次数 | 级别 |
//! |-----------|------|
//! | 0 | info |
//! | 1 | debug, 可以看到调度决策和解码请求 |
//! | 2 | 项目 crate 为 trace, 依赖库保持 info |
//! | 3+ | 全部 trace |

use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

const LOG_DIR: &str = "logs";

/// 进程结束前必须存活, 否则非阻塞写入线程提前退出
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 项目内各 crate 的 tracing target
const PROJECT_TARGETS: [&str; 6] = [
    "yin",
    "yin_core",
    "yin_codec",
    "yin_format",
    "yin_playback",
    "yin_play",
];

fn verbosity_directives(verbosity: u8) -> String {
    match verbosity {
        0 => "info".to_string(),
        1 => "debug".to_string(),
        2 => PROJECT_TARGETS
            .iter()
            .map(|target| format!("{target}=trace"))
            .chain(std::iter::once("info".to_string()))
            .collect::<Vec<_>>()
            .join(","),
        _ => "trace".to_string(),
    }
}

fn filter_for(verbosity: u8) -> EnvFilter {
    match EnvFilter::try_from_env("YIN_LOG") {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(verbosity_directives(verbosity))),
    }
}

/// 安装全局订阅器, 每个进程只能调用一次
pub fn init(file_prefix: &str, verbosity: u8) -> Result<()> {
    std::fs::create_dir_all(LOG_DIR).context("创建日志目录失败")?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build(LOG_DIR)
        .with_context(|| format!("无法在 {LOG_DIR}/ 下创建日志文件"))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(LineFormat { colored: true })
        .with_filter(filter_for(verbosity));
    let file = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .event_format(LineFormat { colored: false })
        .with_filter(filter_for(verbosity));

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .context("全局日志订阅器已存在")
}

/// 单行格式: `[时间] 级别 > 字段`. 文件行带日期, 终端行只带时刻
struct LineFormat {
    colored: bool,
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        _ => "\x1b[34m",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        if self.colored {
            let stamp = Local::now().format("%H:%M:%S%.3f");
            write!(writer, "[{stamp}] {}{level:5}\x1b[0m > ", level_color(level))?;
        } else {
            let stamp = Local::now().format("%m-%d %H:%M:%S%.3f");
            write!(writer, "[{stamp}] {level:5} > ")?;
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
