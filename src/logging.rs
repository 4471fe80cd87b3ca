use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日志系统
///
/// 指定 `log_file` 时日志写入文件（非阻塞），返回的 guard 需要保持到进程退出，
/// 否则缓冲区中的日志会丢失。
pub fn init_logging(
    log_level: &str,
    log_format: Option<&str>,
    log_file: Option<&str>,
    quiet: bool,
) -> Result<Option<WorkerGuard>> {
    // 如果静默模式，只输出错误
    let level = if quiet { "error" } else { log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (writer, guard, ansi) = match log_file {
        Some(path) => {
            let path = Path::new(path);
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .with_context(|| format!("无效的日志文件路径: {:?}", path))?;

            if let Some(dir) = directory {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("无法创建日志目录: {:?}", dir))?;
            }

            let appender = tracing_appender::rolling::never(directory.unwrap_or(Path::new(".")), file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), None, true),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);

    let result = match log_format {
        // JSON 格式（适合生产环境）
        Some("json") => registry.with(layer.json()).try_init(),
        // Pretty 格式（适合开发环境）
        Some("pretty") | Some("dev") => registry.with(layer.pretty()).try_init(),
        // Compact 格式（默认）
        _ => registry.with(layer.compact()).try_init(),
    };
    result.context("日志系统初始化失败")?;

    Ok(guard)
}
