use clap::{Parser, Subcommand};

use crate::model::DeviceType;

impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// PrivChat Push - 推送通知调度工具
#[derive(Parser, Debug)]
#[command(name = "privchat-push")]
#[command(version)]
#[command(about = "按设备类型选择推送通道并清理失效令牌的推送调度器", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, value_name = "FILE", help = "指定配置文件路径")]
    pub config_file: Option<String>,

    /// 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, value_name = "PATH", help = "日志输出文件路径")]
    pub log_file: Option<String>,

    /// 数据库连接 URL（指定后使用 PostgreSQL 存储）
    #[arg(long, value_name = "URL", help = "数据库连接字符串")]
    pub database_url: Option<String>,

    /// 内存存储的种子数据
    #[arg(long, value_name = "FILE", help = "应用和设备种子数据（JSON）")]
    pub seed_file: Option<String>,

    /// 结束时输出 Prometheus 指标
    #[arg(long, help = "命令结束时打印 Prometheus 指标")]
    pub print_metrics: bool,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', help = "静默模式（不输出日志）")]
    pub quiet: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 向单个设备推送
    NotifyDevice {
        /// 设备 ID
        #[arg(value_name = "DEVICE_ID")]
        device_id: String,
        /// 通知内容（JSON 字符串，或 @文件路径）
        #[arg(long, value_name = "JSON")]
        notification: String,
        /// 等待异步错误的秒数
        #[arg(long, value_name = "SECS", default_value_t = 3)]
        wait_secs: u64,
    },
    /// 按条件向多个设备推送
    NotifyQuery {
        #[arg(long)]
        app_id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long, value_parser = parse_device_type)]
        device_type: Option<DeviceType>,
        #[arg(long)]
        subscription: Option<String>,
        /// 通知内容（JSON 字符串，或 @文件路径）
        #[arg(long, value_name = "JSON")]
        notification: String,
        /// 等待异步错误的秒数
        #[arg(long, value_name = "SECS", default_value_t = 3)]
        wait_secs: u64,
    },
    /// 预先配置应用的 Provider
    Configure {
        #[arg(value_name = "APP_ID")]
        app_id: String,
        #[arg(value_name = "DEVICE_TYPE", value_parser = parse_device_type)]
        device_type: DeviceType,
    },
    /// 生成默认配置文件
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = crate::config::DEFAULT_CONFIG_FILE)]
        path: String,
    },
    /// 显示最终配置（合并后的配置）
    ShowConfig,
}

fn parse_device_type(s: &str) -> Result<DeviceType, String> {
    s.parse()
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }

        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }

        // 根据 verbose 级别设置
        match self.verbose {
            0 => None, // 使用默认或配置文件
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }
}
