use anyhow::{Context, Result};
use privchat_push::{
    cli::{Cli, Commands},
    config::{self, PushConfig, StoreBackend},
    infra::metrics,
    logging,
    model::{DeviceFilter, Notification},
    repository::{ApplicationRepository, DeviceRepository, MemoryStore, PgStore, SeedData},
    ErrorEvent, PushManager,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // 快速读取配置文件的 [logging] 段（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());
    let log_level = cli.get_log_level().unwrap_or(early_log.level);
    let log_format = cli.log_format.clone().or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    let _log_guard = logging::init_logging(&log_level, log_format.as_deref(), log_file.as_deref(), cli.quiet)?;

    match &cli.command {
        Commands::GenerateConfig { path } => generate_config(path),
        Commands::ShowConfig => show_config(&cli),
        command => run_command(&cli, command).await,
    }
}

async fn run_command(cli: &Cli, command: &Commands) -> Result<()> {
    let config = PushConfig::load(cli).context("加载配置失败")?;

    if cli.print_metrics {
        metrics::init().map_err(|e| anyhow::anyhow!("指标初始化失败: {}", e))?;
    }

    let manager = build_manager(&config).await?;

    match command {
        Commands::NotifyDevice {
            device_id,
            notification,
            wait_secs,
        } => {
            let notification = read_notification(notification)?;
            let mut errors = manager.subscribe_errors();

            let receipt = manager.notify_by_id(device_id, &notification).await?;
            println!("accepted push_id={} device_id={}", receipt.push_id, receipt.device_id);

            drain_errors(&mut errors, *wait_secs).await;
        }
        Commands::NotifyQuery {
            app_id,
            user_id,
            device_type,
            subscription,
            notification,
            wait_secs,
        } => {
            let notification = read_notification(notification)?;
            let filter = DeviceFilter {
                app_id: app_id.clone(),
                user_id: user_id.clone(),
                device_type: *device_type,
                subscription: subscription.clone(),
                ..DeviceFilter::default()
            };
            let mut errors = manager.subscribe_errors();

            let report = manager.notify_by_query(&filter, &notification).await?;
            println!(
                "matched={} accepted={} failed={}",
                report.matched,
                report.accepted.len(),
                report.failures.len()
            );
            for failure in &report.failures {
                println!("  failed device_id={} error={}", failure.device_id, failure.error);
            }

            drain_errors(&mut errors, *wait_secs).await;
        }
        Commands::Configure { app_id, device_type } => {
            let provider = manager.configure_application(app_id, *device_type).await?;
            println!(
                "configured app_id={} device_type={} provider={}",
                app_id,
                device_type,
                provider.name()
            );
        }
        Commands::GenerateConfig { .. } | Commands::ShowConfig => {}
    }

    if let Some(text) = metrics::render_metrics() {
        println!("{}", text);
    }

    Ok(())
}

async fn build_manager(config: &PushConfig) -> Result<PushManager> {
    let (applications, devices): (Arc<dyn ApplicationRepository>, Arc<dyn DeviceRepository>) =
        match config.store.backend {
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                if let Some(seed_file) = &config.store.seed_file {
                    store.load_seed(SeedData::from_json_file(seed_file)?);
                } else {
                    tracing::warn!("⚠️ 内存存储未配置种子数据，所有查询都将为空");
                }
                let applications: Arc<dyn ApplicationRepository> = store.clone();
                let devices: Arc<dyn DeviceRepository> = store;
                (applications, devices)
            }
            StoreBackend::Postgres => {
                let url = config
                    .store
                    .database_url
                    .as_deref()
                    .context("缺少 database_url")?;
                let store = Arc::new(PgStore::connect(url, config.store.max_connections).await?);
                store.ensure_schema().await?;
                let applications: Arc<dyn ApplicationRepository> = store.clone();
                let devices: Arc<dyn DeviceRepository> = store;
                (applications, devices)
            }
        };

    Ok(PushManager::from_config(config, applications, devices))
}

/// 通知参数可以是 JSON 字符串，也可以是 `@path` 指向的 JSON 文件
fn read_notification(arg: &str) -> Result<Notification> {
    let content = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("无法读取通知文件: {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&content).context("通知内容不是有效的 JSON")
}

/// 推送被接受之后的失败只会出现在错误通道上，命令退出前等待一段时间
async fn drain_errors(errors: &mut broadcast::Receiver<ErrorEvent>, wait_secs: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    loop {
        match tokio::time::timeout_at(deadline, errors.recv()).await {
            Ok(Ok(event)) => println!(
                "async error app_id={} device_type={} source={:?} error={}",
                event.app_id, event.device_type, event.source, event.error
            ),
            Ok(Err(RecvError::Lagged(skipped))) => println!("async errors lagged, skipped={}", skipped),
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    let header = "# PrivChat Push 配置文件\n# 此文件由 privchat-push generate-config 生成\n\n";
    let body = PushConfig::default().to_toml()?;
    fs::write(path, format!("{}{}", header, body)).with_context(|| format!("无法写入配置文件: {}", path))?;
    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = PushConfig::load(cli)?;
    println!("{}", config.to_toml()?);
    Ok(())
}
