//! Laten CLI 客户端
//!
//! 非交互式 CLI，用于调试首页推荐逻辑：
//! 指定后端和用户后执行一次计算，结果以 JSON 输出到 stdout

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, Utc};
use clap::{Parser, Subcommand};
use laten_sdk_core::social::models::{
    connection_status, rsvp_status, Connection, Event, EventParticipation, User, UserPreference,
};
use laten_sdk_core::{
    Backend, ClientConfig, LatenClient, PlatformCapabilities, RestStoreConfig, SqliteStore,
};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::info;

/// Laten CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "laten-cli")]
#[command(about = "Laten CLI 客户端 - 用于调试推荐与首页数据", long_about = None)]
struct Args {
    /// 本地 SQLite 镜像（与 --api-url 二选一）
    #[arg(long, env = "LATEN_DB_URL")]
    db_url: Option<String>,

    /// 托管后端地址
    #[arg(long, env = "LATEN_API_URL")]
    api_url: Option<String>,

    /// 托管后端公开 key
    #[arg(long, env = "LATEN_API_KEY", default_value = "")]
    api_key: String,

    /// 登录 token（不填则使用 api key）
    #[arg(long, env = "LATEN_ACCESS_TOKEN")]
    token: Option<String>,

    /// 当前用户 ID
    #[arg(short, long)]
    user: Option<String>,

    /// 城市（同城加分、降级推荐）
    #[arg(short, long)]
    city: Option<String>,

    /// 推荐条数
    #[arg(short, long)]
    limit: Option<usize>,

    /// 运行平台：web / ios / android
    #[arg(long, default_value = "web")]
    platform: PlatformCapabilities,

    /// 日志级别（默认: info,laten_sdk_core=debug）
    #[arg(long, default_value = "info,laten_sdk_core=debug")]
    log_level: String,

    /// 日志文件路径
    #[arg(long, env = "LATEN_LOG_FILE", default_value = "laten-debug.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 可能认识的人
    Suggest,
    /// 今晚精选
    Tonight,
    /// 为你推荐
    ForYou,
    /// 首页全部区块
    Feed,
    /// 向本地 SQLite 镜像写入演示数据
    SeedDemo,
}

/// 日志写到 stderr 与追加模式的日志文件，stdout 只输出 JSON 结果
fn init_logger(log_level: &str, log_file: &Path) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("无法打开日志文件 {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .init();

    info!("[CLI] 📝 日志文件: {}", log_file.display());
    Ok(())
}

fn backend_from_args(args: &Args) -> Result<Backend> {
    match (&args.db_url, &args.api_url) {
        (Some(db_url), None) => Ok(Backend::Sqlite {
            db_url: db_url.clone(),
        }),
        (None, Some(api_url)) => {
            let mut rest = RestStoreConfig::new(api_url.clone(), args.api_key.clone());
            rest.access_token = args.token.clone();
            Ok(Backend::Rest(rest))
        }
        (Some(_), Some(_)) => bail!("--db-url 与 --api-url 只能指定一个"),
        (None, None) => bail!("必须指定 --db-url 或 --api-url"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("序列化输出失败")?
    );
    Ok(())
}

/// 演示数据：以当前时间为基准生成今晚和明天的活动
async fn seed_demo(db_url: &str) -> Result<()> {
    let store = SqliteStore::connect(db_url).await?;

    let users = [
        ("ana", "Ana", "Berlin"),
        ("ben", "Ben", "Berlin"),
        ("cleo", "Cleo", "Berlin"),
        ("dj_kai", "DJ Kai", "Hamburg"),
        ("eve", "Eve", "Berlin"),
    ];
    for (id, name, city) in users {
        store
            .upsert_profile(&User {
                id: id.to_string(),
                display_name: name.to_string(),
                avatar_url: None,
                city: Some(city.to_string()),
            })
            .await?;
    }

    for (follower, following) in [("ana", "ben"), ("ben", "cleo"), ("ben", "dj_kai")] {
        store
            .upsert_connection(&Connection {
                follower_id: follower.to_string(),
                following_id: following.to_string(),
                status: connection_status::ACTIVE.to_string(),
            })
            .await?;
    }

    let now = Utc::now();
    let tonight_start = (Local::now() + Duration::minutes(90)).with_timezone(&Utc);
    let events = [
        ("warehouse", "Warehouse Rave", tonight_start),
        ("rooftop", "Rooftop Sessions", now + Duration::days(1)),
    ];
    for (id, title, start_time) in events {
        store
            .upsert_event(&Event {
                id: id.to_string(),
                title: title.to_string(),
                venue: None,
                city: Some("Berlin".to_string()),
                start_time,
                is_active: true,
            })
            .await?;
    }

    for (user_id, event_id) in [("ana", "warehouse"), ("cleo", "warehouse"), ("eve", "warehouse")] {
        store
            .upsert_rsvp(&EventParticipation {
                user_id: user_id.to_string(),
                event_id: event_id.to_string(),
                status: rsvp_status::GOING.to_string(),
            })
            .await?;
    }

    store
        .upsert_preference(&UserPreference {
            user_id: "ana".to_string(),
            favorite_genres: Some("techno,house".to_string()),
            favorite_city: Some("Berlin".to_string()),
        })
        .await?;
    store.upsert_recommendation("ana", "rooftop", 88, 0).await?;
    store.upsert_recommendation("ana", "warehouse", 64, 1).await?;

    info!("[CLI] ✅ 演示数据已写入: {}", db_url);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level, &args.log_file)?;

    let backend = backend_from_args(&args)?;

    if let Command::SeedDemo = args.command {
        let Backend::Sqlite { db_url } = &backend else {
            bail!("seed-demo 只支持本地 SQLite 镜像");
        };
        return seed_demo(db_url).await;
    }

    let mut config = ClientConfig::new(args.user.clone(), backend);
    config.platform = args.platform;
    let client = LatenClient::connect(config).await?;
    let city = args.city.as_deref();

    match args.command {
        Command::Suggest => print_json(&client.suggestions(city, args.limit).await),
        Command::Tonight => print_json(&client.tonight().await),
        Command::ForYou => print_json(&client.for_you().await),
        Command::Feed => print_json(&client.home_feed(city).await),
        Command::SeedDemo => Ok(()),
    }
}
