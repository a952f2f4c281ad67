use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Error, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use super::structured_log::StructuredLogLayer;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// ログの出力形式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 人間向けのテキスト形式
    #[default]
    Text,
    /// 1行1イベントの JSON 形式
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Tracing サブスクライバを一度だけ初期化する。
///
/// ログは標準エラーに出力され、標準出力はレポート専用になる。
/// フィルタは `RUST_LOG` で上書きでき、既定は `info`。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init(format: LogFormat) -> Result<()> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            registry
                .with(fmt_layer)
                .try_init()
                .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
        }
        LogFormat::Json => {
            registry
                .with(StructuredLogLayer)
                .try_init()
                .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;
        }
    }

    let _ = TRACING_INIT.set(());
    info!(?format, "tracing initialized");
    Ok(())
}
