//! エンドポイントプローブ
//!
//! 監視対象URLへGETを1回発行し、応答をbool健全性として評価する。
//! 健全性を確認できない失敗はすべて「不健全」へ倒す（fail-closed）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// プローブのリクエストタイムアウト（秒）
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// ポーリング間隔の下限（秒）
pub const MIN_FREQUENCY_SECS: f64 = 0.3;

/// プローブ定義
///
/// 構築後は不変。`frequency`が`None`なら1回だけ実行するprecheck、
/// `Some`なら実行中繰り返すsafeguard。`auth`は資格情報のため
/// レポートへはシリアライズしない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDefinition {
    /// 一意なプローブ名（生成値）
    pub name: String,
    /// 監視対象URL
    pub url: String,
    /// Bearer認証トークン
    #[serde(skip_serializing, default)]
    pub auth: Option<String>,
    /// ポーリング間隔（秒）。`None`で1回のみ実行
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frequency: Option<f64>,
}

impl ProbeDefinition {
    /// 繰り返し実行するsafeguard用のプローブ定義を作る
    pub fn safeguard(url: impl Into<String>, auth: Option<String>, frequency: f64) -> Self {
        Self {
            name: format!("safeguard-{}", Uuid::new_v4().simple()),
            url: url.into(),
            auth,
            frequency: Some(frequency),
        }
    }

    /// 1回だけ実行するprecheck用のプローブ定義を作る
    pub fn precheck(url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            name: format!("precheck-{}", Uuid::new_v4().simple()),
            url: url.into(),
            auth,
            frequency: None,
        }
    }

    /// 繰り返し実行するsafeguardかどうか
    pub fn is_repeating(&self) -> bool {
        self.frequency.is_some()
    }

    /// ポーリング間隔（下限0.3秒でクランプ済み）
    pub fn interval(&self) -> Option<Duration> {
        self.frequency
            .map(|secs| Duration::from_secs_f64(secs.max(MIN_FREQUENCY_SECS)))
    }
}

/// プローブ呼び出し能力
///
/// ガーディアンはこのトレイト越しにエンドポイントを確認する。
/// 実装は複数ガーディアンから並行に呼ばれても安全であること。
#[async_trait]
pub trait EndpointProber: Send + Sync {
    /// 対象URLを1回確認し、健全なら`true`を返す
    async fn call(&self, url: &str, auth: Option<&str>) -> bool;
}

/// エンドポイントが返す判定ボディ（`{"ok": bool, "error": "..."}`）
#[derive(Debug, Deserialize)]
struct Judgement {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// reqwestによる既定のプローブ実装
///
/// 2xx以外のステータス、`ok`フィールドを欠くボディ、接続失敗・
/// タイムアウトはすべて不健全として扱う。
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// 新しいプローブ実装を作成
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn call(&self, url: &str, auth: Option<&str>) -> bool {
        let mut request = self.client.get(url);
        if let Some(auth) = auth {
            request = request.header("Authorization", format!("Bearer {}", auth));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Endpoint probe request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(
                url = %url,
                status = response.status().as_u16(),
                "Endpoint probe returned a non-success status"
            );
            return false;
        }

        let judgement: Judgement = match response.json().await {
            Ok(judgement) => judgement,
            Err(e) => {
                warn!(url = %url, error = %e, "Endpoint probe returned an unreadable body");
                return false;
            }
        };

        if !judgement.ok {
            match judgement.error {
                Some(error) => {
                    warn!(url = %url, error = %error, "Endpoint reported failure")
                }
                None => warn!(url = %url, "Endpoint reported failure"),
            }
            return false;
        }

        debug!(url = %url, "Endpoint reported healthy");
        true
    }
}
