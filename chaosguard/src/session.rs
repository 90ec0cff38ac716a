//! 信頼性サービスHTTPセッション
//!
//! SLOプローブと実行結果アップロードが使う認証済みクライアント。
//! ガーディアンはこのセッションを使わず、監視対象URLへ直接アクセスする。

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use chaosguard_common::types::{config_flag, get_str, Configuration, Secrets};

use crate::config::{get_env, get_env_or};
use crate::error::{ActivityError, ActivityResult};

/// 信頼性サービスのデフォルトホスト
pub const DEFAULT_SERVICE_HOST: &str = "app.chaosguard.dev";

/// サービスAPIのリクエストタイムアウト（秒）
pub const SERVICE_TIMEOUT_SECS: u64 = 30;

/// 信頼性サービスへの認証済みセッション
///
/// ホストは secrets `host` → `CHAOSGUARD_HOST` → デフォルトの順、
/// トークンは secrets `token` → `CHAOSGUARD_TOKEN` の順で解決する。
/// トークンが解決できない場合は設定エラー。
#[derive(Debug, Clone)]
pub struct ServiceSession {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceSession {
    /// 設定・シークレット・環境変数からセッションを構築する
    ///
    /// 設定フラグ `chaosguard_use_http` で http スキームへ、
    /// `chaosguard_verify_tls: false` で証明書検証なしへ切り替える
    /// （自己署名証明書のステージング環境向け）。
    pub fn new(configuration: &Configuration, secrets: &Secrets) -> ActivityResult<Self> {
        let host = get_str(secrets, "host")
            .map(str::to_string)
            .unwrap_or_else(|| get_env_or("CHAOSGUARD_HOST", DEFAULT_SERVICE_HOST));
        let token = get_str(secrets, "token")
            .map(str::to_string)
            .or_else(|| get_env("CHAOSGUARD_TOKEN"))
            .ok_or_else(|| {
                ActivityError::Config(
                    "missing service token (secrets `token` or CHAOSGUARD_TOKEN)".to_string(),
                )
            })?;

        let use_http = config_flag(configuration, "chaosguard_use_http", false);
        let verify_tls = config_flag(configuration, "chaosguard_verify_tls", true);
        let scheme = if use_http { "http" } else { "https" };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ActivityError::Config("service token contains invalid header characters".to_string())
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SERVICE_TIMEOUT_SECS))
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{scheme}://{host}/api/v1"),
        })
    }

    /// ベースURL（`{scheme}://{host}/api/v1`）
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// ベースURL配下のパスを絶対URLへ連結する
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GETリクエストを送る
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ActivityResult<reqwest::Response> {
        Ok(self.client.get(self.url(path)).query(query).send().await?)
    }

    /// JSONボディ付きPOSTリクエストを送る
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> ActivityResult<reqwest::Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }
}
