//! テスト用ヘルパー
//!
//! wiremockで健全性エンドポイントを組み立てる補助。

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 常に同じ判定を返す健全性エンドポイントをマウントする
pub async fn mount_health(mock: &MockServer, route: &str, ok: bool) {
    let body = if ok {
        json!({"ok": true})
    } else {
        json!({"ok": false, "error": "boom"})
    };
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock)
        .await;
}

/// 台本どおりの判定を順に返す健全性エンドポイントをマウントする
///
/// 最後の判定は台本が尽きた後も繰り返す。
pub async fn mount_health_sequence(mock: &MockServer, route: &str, script: &[bool]) {
    let (last, leading) = script.split_last().expect("script must not be empty");
    for ok in leading {
        let body = if *ok {
            json!({"ok": true})
        } else {
            json!({"ok": false, "error": "boom"})
        };
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(1)
            .mount(mock)
            .await;
    }
    mount_health(mock, route, *last).await;
}

/// これまでに受け取ったリクエスト数
pub async fn request_count(mock: &MockServer) -> usize {
    mock.received_requests().await.map(|r| r.len()).unwrap_or(0)
}
