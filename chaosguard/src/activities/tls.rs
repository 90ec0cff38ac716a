//! TLS証明書トレランス
//!
//! 証明書取得プローブが返すJSONドキュメント（`value["cert"]`配下に
//! `not_valid_after`、`extensions.subjectAltName`、`fingerprints`、
//! `issuer`を持つ）に対する純粋な判定関数。

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::config::parse_window;
use crate::error::{ActivityError, ActivityResult};

/// サポートするフィンガープリントのハッシュ種別
const FINGERPRINT_HASHES: &[&str] = &["md5", "sha1", "sha256"];

/// 証明書の失効が指定期間より先か判定する
///
/// `duration`は`"7d"`や`"1w"`のような`<数値><単位>`形式。
pub fn expire_in_more_than(duration: &str, value: &Value) -> ActivityResult<bool> {
    let not_valid_after = cert_field(value, &["not_valid_after"])?
        .as_str()
        .ok_or_else(|| {
            ActivityError::InvalidActivity("cert not_valid_after must be a string".to_string())
        })?;
    debug!(not_valid_after, "Checking certificate expiry");
    let expiry = parse_expiry(not_valid_after)?;
    let delta = parse_window(duration);
    Ok(Utc::now() + delta < expiry)
}

/// 証明書が指定の代替名を持つか判定する
///
/// `strict`なら公開されている代替名集合と完全一致、そうでなければ
/// `alt_names`が部分集合であること。
pub fn has_subject_alt_names(
    alt_names: &[String],
    strict: bool,
    value: &Value,
) -> ActivityResult<bool> {
    let exported = cert_field(value, &["extensions", "subjectAltName"])?;
    let exported: BTreeSet<&str> = exported
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if exported.is_empty() && !alt_names.is_empty() {
        debug!("Certificate exposes no subject alternative names");
        return Ok(false);
    }

    let expected: BTreeSet<&str> = alt_names.iter().map(String::as_str).collect();
    debug!(?exported, ?expected, "Comparing subject alternative names");
    if strict {
        Ok(exported == expected)
    } else {
        Ok(expected.is_subset(&exported))
    }
}

/// 証明書のフィンガープリントを検証する
///
/// `hash`は`md5`・`sha1`・`sha256`のいずれか。16進表記の大文字小文字は
/// 区別しない。
pub fn has_fingerprint(fingerprint: &str, hash: &str, value: &Value) -> ActivityResult<bool> {
    if !FINGERPRINT_HASHES.contains(&hash) {
        return Err(ActivityError::InvalidActivity(
            "fingerprint hash must be one of md5, sha1, sha256".to_string(),
        ));
    }
    let exported = cert_field(value, &["fingerprints", hash])?
        .as_str()
        .unwrap_or("");
    Ok(exported.eq_ignore_ascii_case(fingerprint))
}

/// 証明書の発行者を検証する
pub fn is_issued_by(issuer: &str, value: &Value) -> ActivityResult<bool> {
    let exported = cert_field(value, &["issuer"])?.as_str().unwrap_or("");
    Ok(exported == issuer)
}

/// 証明書をまとめて検証する
///
/// 失効期限は常に確認する。`alt_names`・`fingerprint_sha256`・`issuer`
/// は与えられたものだけを確認し、すべて合格なら`true`。
pub fn verify_tls_cert(
    expire_after: &str,
    alt_names: Option<&[String]>,
    fingerprint_sha256: Option<&str>,
    issuer: Option<&str>,
    value: &Value,
) -> ActivityResult<bool> {
    if !expire_in_more_than(expire_after, value)? {
        return Ok(false);
    }
    if let Some(alt_names) = alt_names {
        if !has_subject_alt_names(alt_names, true, value)? {
            return Ok(false);
        }
    }
    if let Some(fingerprint) = fingerprint_sha256 {
        if !has_fingerprint(fingerprint, "sha256", value)? {
            return Ok(false);
        }
    }
    if let Some(issuer) = issuer {
        if !is_issued_by(issuer, value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `value["cert"]`配下のフィールドを辿る
fn cert_field<'a>(value: &'a Value, keys: &[&str]) -> ActivityResult<&'a Value> {
    let mut current = value.get("cert").ok_or_else(|| {
        ActivityError::InvalidActivity("value does not contain a cert document".to_string())
    })?;
    for key in keys {
        current = current.get(key).ok_or_else(|| {
            ActivityError::InvalidActivity(format!("cert document is missing `{key}`"))
        })?;
    }
    Ok(current)
}

/// 失効日時を読む（RFC3339、なければ素朴なISO形式）
fn parse_expiry(raw: &str) -> ActivityResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            ActivityError::InvalidActivity(format!("unreadable cert expiry date '{raw}': {e}"))
        })
}
