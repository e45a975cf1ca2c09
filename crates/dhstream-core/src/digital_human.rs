//! Digital human profile returned by `GetDigitalHumanInfo`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::task::deserialize_app_id;

/// Digital human profile plus the credentials needed to preload its assets.
///
/// The token carries an expiry; callers must check it before reuse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DigitalHumanInfo {
    #[serde(rename = "DigitalHumanId")]
    pub id: String,

    pub name: String,

    #[serde(rename = "AvatarUrl", alias = "CoverUrl", skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    pub is_public: bool,

    #[serde(deserialize_with = "deserialize_app_id")]
    pub app_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Token expiry, epoch milliseconds.
    #[serde(rename = "ExpireTime")]
    pub expire_time_ms: i64,
}

impl DigitalHumanInfo {
    /// True once `now_ms` has reached the token expiry.
    ///
    /// An unset expiry (`0`) counts as expired.
    pub fn is_token_expired(&self, now_ms: i64) -> bool {
        self.expire_time_ms <= now_ms
    }

    /// The token, if present and not yet expired at `now_ms`.
    pub fn usable_token(&self, now_ms: i64) -> Option<&str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() && !self.is_token_expired(now_ms) => Some(token),
            _ => None,
        }
    }

    /// [`usable_token`](Self::usable_token) against the wall clock.
    pub fn current_token(&self) -> Option<&str> {
        self.usable_token(Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DigitalHumanInfo {
        serde_json::from_value(json!({
            "DigitalHumanId": "dh-1",
            "Name": "Ava",
            "AvatarUrl": "https://cdn.example.com/ava.png",
            "IsPublic": true,
            "AppId": 42,
            "Token": "tok",
            "ExpireTime": 2_000
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_profile() {
        let info = sample();
        assert_eq!(info.id, "dh-1");
        assert_eq!(info.name, "Ava");
        assert_eq!(info.cover_url.as_deref(), Some("https://cdn.example.com/ava.png"));
        assert_eq!(info.preview_url, None);
        assert!(info.is_public);
        assert_eq!(info.app_id, 42);
        assert_eq!(info.expire_time_ms, 2_000);
    }

    #[test]
    fn test_cover_url_alias() {
        let info: DigitalHumanInfo =
            serde_json::from_value(json!({ "CoverUrl": "https://x/c.png" })).unwrap();
        assert_eq!(info.cover_url.as_deref(), Some("https://x/c.png"));
    }

    #[test]
    fn test_token_expiry() {
        let info = sample();
        assert_eq!(info.usable_token(1_999), Some("tok"));
        assert!(info.is_token_expired(2_000));
        assert_eq!(info.usable_token(2_001), None);

        let unset = DigitalHumanInfo::default();
        assert!(unset.is_token_expired(0));
        assert_eq!(unset.usable_token(0), None);
    }
}
