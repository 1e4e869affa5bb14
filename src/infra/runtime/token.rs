//! Cached bearer/session tokens with expiry.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Tokens expiring within this window are refreshed early.
const EXPIRY_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Token<T> {
    pub value: T,
    /// `None` for tokens without a known lifetime (kept until invalidated).
    pub expires_at: Option<DateTime<Utc>>,
}

impl<T> Token<T> {
    pub fn new(value: T, expires_in_secs: Option<i64>) -> Self {
        let expires_at = expires_in_secs.map(|s| Utc::now() + Duration::seconds(s));
        Self { value, expires_at }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => at - Duration::seconds(EXPIRY_SKEW_SECS) > now,
        }
    }
}

/// One token slot shared across concurrent calls. The lock is held while
/// refreshing so parallel callers wait for a single login.
#[derive(Debug)]
pub struct TokenCache<T> {
    slot: Arc<Mutex<Option<Token<T>>>>,
}

impl<T> Clone for TokenCache<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone() }
    }
}

impl<T> Default for TokenCache<T> {
    fn default() -> Self {
        Self { slot: Arc::new(Mutex::new(None)) }
    }
}

impl<T: Clone> TokenCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_refresh<E, F, Fut>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Token<T>, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(tok) = slot.as_ref() {
            if tok.is_fresh(Utc::now()) {
                return Ok(tok.value.clone());
            }
            tracing::debug!("cached token expired, refreshing");
        }
        let tok = fetch().await?;
        let value = tok.value.clone();
        *slot = Some(tok);
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    pub async fn peek(&self) -> Option<T> {
        self.slot.lock().await.as_ref().map(|t| t.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn fetches_once_while_fresh() {
        let cache: TokenCache<String> = TokenCache::new();
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Token::new("t1".to_string(), Some(3600)))
                })
                .await
                .unwrap();
            assert_eq!(v, "t1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_when_expired() {
        let cache: TokenCache<String> = TokenCache::new();
        cache
            .get_or_refresh(|| async { Ok::<_, ()>(Token::new("old".to_string(), Some(10))) })
            .await
            .unwrap();
        // 10s lifetime is inside the skew window, so the next call refreshes
        let v = cache
            .get_or_refresh(|| async { Ok::<_, ()>(Token::new("new".to_string(), Some(3600))) })
            .await
            .unwrap();
        assert_eq!(v, "new");
    }

    #[tokio::test]
    async fn invalidate_clears_and_errors_do_not_store() {
        let cache: TokenCache<String> = TokenCache::new();
        cache
            .get_or_refresh(|| async { Ok::<_, ()>(Token::new("a".to_string(), None)) })
            .await
            .unwrap();
        assert_eq!(cache.peek().await.as_deref(), Some("a"));
        cache.invalidate().await;
        assert!(cache.peek().await.is_none());
        let res = cache.get_or_refresh(|| async { Err::<Token<String>, _>("down") }).await;
        assert_eq!(res.unwrap_err(), "down");
        assert!(cache.peek().await.is_none());
    }
}
