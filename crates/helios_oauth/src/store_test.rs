use crate::crypto::{AesGcmTokenCipher, TokenCipher};
use crate::registry::OAuthRegistry;
use crate::store::{TokenStore, PROVIDER_GOOGLE};
use chrono::Utc;
use helios_common::services::{BoxFuture, TokenData, TokenRefresher};
use helios_common::SchedulingError;
use helios_config::{GoogleConfig, OAuthClientConfig};
use helios_db::repositories::{CalendarConnectionRepository, SqlCalendarConnectionRepository};
use helios_db::DbClient;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Refresher double that counts invocations and hands out sequenced tokens.
struct CountingRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRefresher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for CountingRefresher {
    fn refresh(
        &self,
        _client_id: &str,
        _client_secret: &str,
        refresh_token: &str,
    ) -> BoxFuture<'_, TokenData, SchedulingError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self.fail;
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            if fail {
                return Err(SchedulingError::RefreshFailed(
                    "invalid_grant".to_string(),
                ));
            }
            Ok(TokenData {
                access_token: format!("refreshed-{n}"),
                refresh_token,
                expiry_ms: Utc::now().timestamp_millis() + 3600 * 1000,
            })
        })
    }
}

fn registry() -> Arc<OAuthRegistry> {
    let google = GoogleConfig {
        redirect_uri: "https://app.example.com/api/auth/google/callback".to_string(),
        settings_url: "https://app.example.com/settings/calendar".to_string(),
        calendar_id: "primary".to_string(),
        oauth_clients: vec![OAuthClientConfig {
            name: "pool-a".to_string(),
            client_id: "id-a".to_string(),
            client_secret: "secret-a".to_string(),
            max_users: 50,
        }],
        token_encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        state_secret: "test-state-secret".to_string(),
    };
    Arc::new(OAuthRegistry::from_config(&google).unwrap())
}

async fn store_with(
    refresher: Arc<CountingRefresher>,
) -> (TokenStore, Arc<dyn CalendarConnectionRepository>) {
    let db = DbClient::in_memory().await.unwrap();
    let connections: Arc<dyn CalendarConnectionRepository> =
        Arc::new(SqlCalendarConnectionRepository::new(db));
    connections.init_schema().await.unwrap();

    let cipher: Arc<dyn TokenCipher> = Arc::new(
        AesGcmTokenCipher::from_base64_key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .unwrap(),
    );
    let store = TokenStore::new(connections.clone(), registry(), refresher, cipher, 5);
    (store, connections)
}

fn fresh_tokens() -> TokenData {
    TokenData {
        access_token: "access-0".to_string(),
        refresh_token: "refresh-0".to_string(),
        expiry_ms: Utc::now().timestamp_millis() + 3600 * 1000,
    }
}

fn expiring_tokens() -> TokenData {
    TokenData {
        // Expires in one minute, inside the five-minute safety window.
        expiry_ms: Utc::now().timestamp_millis() + 60 * 1000,
        ..fresh_tokens()
    }
}

#[tokio::test]
async fn save_then_get_round_trips_without_refresh() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("recruiter-1", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let tokens = store.get_tokens("recruiter-1").await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access-0");
    assert_eq!(tokens.refresh_token, "refresh-0");
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn get_tokens_returns_none_for_unknown_user() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher).await;
    assert!(store.get_tokens("nobody").await.unwrap().is_none());
    assert!(!store.has_connection("nobody").await.unwrap());
}

#[tokio::test]
async fn tokens_are_sealed_at_rest() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, connections) = store_with(refresher).await;

    store
        .save_tokens("recruiter-1", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let row = connections
        .find_by_user("recruiter-1", PROVIDER_GOOGLE)
        .await
        .unwrap()
        .unwrap();
    assert!(row.encrypted);
    assert_ne!(row.access_token, "access-0");
    assert_ne!(row.refresh_token, "refresh-0");
}

#[tokio::test]
async fn get_tokens_refreshes_ahead_of_expiry() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("recruiter-1", "pool-a", &expiring_tokens())
        .await
        .unwrap();

    let tokens = store.get_tokens("recruiter-1").await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "refreshed-1");
    assert_eq!(refresher.calls(), 1);

    // The refreshed expiry is outside the window, so a second read does not
    // trigger another refresh.
    let again = store.get_tokens("recruiter-1").await.unwrap().unwrap();
    assert_eq!(again.access_token, "refreshed-1");
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn failed_refresh_propagates() {
    let refresher = Arc::new(CountingRefresher::failing());
    let (store, _) = store_with(refresher).await;

    store
        .save_tokens("recruiter-1", "pool-a", &expiring_tokens())
        .await
        .unwrap();

    assert!(matches!(
        store.get_tokens("recruiter-1").await,
        Err(SchedulingError::RefreshFailed(_))
    ));
}

#[tokio::test]
async fn with_fresh_tokens_retries_exactly_once_on_auth_failure() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("recruiter-1", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let result = store
        .with_fresh_tokens("recruiter-1", move |access_token| {
            let seen = seen.clone();
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SchedulingError::AuthRejected(
                        "token revoked".to_string(),
                    ))
                } else {
                    Ok(access_token)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, "refreshed-1");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn with_fresh_tokens_does_not_retry_non_auth_failures() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("recruiter-1", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let result: Result<(), _> = store
        .with_fresh_tokens("recruiter-1", move |_access_token| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(SchedulingError::Provider("upstream 500".to_string()))
            }
        })
        .await;

    assert!(matches!(result, Err(SchedulingError::Provider(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(refresher.calls(), 0);
}

#[tokio::test]
async fn with_fresh_tokens_surfaces_second_auth_failure() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("recruiter-1", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let result: Result<(), _> = store
        .with_fresh_tokens("recruiter-1", move |_access_token| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(SchedulingError::AuthRejected("still revoked".to_string()))
            }
        })
        .await;

    // One refresh, one retry, then the failure stands.
    assert!(matches!(result, Err(SchedulingError::AuthRejected(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn with_fresh_tokens_requires_a_connection() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher).await;

    let result: Result<(), _> = store
        .with_fresh_tokens("nobody", |_token| async { Ok(()) })
        .await;
    assert!(matches!(
        result,
        Err(SchedulingError::RequiresConnection { .. })
    ));
}

#[tokio::test]
async fn sweep_refreshes_only_expiring_connections() {
    let refresher = Arc::new(CountingRefresher::new());
    let (store, _) = store_with(refresher.clone()).await;

    store
        .save_tokens("expiring-user", "pool-a", &expiring_tokens())
        .await
        .unwrap();
    store
        .save_tokens("healthy-user", "pool-a", &fresh_tokens())
        .await
        .unwrap();

    let refreshed = store.refresh_expiring_connections().await.unwrap();
    assert_eq!(refreshed, 1);
    assert_eq!(refresher.calls(), 1);

    let healthy = store.get_tokens("healthy-user").await.unwrap().unwrap();
    assert_eq!(healthy.access_token, "access-0");
}
