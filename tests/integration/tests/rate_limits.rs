//! REST rate limiting against a scripted API
//!
//! Run with: cargo test -p integration-tests --test rate_limits

use integration_tests::{global_rate_limit, json_response, limited_response, test_config, MockHttp};
use parking_lot::Mutex;
use serde_json::json;
use shardline_rest::{Request, RestClient, RestClientConfig, Route};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn client(http: &Arc<MockHttp>) -> RestClient {
    RestClient::with_transport(RestClientConfig::from_client(&test_config()), http.clone())
}

#[tokio::test(start_paused = true)]
async fn test_sixth_request_waits_for_bucket_reset() {
    const LIMIT: u32 = 5;
    let window = Duration::from_secs(2);

    // Server side of a 5-per-2s bucket
    let bucket: Mutex<(Option<Instant>, u32)> = Mutex::new((None, 0));
    let overflowed = Arc::new(AtomicBool::new(false));
    let overflow = Arc::clone(&overflowed);
    let http = MockHttp::new(move |_| {
        let now = Instant::now();
        let mut state = bucket.lock();
        match state.0 {
            Some(start) if now < start + window => {}
            _ => *state = (Some(now), 0),
        }
        state.1 += 1;
        if state.1 > LIMIT {
            overflow.store(true, Ordering::SeqCst);
            return global_rate_limit(1.0);
        }
        let reset_after = (state.0.unwrap_or(now) + window - now).as_secs_f64();
        limited_response(&json!([]), "abcd", LIMIT, LIMIT - state.1, reset_after)
    });
    let rest = client(&http);

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let rest = rest.clone();
        tasks.push(tokio::spawn(async move {
            rest.execute(&Request::new(Route::get("/channels/101/messages"))).await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    assert!(!overflowed.load(Ordering::SeqCst), "client exceeded the bucket");
    let times: Vec<Instant> = http.requests().iter().map(|r| r.at).collect();
    assert_eq!(times.len(), 6);
    assert!(times[4] - times[0] < window);
    assert!(times[5] - times[0] >= window);
}

#[tokio::test(start_paused = true)]
async fn test_global_limit_holds_other_routes() {
    let limited = AtomicBool::new(false);
    let http = MockHttp::new(move |_| {
        if limited.swap(true, Ordering::SeqCst) {
            json_response(200, &json!({}))
        } else {
            global_rate_limit(1.5)
        }
    });
    let rest = client(&http);

    let started = Instant::now();
    let first = {
        let rest = rest.clone();
        tokio::spawn(async move {
            rest.execute(&Request::new(Route::post("/channels/1/messages"))).await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(http.request_count(), 1);

    let other = rest
        .execute(&Request::new(Route::get("/guilds/2/members/3")))
        .await
        .unwrap();
    assert_eq!(other.status, 200);
    assert_eq!(first.await.unwrap().unwrap().status, 200);

    let requests = http.requests();
    assert_eq!(requests.len(), 3);
    for later in &requests[1..] {
        assert!(later.at - started >= Duration::from_millis(1_500), "{later:?}");
    }
    assert_eq!(requests[0].path(), "/channels/1/messages");
}

#[tokio::test(start_paused = true)]
async fn test_separate_buckets_do_not_block_each_other() {
    let http = MockHttp::new(|request| {
        if request.url.contains("/channels/1/") {
            limited_response(&json!({}), "one", 1, 0, 30.0)
        } else {
            limited_response(&json!({}), "two", 5, 4, 30.0)
        }
    });
    let rest = client(&http);
    let exhausted = Route::get("/channels/1/messages");

    rest.execute(&Request::new(exhausted.clone())).await.unwrap();
    assert_eq!(rest.limiter().remaining(&exhausted), Some(0));

    let started = Instant::now();
    rest.execute(&Request::new(Route::get("/channels/2/messages")))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let queued = {
        let rest = rest.clone();
        tokio::spawn(async move { rest.execute(&Request::new(exhausted)).await })
    };
    queued.await.unwrap().unwrap();
    assert!(started.elapsed() >= Duration::from_secs(29));
}
