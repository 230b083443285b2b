mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use console_service::config::HttpLimits;
use support::{google_claims, manage_request, router_with, FakeValidator, ParkedInstances};
use tower::util::ServiceExt;

fn ping() -> Request<Body> {
    Request::builder()
        .uri("/ping")
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn in_flight_cap_is_shared_by_every_route() -> Result<()> {
    let validator = Arc::new(FakeValidator::default());
    validator.register("raw.jwt.two", google_claims("two"));
    let parked = Arc::new(ParkedInstances::default());
    let router = router_with(
        &["two"],
        validator,
        parked.clone(),
        HttpLimits {
            request_timeout: Duration::from_secs(10),
            max_in_flight: 1,
        },
    );

    let held = tokio::spawn(
        router
            .clone()
            .oneshot(manage_request("GET", Some("token=raw.jwt.two"))),
    );
    parked.entered.notified().await;

    // The only slot belongs to /manage, so /ping has to wait for it.
    let waiting = tokio::time::timeout(Duration::from_millis(300), router.clone().oneshot(ping())).await;
    assert!(waiting.is_err(), "/ping completed while the slot was held");

    parked.release.notify_one();
    let manage = held.await??;
    assert_eq!(manage.status(), StatusCode::OK);

    let pong = router.oneshot(ping()).await?;
    assert_eq!(pong.status(), StatusCode::OK);
    Ok(())
}
