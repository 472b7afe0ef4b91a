#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App, HttpResponse};
use async_trait::async_trait;
use std::sync::Arc;
use votely::repo::inmem::InMemRepo;
use votely::storage::{AssetStore, AssetStoreError};
use votely::{config, AppState, SecurityHeaders};

struct NullAssets;

#[async_trait]
impl AssetStore for NullAssets {
    async fn upload(&self, path: &str, _bytes: &[u8]) -> Result<String, AssetStoreError> {
        Ok(self.public_url(path))
    }
    async fn delete(&self, _path: &str) -> Result<(), AssetStoreError> {
        Ok(())
    }
    fn public_url(&self, path: &str) -> String {
        format!("http://assets.local/{path}")
    }
}

fn state() -> AppState {
    std::env::set_var("VOTELY_DATA_DIR", tempfile::tempdir().unwrap().path());
    AppState {
        repo: Arc::new(InMemRepo::new()),
        assets: Arc::new(NullAssets),
        rate_limiter: None,
    }
}

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    std::env::remove_var("ASSET_PUBLIC_BASE");
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(state()))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/businesses").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    let csp = headers
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap();
    // the placeholder image host must be allowed for img-src
    assert!(csp.contains("placehold.co"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
#[serial_test::serial]
async fn test_csp_includes_asset_origin() {
    std::env::set_var("ASSET_PUBLIC_BASE", "https://cdn.example.com/votely-assets");
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(state()))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/businesses").to_request();
    let resp = test::call_service(&app, req).await;
    let csp = resp
        .headers()
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(csp.contains("https://cdn.example.com"));
    std::env::remove_var("ASSET_PUBLIC_BASE");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_hsts_enabled_via_builder() {
    let sec = SecurityHeaders::from_env().with_hsts(true);
    let app = test::init_service(
        App::new()
            .wrap(sec)
            .app_data(actix_web::web::Data::new(state()))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/businesses").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(
        resp.headers().get("strict-transport-security").is_some(),
        "HSTS header missing"
    );
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts_without_builder_override() {
    std::env::set_var("ENABLE_HSTS", "1");
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(state()))
            .configure(config),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/v1/businesses").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(resp.headers().get("strict-transport-security").is_some());
    std::env::remove_var("ENABLE_HSTS");
}

// existing CSP header should not be overwritten by middleware
#[actix_web::test]
#[serial_test::serial]
async fn test_existing_csp_header_preserved() {
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::from_env())
            .app_data(actix_web::web::Data::new(state()))
            .route(
                "/custom",
                web::get().to(|| async {
                    HttpResponse::Ok()
                        .insert_header((
                            actix_web::http::header::CONTENT_SECURITY_POLICY,
                            "custom-src 'none'",
                        ))
                        .finish()
                }),
            ),
    )
    .await;
    let req = test::TestRequest::get().uri("/custom").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let csp = resp
        .headers()
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(csp, "custom-src 'none'");
}
