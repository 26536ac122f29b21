use std::time::{Duration, Instant};
use vigil_browser::{ChromiumEngine, ContextFactory, ContextPool, Persona};
use vigil_core::BrowserConfig;

const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) VigilTest/1.0";

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_engine_launch() {
    let engine = ChromiumEngine::launch(&BrowserConfig::default()).await;
    assert!(engine.is_ok(), "Failed to launch browser");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_page_queries() {
    let engine = ChromiumEngine::launch(&BrowserConfig::default())
        .await
        .expect("launch browser");
    let ctx = engine.create_context(None).await.expect("create context");
    let params = Persona::default().session_params(UA);
    let mut page = ctx.open_page(&params).await.expect("open page");

    page.navigate(
        "data:text/html,<meta name='robots' content='noindex'>\
         <div class='cookie-banner'>We use cookies</div>\
         <script src='/app.js'></script>",
        Duration::from_secs(10),
    )
    .await
    .expect("navigate");
    page.wait_for_network_idle(
        Duration::from_millis(300),
        Instant::now() + Duration::from_secs(3),
    )
    .await;

    assert_eq!(
        page.robots_meta().await.expect("robots meta").as_deref(),
        Some("noindex")
    );
    assert!(page
        .matches_selector(".cookie-banner")
        .await
        .expect("selector query"));
    assert!(!page
        .matches_selector("#gdpr-banner")
        .await
        .expect("selector query"));
    assert_eq!(
        page.script_sources().await.expect("script sources"),
        vec!["/app.js"]
    );
    assert!(!page.screenshot().await.expect("screenshot").is_empty());

    page.close().await.expect("close page");
    ctx.close().await.expect("close context");
    engine.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_pool_over_chromium() {
    let engine = ChromiumEngine::launch(&BrowserConfig::default())
        .await
        .expect("launch browser");
    let pool = ContextPool::init(&engine, 2).await.expect("init pool");

    let ctx = pool.acquire().await.expect("acquire");
    assert_eq!(pool.available(), 1);
    pool.release(ctx);

    pool.shutdown().await.expect("shutdown pool");
    engine.shutdown().await;
}
