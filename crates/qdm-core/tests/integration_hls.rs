//! End-to-end HLS tests: master analysis, variant download and merge,
//! pause between segments, and refusal paths.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use qdm_core::config::QdmConfig;
use qdm_core::engine::Engine;
use qdm_core::grabber::{Grabber, NoDiscovery, UrlKind};
use qdm_core::http::HttpClient;
use qdm_core::store::{Task, TaskStatus, TaskStore};
use qdm_core::worker::WorkerOutcome;

use common::http_server::{self, Route};

const M3U8_TYPE: &str = "application/vnd.apple.mpegurl";

fn test_config(download_dir: &std::path::Path) -> QdmConfig {
    QdmConfig {
        max_parallel: 1,
        download_dir: download_dir.to_path_buf(),
        ..QdmConfig::default()
    }
}

async fn open_store(dir: &std::path::Path) -> TaskStore {
    TaskStore::open_at(&dir.join("tasks.db")).await.unwrap()
}

fn segment_bodies() -> Vec<Vec<u8>> {
    vec![
        vec![0xAA; 4096],
        vec![0xBB; 2048],
        vec![0xCC; 1024],
    ]
}

/// Master playlist with 720p/1080p variants plus the 1080p media playlist
/// and its segments.
fn hls_routes() -> HashMap<String, Route> {
    let master = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720\n\
        /hls/720/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080\n\
        /hls/1080/index.m3u8\n";
    let media_720 = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXTINF:10.0,\nseg0.ts\n\
        #EXT-X-ENDLIST\n";
    let media_1080 = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXTINF:10.0,\nseg0.ts\n\
        #EXTINF:10.0,\nseg1.ts\n\
        #EXTINF:5.0,\nseg2.ts\n\
        #EXT-X-ENDLIST\n";

    let mut routes = HashMap::from([
        (
            "/hls/master.m3u8".to_string(),
            Route::new(master.as_bytes().to_vec()).content_type(M3U8_TYPE),
        ),
        (
            "/hls/720/index.m3u8".to_string(),
            Route::new(media_720.as_bytes().to_vec()).content_type(M3U8_TYPE),
        ),
        (
            "/hls/1080/index.m3u8".to_string(),
            Route::new(media_1080.as_bytes().to_vec()).content_type(M3U8_TYPE),
        ),
        (
            "/hls/720/seg0.ts".to_string(),
            Route::new(vec![0x11; 1024]).content_type("video/mp2t"),
        ),
    ]);
    for (i, body) in segment_bodies().into_iter().enumerate() {
        routes.insert(
            format!("/hls/1080/seg{}.ts", i),
            Route::new(body).content_type("video/mp2t"),
        );
    }
    routes
}

#[tokio::test]
async fn master_analysis_lists_both_variants() {
    let base = http_server::start(hls_routes());
    let cfg = QdmConfig::default();
    let grabber = Grabber::new(Arc::new(HttpClient::new(&cfg)), Arc::new(NoDiscovery));

    let result = grabber.grab(&format!("{}/hls/master.m3u8", base)).await;
    assert_eq!(result.kind, UrlKind::Stream);
    assert_eq!(result.items.len(), 2);

    let labels: Vec<&str> = result
        .items
        .iter()
        .filter_map(|i| i.title.as_deref())
        .collect();
    assert!(labels.iter().any(|l| l.contains("720p")));
    assert!(labels.iter().any(|l| l.contains("1080p")));

    // Estimated sizes: bandwidth * duration / 8.
    let item_1080 = result
        .items
        .iter()
        .find(|i| i.title.as_deref().unwrap_or("").contains("1080p"))
        .unwrap();
    assert_eq!(item_1080.size, Some(6_000_000 * 25 / 8));
    assert!(item_1080.url.ends_with("/hls/1080/index.m3u8"));
}

#[tokio::test]
async fn selected_variant_downloads_segments_in_order_and_merges() {
    let base = http_server::start(hls_routes());

    let state_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();
    let store = open_store(state_dir.path()).await;
    let task = store
        .add(&Task::create(&format!("{}/hls/1080/index.m3u8", base)))
        .await
        .unwrap();

    let engine = Engine::new(store.clone(), test_config(download_dir.path()));
    engine.run_until_drained().await.unwrap();

    let merged: Vec<u8> = segment_bodies().concat();
    let output = download_dir.path().join("index.mp4");
    assert_eq!(std::fs::read(&output).unwrap(), merged);

    let archived = store.get_from_archive(&task.id).await.unwrap().unwrap();
    assert_eq!(archived.task.status, TaskStatus::Completed);
    assert_eq!(archived.task.downloaded, merged.len() as u64);
}

#[tokio::test]
async fn pause_between_segments_stops_before_merge() {
    let mut routes = HashMap::new();
    let media = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXTINF:4.0,\nseg0.ts\n\
        #EXTINF:4.0,\nseg1.ts\n\
        #EXTINF:4.0,\nseg2.ts\n\
        #EXTINF:4.0,\nseg3.ts\n\
        #EXTINF:4.0,\nseg4.ts\n\
        #EXT-X-ENDLIST\n";
    routes.insert(
        "/slow/index.m3u8".to_string(),
        Route::new(media.as_bytes().to_vec()).content_type(M3U8_TYPE),
    );
    for i in 0..5 {
        routes.insert(
            format!("/slow/seg{}.ts", i),
            Route::new(vec![i as u8; 32 * 1024]).throttled(Duration::from_millis(15)),
        );
    }
    let base = http_server::start(routes);

    let state_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();
    let store = open_store(state_dir.path()).await;
    let task = store
        .add(&Task::create(&format!("{}/slow/index.m3u8", base)))
        .await
        .unwrap();

    let engine = Engine::new(store.clone(), test_config(download_dir.path()));
    let runner = {
        let engine = engine.clone();
        let id = task.id.clone();
        tokio::spawn(async move { engine.execute_task(&id).await })
    };

    // First segment progress shows up, then pause lands between segments.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let t = store.require(&task.id).await.unwrap();
        if t.downloaded > 0 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no segment progress");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    engine.pause_task(&task.id).await.unwrap();

    let outcome = runner.await.unwrap().unwrap();
    assert!(matches!(outcome, WorkerOutcome::Paused), "got {:?}", outcome);
    assert_eq!(
        store.require(&task.id).await.unwrap().status,
        TaskStatus::Paused
    );
    assert!(
        !download_dir.path().join("index.mp4").exists(),
        "nothing merged on pause"
    );
}

#[tokio::test]
async fn live_playlist_is_refused() {
    let media = "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4.0,\nseg0.ts\n";
    let base = http_server::start(HashMap::from([
        (
            "/live/index.m3u8".to_string(),
            Route::new(media.as_bytes().to_vec()).content_type(M3U8_TYPE),
        ),
        ("/live/seg0.ts".to_string(), Route::new(vec![0; 128])),
    ]));

    let state_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();
    let store = open_store(state_dir.path()).await;
    let task = store
        .add(&Task::create(&format!("{}/live/index.m3u8", base)))
        .await
        .unwrap();

    let engine = Engine::new(store.clone(), test_config(download_dir.path()));
    let outcome = engine.execute_task(&task.id).await.unwrap();
    assert!(matches!(outcome, WorkerOutcome::Failed(_)));

    let archived = store.get_from_archive(&task.id).await.unwrap().unwrap();
    assert_eq!(archived.task.status, TaskStatus::Failed);
}

#[tokio::test]
async fn invalid_manifest_fails_the_task() {
    let base = http_server::start(HashMap::from([(
        "/bad/index.m3u8".to_string(),
        Route::new(b"<html>not a playlist</html>".to_vec()).content_type("text/html"),
    )]));

    let state_dir = tempfile::tempdir().unwrap();
    let download_dir = tempfile::tempdir().unwrap();
    let store = open_store(state_dir.path()).await;
    let task = store
        .add(&Task::create(&format!("{}/bad/index.m3u8", base)))
        .await
        .unwrap();

    let engine = Engine::new(store.clone(), test_config(download_dir.path()));
    let outcome = engine.execute_task(&task.id).await.unwrap();
    assert!(matches!(outcome, WorkerOutcome::Failed(_)));
    assert_eq!(
        store
            .get_from_archive(&task.id)
            .await
            .unwrap()
            .unwrap()
            .task
            .status,
        TaskStatus::Failed
    );
}

#[tokio::test]
async fn stream_and_page_failures_yield_empty_results_without_fallback() {
    let html = b"<html><body>hello</body></html>".to_vec();
    let file = vec![7u8; 2222];
    let base = http_server::start(HashMap::from([
        (
            "/page.html".to_string(),
            Route::new(html).content_type("text/html; charset=utf-8"),
        ),
        ("/data.bin".to_string(), Route::new(file.clone())),
    ]));
    let cfg = QdmConfig::default();
    let grabber = Grabber::new(Arc::new(HttpClient::new(&cfg)), Arc::new(NoDiscovery));

    // Unfetchable stream hint: empty result, still classified as a stream.
    let result = grabber.grab(&format!("{}/gone/master.m3u8", base)).await;
    assert_eq!(result.kind, UrlKind::Stream);
    assert!(result.items.is_empty());

    // Page with no discovery wired in: empty, no direct-file fallback.
    let result = grabber.grab(&format!("{}/page.html", base)).await;
    assert_eq!(result.kind, UrlKind::Page);
    assert!(result.items.is_empty());

    // Direct file: one candidate with probed size and derived filename.
    let result = grabber.grab(&format!("{}/data.bin", base)).await;
    assert_eq!(result.kind, UrlKind::Direct);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].size, Some(file.len() as u64));
    assert_eq!(result.items[0].filename.as_deref(), Some("data.bin"));
}
