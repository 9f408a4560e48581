//! Races between downloads, deletes and the sweeper on the same share.

mod common;

use common::{TestEngine, seeded_bytes, share_request};
use sharebox_server::ShareError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_download_share_has_exactly_one_winner() {
    let engine = Arc::new(TestEngine::new().await);
    // Both callers pass the liveness check before either claims.
    engine
        .storage
        .set_read_delay(Some(Duration::from_millis(50)));

    for round in 0..5u64 {
        let payload = seeded_bytes(round, 1024);
        let id = engine.upload("FREE", payload.clone()).await;

        let a = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.state.shares.consume(id).await })
        };
        let b = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.state.shares.consume(id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {round}: expected one winner");
        assert_eq!(winners[0].bytes, payload);

        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(loser.is_gone(), "round {round}: unexpected loser error {loser:?}");

        assert!(!engine.share_exists(id).await);
        assert!(!engine.blob_exists(id).await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_quota_is_never_exceeded_under_contention() {
    let engine = Arc::new(TestEngine::new().await);
    engine
        .storage
        .set_read_delay(Some(Duration::from_millis(10)));

    let mut request = share_request("PRO");
    request.max_downloads = Some(3);
    let id = engine
        .state
        .service
        .upload(seeded_bytes(42, 512), request)
        .await
        .unwrap()
        .share_id;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.state.shares.consume(id).await
        }));
    }

    let mut served = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => served += 1,
            Err(e) => assert!(e.is_gone(), "unexpected error {e:?}"),
        }
    }

    assert_eq!(served, 3);
    assert!(!engine.share_exists(id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_download_racing_delete_never_returns_bytes_after_removal() {
    let engine = Arc::new(TestEngine::new().await);
    engine
        .storage
        .set_read_delay(Some(Duration::from_millis(50)));

    let id = engine.upload("PRO", seeded_bytes(7, 256)).await;

    let download = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.state.shares.consume(id).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.state.shares.delete(id).await.unwrap();

    // The claim runs after the delete, so the download must lose.
    match download.await.unwrap() {
        Ok(_) => panic!("download succeeded for a deleted share"),
        Err(e) => assert!(matches!(e, ShareError::NotFound(_))),
    }
    assert!(!engine.share_exists(id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes_all_succeed() {
    let engine = Arc::new(TestEngine::new().await);
    let id = engine.upload("PRO", seeded_bytes(8, 256)).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.state.shares.delete(id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(!engine.share_exists(id).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweep_racing_downloads_on_exhausted_share() {
    let engine = Arc::new(TestEngine::new().await);
    let id = engine.insert_exhausted(seeded_bytes(9, 64)).await;

    let sweep = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.state.shares.sweep_expired().await })
    };
    let download = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.state.shares.consume(id).await })
    };

    let swept = sweep.await.unwrap().unwrap();
    let err = download.await.unwrap().unwrap_err();

    assert!(err.is_gone());
    assert!(swept <= 1);
    assert!(!engine.share_exists(id).await);
    assert!(!engine.blob_exists(id).await);
}
