use crate::config::{Config, ServerConfig};
use crate::downloader::Downloader;
use crate::downloader::test_helpers::create_test_downloader;
use crate::error::Error;

#[test]
fn test_new_rejects_invalid_config() {
    let result = Downloader::new(Config::new(ServerConfig::new("")));
    match result {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("server.host")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_new_defaults_to_yenc_decoder() {
    let downloader = Downloader::new(Config::new(ServerConfig::new("news.example.com"))).unwrap();
    let debug = format!("{downloader:?}");
    assert!(debug.contains("\"yenc\""), "debug output was {debug}");
    assert!(debug.contains("cancelled: false"));
}

#[test]
fn test_with_decoder_replaces_decoder() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    assert!(format!("{downloader:?}").contains("\"recording\""));
}

#[test]
fn test_cancel_is_shared_with_token() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    let token = downloader.cancel_token();
    assert!(!downloader.is_cancelled());

    token.cancel();

    assert!(downloader.is_cancelled());
}

#[test]
fn test_stats_start_empty() {
    let (downloader, _decoder, _temp_dir) = create_test_downloader();
    assert_eq!(downloader.stats().total_bytes(), 0);
}
