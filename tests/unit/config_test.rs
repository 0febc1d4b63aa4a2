//! Configuration parsing.

use liftlog::storage::config::parse_config;
use liftlog::storage::SyncSettings;

#[test]
fn test_sparse_sync_section_uses_defaults() {
    let config = parse_config(
        r#"
        version = "0.2.0"

        [sync]
        supabase_url = "https://example.supabase.co"
        "#,
    )
    .unwrap();

    let defaults = SyncSettings::default();
    assert_eq!(config.sync.supabase_url.as_deref(), Some("https://example.supabase.co"));
    assert!(!config.sync.is_configured());
    assert_eq!(config.sync.retry_max_ms, defaults.retry_max_ms);
    assert_eq!(config.sync.push_batch_size, defaults.push_batch_size);
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    assert!(parse_config("[sync\nretry_max_ms = ").is_err());
}

#[test]
fn test_backoff_sequence_reaches_cap() {
    let settings = SyncSettings {
        retry_initial_ms: 1_000,
        retry_max_ms: 8_000,
        ..SyncSettings::default()
    };

    let mut delays = Vec::new();
    let mut current = 0;
    for _ in 0..6 {
        current = settings.next_backoff(current);
        delays.push(current);
    }

    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 8_000, 8_000]);
}
