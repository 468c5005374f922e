use std::sync::Arc;
use std::time::Duration;

use oai_harvest::formats::{Cursor, HitCounts};
use oai_harvest::token::{TokenError, TokenStore};
use oai_harvest::{MetadataPrefix, OaiRequest, Verb};
use oai_server::sweeper::spawn_sweeper;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_sweeper_removes_expired_tokens_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    // Zero lifetime: every token is expired as soon as it is written.
    let tokens = Arc::new(TokenStore::open(dir.path(), Duration::ZERO).unwrap());
    let request = OaiRequest::new(Verb::ListRecords).with_metadata_prefix(MetadataPrefix::OaiDc);
    let token = tokens.create(HitCounts::default(), Cursor::default(), &request);

    let cancel = CancellationToken::new();
    let handle = spawn_sweeper(Arc::clone(&tokens), Duration::from_secs(3600), cancel.clone());

    let path = dir.path().join(format!("{}.json", token.name));
    for _ in 0..100 {
        if !path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!path.exists());
    assert!(matches!(
        tokens.load(&token.name),
        Err(TokenError::NotFound(_))
    ));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
