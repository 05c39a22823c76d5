//! Page-by-page behaviour of both streams against scripted upstream responses.

use std::sync::Arc;

use chrono::NaiveDate;
use decentraland_poaps_source::testing::{
    metadata_item, metadata_items, metadata_page, xdai_events, xdai_page, ScriptedTransport,
};
use decentraland_poaps_source::{
    PoapsMetadataCheckpoint, PoapsMetadataStream, PoapsXdaiCheckpoint, PoapsXdaiStream,
};
use serde_json::json;
use sync_core::{IncrementalStream, SyncError};

// ============================================================================
// poaps_xdai
// ============================================================================

#[tokio::test]
async fn test_xdai_full_page_requests_next_at_max_created() {
    let first = xdai_events(1..=1000);
    let second = xdai_events([1000, 1001, 1005]);
    let transport = Arc::new(ScriptedTransport::with_responses([
        xdai_page(&first),
        xdai_page(&second),
    ]));

    let mut stream = PoapsXdaiStream::new(transport.clone(), "http://subgraph", None);

    let page = stream.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 1000);
    assert_eq!(stream.cursor(), 1000);

    let page = stream.next_page().await.unwrap().unwrap();
    assert_eq!(page, second);

    assert!(stream.next_page().await.unwrap().is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].variables(), Some(&json!({"updatedAt": 0})));
    assert_eq!(requests[1].variables(), Some(&json!({"updatedAt": 1000})));
}

#[tokio::test]
async fn test_xdai_short_page_ends_pagination() {
    let transport = Arc::new(ScriptedTransport::with_responses([xdai_page(
        &xdai_events([7, 8, 9]),
    )]));
    let mut stream = PoapsXdaiStream::new(
        transport.clone(),
        "http://subgraph",
        Some(PoapsXdaiCheckpoint { created: 7 }),
    );

    assert_eq!(stream.next_page().await.unwrap().unwrap().len(), 3);
    assert!(stream.next_page().await.unwrap().is_none());
    assert!(stream.next_page().await.unwrap().is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].variables(), Some(&json!({"updatedAt": 7})));
}

#[tokio::test]
async fn test_xdai_empty_page_ends_pagination() {
    let transport = Arc::new(ScriptedTransport::with_responses([xdai_page(&[])]));
    let mut stream = PoapsXdaiStream::new(transport.clone(), "http://subgraph", None);

    assert!(stream.next_page().await.unwrap().is_none());
    assert!(stream.is_exhausted());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_xdai_full_page_on_one_created_is_stalled() {
    let stuck = xdai_events(std::iter::repeat(42).take(1000));
    let transport = Arc::new(ScriptedTransport::with_responses([xdai_page(&stuck)]));
    let mut stream = PoapsXdaiStream::new(
        transport.clone(),
        "http://subgraph",
        Some(PoapsXdaiCheckpoint { created: 42 }),
    );

    assert_eq!(stream.next_page().await.unwrap().unwrap().len(), 1000);
    let err = stream.next_page().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Pagination of poaps_xdai stalled at created=42: a full page of 1000 records did not advance it"
    );
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::StalledPagination { .. })
    ));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_xdai_transport_failure_propagates() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_failure("connection reset");
    let mut stream = PoapsXdaiStream::new(transport, "http://subgraph", None);

    let err = stream.next_page().await.unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("poaps_xdai request at created >= 0 failed"));
    assert!(chain.contains("connection reset"));
}

#[tokio::test]
async fn test_xdai_malformed_body_is_unexpected_response() {
    let transport = Arc::new(ScriptedTransport::with_responses([json!({"data": {}})]));
    let mut stream = PoapsXdaiStream::new(transport, "http://subgraph", None);

    let err = stream.next_page().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::UnexpectedResponse { .. })
    ));
}

// ============================================================================
// poaps_metadata
// ============================================================================

#[tokio::test]
async fn test_metadata_pages_follow_last_start_date() {
    let mut first = metadata_items(1, 499, "03-Feb-2021");
    first.push(metadata_item(500, "10-Feb-2021"));
    let transport = Arc::new(ScriptedTransport::with_responses([
        metadata_page(first),
        metadata_page(metadata_items(501, 2, "11-Feb-2021")),
    ]));

    let mut stream = PoapsMetadataStream::new(transport.clone(), "https://api.poap.example", None);

    let page = stream.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 500);
    assert_eq!(stream.page_token(), Some("10-Feb-2021"));
    assert_eq!(
        page.last().map(|r| r.start_date),
        NaiveDate::from_ymd_opt(2021, 2, 10)
    );

    let page = stream.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 2);
    assert!(stream.next_page().await.unwrap().is_none());

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].query_param("from_date"),
        Some("2000-01-01T00:00:00z")
    );
    assert_eq!(
        requests[1].query_param("from_date"),
        Some("2021-02-10T00:00:00z")
    );
    assert!(matches!(
        &requests[1],
        decentraland_poaps_source::testing::RecordedRequest::Get { url, .. }
            if url == "https://api.poap.example/paginated-events"
    ));
}

#[tokio::test]
async fn test_metadata_resumes_from_checkpoint() {
    let transport = Arc::new(ScriptedTransport::with_responses([metadata_page(
        metadata_items(1, 1, "05-Jan-2021"),
    )]));
    let mut stream = PoapsMetadataStream::new(
        transport.clone(),
        "https://api.poap.example",
        Some(PoapsMetadataCheckpoint {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 5).unwrap(),
        }),
    );

    assert_eq!(stream.next_page().await.unwrap().unwrap().len(), 1);
    assert_eq!(
        transport.requests()[0].query_param("from_date"),
        Some("2021-01-05T00:00:00z")
    );
}

#[tokio::test]
async fn test_metadata_empty_page_ends_pagination() {
    let transport = Arc::new(ScriptedTransport::with_responses([metadata_page(vec![])]));
    let mut stream = PoapsMetadataStream::new(transport.clone(), "https://api.poap.example", None);

    assert!(stream.next_page().await.unwrap().is_none());
    assert!(stream.next_page().await.unwrap().is_none());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_metadata_non_advancing_full_page_is_stalled() {
    let transport = Arc::new(ScriptedTransport::with_responses([metadata_page(
        metadata_items(1, 500, "05-Jan-2021"),
    )]));
    let start = PoapsMetadataCheckpoint {
        start_date: NaiveDate::from_ymd_opt(2021, 1, 5).unwrap(),
    };
    let mut stream =
        PoapsMetadataStream::new(transport.clone(), "https://api.poap.example", Some(start));

    // The stalled page is still handed out, the following call fails.
    assert_eq!(stream.next_page().await.unwrap().unwrap().len(), 500);
    let err = stream.next_page().await.unwrap_err();
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::StalledPagination {
            stream, position, ..
        }) => {
            assert_eq!(stream, "poaps_metadata");
            assert_eq!(position, "page token 05-Jan-2021");
        }
        other => panic!("expected StalledPagination, got {other:?}"),
    }
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_metadata_malformed_token_fails_before_request() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut stream = PoapsMetadataStream::with_page_token(
        transport.clone(),
        "https://api.poap.example",
        Some("January 5th".to_string()),
        None,
    );

    let err = stream.next_page().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::InvalidPageToken { .. })
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_metadata_malformed_record_date_fails_page() {
    let transport = Arc::new(ScriptedTransport::with_responses([metadata_page([
        metadata_item(1, "03-Feb-2021"),
        metadata_item(2, "2021-02-04"),
    ])]));
    let mut stream = PoapsMetadataStream::new(transport, "https://api.poap.example", None);

    let err = stream.next_page().await.unwrap_err();
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::InvalidRecordDate { value, .. }) => assert_eq!(value, "2021-02-04"),
        other => panic!("expected InvalidRecordDate, got {other:?}"),
    }
}
