use axum::body::{Body, Bytes};
use futures::stream;
use http_body_util::BodyExt;
use proptest::prelude::*;
use response_logger::{
    body_wrapper::{capture_request_body, tap_body, TapSummary},
    parse_size,
};
use std::sync::{Arc, Mutex};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn chunked(chunks: &[Vec<u8>]) -> Body {
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        chunks.iter().map(|c| Ok(Bytes::from(c.clone()))).collect();
    Body::from_stream(stream::iter(chunks))
}

proptest! {
    #[test]
    fn tap_forwards_everything_and_captures_prefix(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
        cap in 0usize..512,
    ) {
        let expected: Vec<u8> = chunks.concat();
        let seen: Arc<Mutex<Option<TapSummary>>> = Arc::new(Mutex::new(None));
        let slot = seen.clone();

        let forwarded = runtime().block_on(async move {
            let body = tap_body(chunked(&chunks), Some(cap), move |summary| {
                *slot.lock().unwrap() = Some(summary);
            });
            body.collect().await.unwrap().to_bytes()
        });

        let summary = seen.lock().unwrap().take().unwrap();
        let captured = summary.captured.unwrap();
        prop_assert_eq!(forwarded.as_ref(), expected.as_slice());
        prop_assert_eq!(summary.bytes_written, expected.len() as u64);
        prop_assert!(captured.len() <= cap);
        prop_assert_eq!(captured.as_ref(), &expected[..expected.len().min(cap)]);
    }

    #[test]
    fn request_capture_never_truncates_forwarding(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
        cap in 0usize..512,
    ) {
        let expected: Vec<u8> = chunks.concat();

        let (forwarded, captured) = runtime().block_on(async move {
            let (body, captured) = capture_request_body(chunked(&chunks), cap).await;
            (body.collect().await.unwrap().to_bytes(), captured)
        });

        prop_assert_eq!(forwarded.as_ref(), expected.as_slice());
        prop_assert_eq!(captured.as_ref(), &expected[..expected.len().min(cap)]);
    }

    #[test]
    fn parse_size_scales_by_unit(
        number in 0u64..100_000,
        unit_index in 0usize..5,
        lowercase in any::<bool>(),
    ) {
        let unit = ["B", "KB", "MB", "GB", "TB"][unit_index];
        let unit = if lowercase { unit.to_lowercase() } else { unit.to_string() };

        let parsed = parse_size(&format!("{number}{unit}")).unwrap();
        prop_assert_eq!(parsed, number * 1024u64.pow(unit_index as u32));
    }
}
