//! Size guarding for uploads whose length is not known up front.
//!
//! A `Content-Length` header can lie, so the only reliable ceiling is the
//! number of bytes actually received. [`stream_with_size_limit`] copies a
//! chunked source into a sink and stops at the first chunk that pushes the
//! running total past the limit.

use super::DatasetError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Copy every chunk of `source` into `destination`, failing with
/// [`DatasetError::PayloadTooLarge`] as soon as more than `limit` bytes have
/// been written.
///
/// The chunk that crosses the limit is written before the check, nothing after
/// it is read. On failure the destination holds a partial copy and the caller
/// is expected to discard it.
///
/// Returns the exact number of bytes written.
pub async fn stream_with_size_limit<S, E, W>(
    source: S,
    destination: &mut W,
    limit: u64,
) -> Result<u64, DatasetError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<anyhow::Error>,
    W: AsyncWrite + Unpin,
{
    let mut source = std::pin::pin!(source);
    let mut written: u64 = 0;

    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(|e| DatasetError::UnprocessableContent(e.into()))?;

        destination
            .write_all(&chunk)
            .await
            .map_err(|e| DatasetError::Internal(e.into()))?;
        written += chunk.len() as u64;

        if written > limit {
            return Err(DatasetError::PayloadTooLarge { limit });
        }
    }

    destination
        .flush()
        .await
        .map_err(|e| DatasetError::Internal(e.into()))?;

    Ok(written)
}

/// Format a byte count with decimal (SI) units, e.g. `50.0MB`.
///
/// Plain bytes are printed without a fraction (`999B`).
pub fn human_readable_decimal(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1000.0 {
            return if unit == "B" {
                format!("{:.0}{}", value, unit)
            } else {
                format!("{:.1}{}", value, unit)
            };
        }
        value /= 1000.0;
    }
    format!("{:.1}EB", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use proptest::prelude::*;
    use std::convert::Infallible;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|&p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_empty_source_writes_nothing() {
        let mut out = Vec::new();
        let written = stream_with_size_limit(chunks(&[]), &mut out, 10)
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_under_limit_copies_everything() {
        let mut out = Vec::new();
        let written = stream_with_size_limit(chunks(&[b"abc", b"def", b"g"]), &mut out, 10)
            .await
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(out, b"abcdefg");
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let mut out = Vec::new();
        let written = stream_with_size_limit(chunks(&[b"12345", b"67890"]), &mut out, 10)
            .await
            .unwrap();
        assert_eq!(written, 10);
    }

    #[tokio::test]
    async fn test_over_limit_stops_at_overflowing_chunk() {
        let mut out = Vec::new();
        let err = stream_with_size_limit(
            chunks(&[b"1234", b"5678", b"9abc", b"never"]),
            &mut out,
            6,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DatasetError::PayloadTooLarge { limit: 6 }));
        // The second chunk crosses the limit; the rest is never read.
        assert_eq!(out, b"12345678");
    }

    #[tokio::test]
    async fn test_single_oversized_chunk() {
        let mut out = Vec::new();
        let err = stream_with_size_limit(chunks(&[b"too many bytes"]), &mut out, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::PayloadTooLarge { .. }));
        assert!(err.to_string().contains("3B"));
    }

    #[tokio::test]
    async fn test_source_error_is_unprocessable() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"ok")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client went away")),
        ]);
        let mut out = Vec::new();
        let err = stream_with_size_limit(source, &mut out, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::UnprocessableContent(_)));
    }

    fn copy_blocking(parts: &[Vec<u8>], limit: u64) -> (Result<u64, DatasetError>, Vec<u8>) {
        let source = stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, Infallible>(Bytes::copy_from_slice(p)))
                .collect::<Vec<_>>(),
        );
        let mut out = Vec::new();
        let result = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(stream_with_size_limit(source, &mut out, limit));
        (result, out)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Within the limit every byte is copied; past it the output ends at the
        /// chunk that crossed the limit.
        #[test]
        fn size_limit_holds_for_any_chunking(
            parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
            limit in 0u64..512,
        ) {
            let total: u64 = parts.iter().map(|p| p.len() as u64).sum();
            let (result, out) = copy_blocking(&parts, limit);

            if total <= limit {
                prop_assert_eq!(result.ok(), Some(total));
                prop_assert_eq!(out, parts.concat());
            } else {
                let is_too_large = matches!(result, Err(DatasetError::PayloadTooLarge { limit: l }) if l == limit);
                prop_assert!(is_too_large);

                let mut running = 0u64;
                let crossing = parts
                    .iter()
                    .position(|p| {
                        running += p.len() as u64;
                        running > limit
                    })
                    .unwrap();
                prop_assert!(out.len() as u64 > limit);
                prop_assert_eq!(out, parts[..=crossing].concat());
            }
        }
    }

    #[test]
    fn test_human_readable_decimal() {
        assert_eq!(human_readable_decimal(0), "0B");
        assert_eq!(human_readable_decimal(999), "999B");
        assert_eq!(human_readable_decimal(1_000), "1.0KB");
        assert_eq!(human_readable_decimal(1_500), "1.5KB");
        assert_eq!(human_readable_decimal(50_000_000), "50.0MB");
        assert_eq!(human_readable_decimal(2_000_000_000), "2.0GB");
    }
}
