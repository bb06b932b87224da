use rayon::prelude::*;
use serde::Serialize;

use crate::codes::{DecodedRow, decode_row};
use crate::error::DecodeError;
use crate::layout::TokenLayout;

/// Decodes every row of a generated batch independently.
///
/// Rows run in parallel; the returned vector is in input order and holds one result per row.
/// A failing row is logged and reported in place, it never aborts the others.
pub fn decode_batch<R>(rows: &[R], layout: &TokenLayout) -> Vec<Result<DecodedRow, DecodeError>>
where
    R: AsRef<[u32]> + Sync,
{
    let results: Vec<_> = rows
        .par_iter()
        .map(|row| decode_row(row.as_ref(), layout))
        .collect();

    for (row, res) in results.iter().enumerate() {
        if let Err(e) = res {
            tracing::warn!(row, error = %e, "row failed to decode");
        }
    }

    let summary = BatchSummary::from_results(&results);
    tracing::debug!(
        rows = results.len(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        frames = summary.frames,
        "decoded batch"
    );
    results
}

/// Aggregate counts over a decoded batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub frames: usize,
    pub discarded_tokens: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[Result<DecodedRow, DecodeError>]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r {
                Ok(row) => {
                    acc.succeeded += 1;
                    acc.frames += row.codes.frames();
                    acc.discarded_tokens += row.diagnostics.discarded_tail;
                }
                Err(_) => acc.failed += 1,
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RangeViolation;

    const L: TokenLayout = TokenLayout::JENNY;

    fn valid_row() -> Vec<u32> {
        vec![
            L.start_of_human(),
            42,
            L.end_of_text(),
            L.end_of_human(),
            L.start_of_speech(),
            64420,
            68514,
            72618,
            76714,
            80898,
            85010,
            89196,
            L.end_of_speech(),
        ]
    }

    #[test]
    fn failing_row_does_not_abort_siblings() {
        let mut bad = valid_row();
        bad[6] = 1000;
        let rows = vec![valid_row(), bad];

        let out = decode_batch(&rows, &L);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().codes.layer1, vec![10]);
        assert!(matches!(
            out[1],
            Err(DecodeError::TokenOutOfRange {
                violation: RangeViolation::BelowAudioStart { .. },
                ..
            })
        ));
    }

    #[test]
    fn results_keep_input_order() {
        let rows: Vec<Vec<u32>> = (0..64u32)
            .map(|i| {
                let mut r = vec![L.start_of_speech()];
                r.extend([64410 + i, 68514, 72618, 76714, 80898, 85010, 89196]);
                r
            })
            .collect();

        let out = decode_batch(&rows, &L);
        for (i, r) in out.iter().enumerate() {
            assert_eq!(r.as_ref().unwrap().codes.layer1, vec![i as u32]);
        }
    }

    #[test]
    fn summary_counts_rows_and_frames() {
        let mut bad = valid_row();
        bad[7] = 0;
        let mut short = valid_row();
        short.truncate(9);
        let out = decode_batch(&[valid_row(), bad, short], &L);

        let s = BatchSummary::from_results(&out);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.frames, 1);
        assert_eq!(s.discarded_tokens, 4);
    }

    #[test]
    fn empty_batch_is_empty() {
        let rows: Vec<Vec<u32>> = Vec::new();
        assert!(decode_batch(&rows, &L).is_empty());
    }
}
