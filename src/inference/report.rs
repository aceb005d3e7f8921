//! Top-k ranking and the classification report.

use crate::errors::{InferenceError, InferenceResult};
use crate::inference::labels::Labels;
use std::io::Write;

/// Number of ranked results reported for a classification.
pub const DEFAULT_TOP_K: usize = 6;

/// One ranked class.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<'a> {
    /// 1-based rank.
    pub rank: usize,
    /// Output index of the class.
    pub index: usize,
    pub label: &'a str,
    pub probability: f32,
}

/// Output indices ordered by descending score.
///
/// The sort is stable, so among equal scores the lower index comes first.
pub fn rank_scores(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// The `k` best scoring classes with their labels.
///
/// Fails when fewer than `k` scores exist or when a ranked index has no label;
/// results are never truncated.
pub fn top_k<'a>(scores: &[f32], labels: &'a Labels, k: usize) -> InferenceResult<Vec<Prediction<'a>>> {
    if scores.len() < k {
        return Err(InferenceError::NotEnoughScores {
            requested: k,
            available: scores.len(),
        });
    }

    rank_scores(scores)
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(position, index)| {
            let label = labels
                .get(index)
                .ok_or(InferenceError::LabelIndexOutOfRange {
                    index,
                    labels: labels.len(),
                })?;
            Ok(Prediction {
                rank: position + 1,
                index,
                label,
                probability: scores[index],
            })
        })
        .collect()
}

/// Writes the report block for one image:
///
/// ```text
///
/// <image> is a
/// 1 <label> 0.90000
/// ```
pub fn write_report<W: Write>(
    writer: &mut W,
    image_path: &str,
    predictions: &[Prediction<'_>],
) -> InferenceResult<()> {
    writeln!(writer, "\n{} is a ", image_path)?;
    for prediction in predictions {
        writeln!(
            writer,
            "{} {} {:.5}",
            prediction.rank, prediction.label, prediction.probability
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_is_stable_on_ties() {
        assert_eq!(rank_scores(&[0.5, 1.0, 0.5, 1.0]), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_not_enough_scores() {
        let labels: Labels = (0..10).map(|i| i.to_string()).collect();
        assert!(matches!(
            top_k(&[0.1, 0.2], &labels, DEFAULT_TOP_K),
            Err(InferenceError::NotEnoughScores {
                requested: 6,
                available: 2
            })
        ));
    }

    #[test]
    fn test_report_format() {
        let predictions = [Prediction {
            rank: 1,
            index: 0,
            label: "cat",
            probability: 0.25,
        }];
        let mut output = Vec::new();
        write_report(&mut output, "cat.jpg", &predictions).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "\ncat.jpg is a \n1 cat 0.25000\n");
    }
}
