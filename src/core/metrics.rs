//! Per-category scores of a classifier on a held-out set.

use std::fmt;

/// Width of the label column, fits "weighted avg".
const LABEL_WIDTH: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Got {truth} true labels but {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
    #[error("Category {category} is outside of the {num_categories} known categories")]
    OutOfRange {
        category: usize,
        num_categories: usize,
    },
}

/// Counts of (true category, predicted category) pairs. Rows are true categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_categories: usize, truth: &[usize], predicted: &[usize]) -> Result<Self, Error> {
        if truth.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                truth: truth.len(),
                predicted: predicted.len(),
            });
        }

        let mut counts = vec![vec![0; num_categories]; num_categories];
        for (&t, &p) in truth.iter().zip(predicted) {
            for category in [t, p] {
                if category >= num_categories {
                    return Err(Error::OutOfRange {
                        category,
                        num_categories,
                    });
                }
            }
            counts[t][p] += 1;
        }

        Ok(Self { counts })
    }

    pub fn num_categories(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_categories()).map(|c| self.counts[c][c]).sum()
    }

    /// Number of samples whose true category is `category`.
    pub fn support(&self, category: usize) -> usize {
        self.counts[category].iter().sum()
    }

    /// Number of samples predicted as `category`.
    pub fn predicted(&self, category: usize) -> usize {
        self.counts.iter().map(|row| row[category]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .max()
            .map_or(1, |max| max.to_string().len());

        for (index, row) in self.counts.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:>width$}")).collect();
            let open = if index == 0 { "[[" } else { " [" };
            let close = if index + 1 == self.counts.len() { "]]" } else { "]" };
            writeln!(f, "{}{}{}", open, cells.join(" "), close)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision, recall and F1 per category plus overall aggregates.
///
/// A score with a zero denominator is reported as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub categories: Vec<CategoryScores>,
    pub accuracy: f64,
    pub macro_avg: CategoryScores,
    pub weighted_avg: CategoryScores,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    pub fn new(matrix: &ConfusionMatrix) -> Self {
        let categories: Vec<CategoryScores> = (0..matrix.num_categories())
            .map(|c| {
                let hits = matrix.count(c, c);
                let precision = ratio(hits, matrix.predicted(c));
                let recall = ratio(hits, matrix.support(c));
                CategoryScores {
                    precision,
                    recall,
                    f1: harmonic_mean(precision, recall),
                    support: matrix.support(c),
                }
            })
            .collect();

        let total = matrix.total();
        let n = categories.len().max(1) as f64;
        let weight = |s: &CategoryScores| ratio(s.support, total);

        let macro_avg = CategoryScores {
            precision: categories.iter().map(|s| s.precision).sum::<f64>() / n,
            recall: categories.iter().map(|s| s.recall).sum::<f64>() / n,
            f1: categories.iter().map(|s| s.f1).sum::<f64>() / n,
            support: total,
        };

        let weighted_avg = CategoryScores {
            precision: categories.iter().map(|s| s.precision * weight(s)).sum(),
            recall: categories.iter().map(|s| s.recall * weight(s)).sum(),
            f1: categories.iter().map(|s| s.f1 * weight(s)).sum(),
            support: total,
        };

        Self {
            categories,
            accuracy: ratio(matrix.correct(), total),
            macro_avg,
            weighted_avg,
        }
    }
}

fn write_scores(f: &mut fmt::Formatter<'_>, label: &str, s: &CategoryScores) -> fmt::Result {
    writeln!(
        f,
        "{:>LABEL_WIDTH$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
        label, s.precision, s.recall, s.f1, s.support
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>LABEL_WIDTH$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;

        for (category, scores) in self.categories.iter().enumerate() {
            write_scores(f, &category.to_string(), scores)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "{:>LABEL_WIDTH$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_scores(f, "macro avg", &self.macro_avg)?;
        write_scores(f, "weighted avg", &self.weighted_avg)
    }
}
