//! Where human-readable results go.

pub mod mosaic;

use crate::core::metrics::{ClassificationReport, ConfusionMatrix};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Open the destination for result lines: the file at `path` if given,
/// stdout otherwise. Diagnostics never go here, they are logged to stderr.
pub fn open(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)?;
            tracing::info!(path = %path.display(), "Writing results to file");
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Write the classification report followed by the full confusion matrix.
pub fn write_classification(
    out: &mut impl Write,
    report: &ClassificationReport,
    matrix: &ConfusionMatrix,
) -> io::Result<()> {
    writeln!(out, "Classification Report:")?;
    writeln!(out, "{}", report)?;
    writeln!(out, "Confusion Matrix:")?;
    write!(out, "{}", matrix)?;
    out.flush()
}
