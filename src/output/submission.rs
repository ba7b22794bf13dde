// Submission CSV: `ImageId,Label` header, then one `id,digit` row per image.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::assignment::predict::Prediction;

/// Write predictions to `path`, replacing any existing file.
///
/// Callers should only get here with a complete prediction list, so a run
/// that fails earlier never leaves a partial file behind.
pub fn write_submission(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    write_submission_to(file, predictions)
        .with_context(|| format!("Failed to write predictions to {}", path.display()))?;

    info!(rows = predictions.len(), path = %path.display(), "Wrote predictions");
    Ok(())
}

/// Stream the submission rows into any writer.
pub fn write_submission_to<W: Write>(writer: W, predictions: &[Prediction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["ImageId", "Label"])?;
    for prediction in predictions {
        wtr.write_record([
            prediction.image_id.to_string(),
            prediction.label.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::Digit;

    #[test]
    fn test_submission_format() {
        let predictions = vec![
            Prediction {
                image_id: 1,
                label: Digit::new(2).unwrap(),
            },
            Prediction {
                image_id: 2,
                label: Digit::new(9).unwrap(),
            },
        ];
        let mut buf = Vec::new();
        write_submission_to(&mut buf, &predictions).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ImageId,Label\n1,2\n2,9\n");
    }

    #[test]
    fn test_empty_submission_is_header_only() {
        let mut buf = Vec::new();
        write_submission_to(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ImageId,Label\n");
    }
}
