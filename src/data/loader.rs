// CSV loading for the training and test image files.
//
// Both files carry a header row that is skipped. Training rows are
// `label,pixel0,...,pixel783`; test rows are just the 784 pixels. Any
// malformed row aborts the load with its 1-based data-row number.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use super::models::{Digit, Image, TrainingSet, PIXEL_COUNT};

/// Load a labeled training file.
pub fn load_training(path: &Path) -> Result<TrainingSet> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open training data at {}", path.display()))?;
    let set = read_training(file)
        .with_context(|| format!("Failed to parse training data at {}", path.display()))?;

    info!(rows = set.len(), path = %path.display(), "Loaded training data");
    Ok(set)
}

/// Load an unlabeled image file.
pub fn load_images(path: &Path) -> Result<Vec<Image>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open image data at {}", path.display()))?;
    let images = read_images(file)
        .with_context(|| format!("Failed to parse image data at {}", path.display()))?;

    info!(rows = images.len(), path = %path.display(), "Loaded test images");
    Ok(images)
}

/// Parse labeled rows from any reader. The first column is the label.
pub fn read_training<R: Read>(reader: R) -> Result<TrainingSet> {
    let mut labels = Vec::new();
    let mut images = Vec::new();

    for_each_row(reader, PIXEL_COUNT + 1, |record| {
        let label = parse_int(&record[0], "label")?;
        let label = u8::try_from(label)
            .ok()
            .and_then(|v| Digit::new(v).ok())
            .ok_or_else(|| anyhow::anyhow!("label {label} is not a digit (expected 0-9)"))?;
        labels.push(label);
        images.push(parse_image(record.iter().skip(1))?);
        Ok(())
    })?;

    if labels.is_empty() {
        anyhow::bail!("training data has a header but no rows");
    }

    TrainingSet::new(labels, images)
}

/// Parse unlabeled rows from any reader. Every column is a pixel.
pub fn read_images<R: Read>(reader: R) -> Result<Vec<Image>> {
    let mut images = Vec::new();
    for_each_row(reader, PIXEL_COUNT, |record| {
        images.push(parse_image(record.iter())?);
        Ok(())
    })?;
    Ok(images)
}

/// Walk the data rows (header skipped), enforcing the column count.
fn for_each_row<R, F>(reader: R, columns: usize, mut on_row: F) -> Result<()>
where
    R: Read,
    F: FnMut(&StringRecord) -> Result<()>,
{
    // Flexible so a ragged row reaches our own check with a row number
    // instead of surfacing as a bare csv UnequalLengths error.
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let record = result.with_context(|| format!("row {row}: unreadable CSV record"))?;
        if record.len() != columns {
            anyhow::bail!(
                "row {row}: expected {columns} columns, found {}",
                record.len()
            );
        }
        on_row(&record).with_context(|| format!("row {row}"))?;
    }

    Ok(())
}

fn parse_image<'a>(fields: impl Iterator<Item = &'a str>) -> Result<Image> {
    let pixels = fields
        .enumerate()
        .map(|(col, field)| {
            let value = parse_int(field, "pixel")?;
            u8::try_from(value).map_err(|_| {
                anyhow::anyhow!("pixel {col} has intensity {value} (expected 0-255)")
            })
        })
        .collect::<Result<Vec<u8>>>()?;
    Image::from_pixels(pixels)
}

fn parse_int(field: &str, what: &str) -> Result<i64> {
    field
        .parse::<i64>()
        .with_context(|| format!("{what} value {field:?} is not an integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(columns: usize) -> String {
        (0..columns)
            .map(|i| format!("c{i}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn pixel_row(value: u8) -> String {
        vec![value.to_string(); PIXEL_COUNT].join(",")
    }

    #[test]
    fn test_read_training_basic() {
        let csv = format!(
            "{}\n3,{}\n7,{}\n",
            header(PIXEL_COUNT + 1),
            pixel_row(0),
            pixel_row(255)
        );
        let set = read_training(csv.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.labels()[0].value(), 3);
        assert_eq!(set.labels()[1].value(), 7);
        assert_eq!(set.images()[1].pixels()[0], 255);
    }

    #[test]
    fn test_read_training_header_only_fails() {
        let csv = format!("{}\n", header(PIXEL_COUNT + 1));
        assert!(read_training(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_read_images_empty_is_ok() {
        let csv = format!("{}\n", header(PIXEL_COUNT));
        let images = read_images(csv.as_bytes()).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_bad_label_reports_row() {
        let csv = format!(
            "{}\n1,{}\n12,{}\n",
            header(PIXEL_COUNT + 1),
            pixel_row(0),
            pixel_row(0)
        );
        let err = read_training(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"), "got: {err:#}");
    }
}
