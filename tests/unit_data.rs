// Unit tests for CSV loading.
//
// Files are written to the system temp dir and removed afterwards.

use std::path::PathBuf;

use digit_topics::data::loader::{load_images, load_training, read_images, read_training};
use digit_topics::data::models::{images_to_matrix, PIXEL_COUNT};

fn temp_csv(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "digit_topics_data_{}_{}.csv",
        name,
        std::process::id()
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

fn header(columns: usize) -> String {
    (0..columns)
        .map(|i| format!("pixel{i}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn pixels(f: impl Fn(usize) -> u32) -> String {
    (0..PIXEL_COUNT)
        .map(|i| f(i).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================
// Happy path
// ============================================================

#[test]
fn training_file_roundtrips_values() {
    let contents = format!(
        "label,{}\n4,{}\n0,{}\n",
        header(PIXEL_COUNT),
        pixels(|i| (i % 256) as u32),
        pixels(|_| 0)
    );
    let path = temp_csv("train_ok", &contents);

    let set = load_training(&path).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.labels()[0].value(), 4);
    assert_eq!(set.images()[0].pixels()[300], (300 % 256) as u8);
    assert_eq!(set.images()[1].intensity_sum(), 0);

    let m = set.to_matrix();
    assert_eq!(m.dim(), (2, PIXEL_COUNT));
    assert_eq!(m[[0, 10]], 10.0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_file_has_no_label_column() {
    let contents = format!(
        "{}\n{}\n{}\n{}\n",
        header(PIXEL_COUNT),
        pixels(|_| 1),
        pixels(|_| 2),
        pixels(|_| 3)
    );
    let path = temp_csv("test_ok", &contents);

    let images = load_images(&path).unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(images_to_matrix(&images)[[2, 0]], 3.0);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn whitespace_around_fields_is_tolerated() {
    let row = (0..PIXEL_COUNT)
        .map(|_| " 7 ")
        .collect::<Vec<_>>()
        .join(",");
    let contents = format!("{}\n{}\n", header(PIXEL_COUNT), row);
    let images = read_images(contents.as_bytes()).unwrap();
    assert_eq!(images[0].pixels()[0], 7);
}

// ============================================================
// Malformed input
// ============================================================

#[test]
fn missing_file_fails() {
    let path = std::env::temp_dir().join("digit_topics_does_not_exist.csv");
    let err = load_training(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to open"));
}

#[test]
fn ragged_row_fails_with_row_number() {
    let short = (0..PIXEL_COUNT - 1)
        .map(|_| "0")
        .collect::<Vec<_>>()
        .join(",");
    let contents = format!(
        "{}\n{}\n{}\n",
        header(PIXEL_COUNT),
        pixels(|_| 0),
        short
    );
    let err = read_images(contents.as_bytes()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("row 2"), "got: {msg}");
    assert!(msg.contains("expected 784 columns"), "got: {msg}");
}

#[test]
fn non_integer_token_fails() {
    let row = pixels(|i| if i == 17 { 999_999 } else { 0 }).replace("999999", "abc");
    let contents = format!("{}\n{}\n", header(PIXEL_COUNT), row);
    let err = read_images(contents.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("not an integer"));
}

#[test]
fn pixel_above_255_fails() {
    let row = pixels(|i| if i == 0 { 256 } else { 0 });
    let contents = format!("{}\n{}\n", header(PIXEL_COUNT), row);
    let err = read_images(contents.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("expected 0-255"));
}

#[test]
fn negative_pixel_fails() {
    let row = pixels(|_| 0).replacen('0', "-1", 1);
    let contents = format!("{}\n{}\n", header(PIXEL_COUNT), row);
    assert!(read_images(contents.as_bytes()).is_err());
}

#[test]
fn label_out_of_range_fails() {
    let contents = format!("label,{}\n10,{}\n", header(PIXEL_COUNT), pixels(|_| 0));
    let err = read_training(contents.as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("not a digit"));
}

#[test]
fn training_row_without_label_column_fails() {
    // A test-shaped row fed to the training loader is one column short
    let contents = format!("{}\n{}\n", header(PIXEL_COUNT), pixels(|_| 0));
    assert!(read_training(contents.as_bytes()).is_err());
}
