// Colored terminal output for assignments and accuracy reports.
//
// main.rs delegates all display formatting here.

use colored::Colorize;

use crate::assignment::vote::TopicAssignment;
use crate::data::models::{Digit, IMAGE_SIDE};
use crate::scoring::accuracy::EvaluationReport;

/// Display the topic -> digit table, optionally with each topic's
/// strongest pixels as (row, col) in the image grid.
pub fn display_assignment(assignment: &TopicAssignment, top_pixels: Option<&[Vec<usize>]>) {
    println!(
        "\n{}",
        format!("=== Topic Assignment ({} topics) ===", assignment.num_topics()).bold()
    );
    println!();

    for (topic, digit) in assignment.iter() {
        let digit_str = match digit {
            Some(d) => d.to_string().bright_green().bold(),
            None => "unassigned".dimmed(),
        };
        print!("  Topic {:>2} -> {}", topic, digit_str);

        if let Some(pixels) = top_pixels.and_then(|p| p.get(topic)) {
            let coords: Vec<String> = pixels
                .iter()
                .map(|&i| format!("({},{})", i / IMAGE_SIDE, i % IMAGE_SIDE))
                .collect();
            print!("   {}", coords.join(" ").dimmed());
        }
        println!();
    }
    println!();

    let unclaimed = assignment.unclaimed_digits();
    if !unclaimed.is_empty() {
        println!(
            "  {} no topic maps to digit(s) {}",
            "~".yellow(),
            join_digits(&unclaimed)
        );
    }
    let duplicates = assignment.duplicate_digits();
    if !duplicates.is_empty() {
        println!(
            "  {} several topics map to digit(s) {}",
            "~".yellow(),
            join_digits(&duplicates)
        );
    }
}

/// Display accuracy with per-digit recall.
pub fn display_report(title: &str, report: &EvaluationReport) {
    println!("\n{}", format!("=== {title} ===").bold());
    println!(
        "  Accuracy: {} ({} / {})",
        colorize_accuracy(report.accuracy()),
        report.correct,
        report.rows
    );

    let recalls: Vec<String> = Digit::all()
        .map(|d| match report.recall(d) {
            Some(r) => format!("{d}:{:.0}%", r * 100.0),
            None => format!("{d}:-"),
        })
        .collect();
    println!("  Recall:   {}", recalls.join("  ").dimmed());
}

/// Display the confusion matrix (rows are true digits, columns predicted).
pub fn display_confusion(report: &EvaluationReport) {
    println!("\n  {}", "Confusion (true \\ predicted)".dimmed());
    let header: String = Digit::all().map(|d| format!("{:>6}", d)).collect();
    println!("      {}", header.dimmed());

    for truth in Digit::all() {
        let row = &report.confusion[truth.index()];
        let cells: String = Digit::all()
            .map(|pred| {
                let cell = format!("{:>6}", row[pred.index()]);
                if pred == truth {
                    cell.green().to_string()
                } else if row[pred.index()] > 0 {
                    cell.normal().to_string()
                } else {
                    cell.dimmed().to_string()
                }
            })
            .collect();
        println!("  {:>3} {}", truth, cells);
    }
    println!();
}

fn join_digits(digits: &[Digit]) -> String {
    digits
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Colorize an accuracy fraction.
fn colorize_accuracy(accuracy: f64) -> colored::ColoredString {
    let text = format!("{:.1}%", accuracy * 100.0);
    match accuracy {
        a if a >= 0.75 => text.green().bold(),
        a if a >= 0.5 => text.yellow(),
        _ => text.red(),
    }
}
