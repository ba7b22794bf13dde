// JSON dump of a resolved topic assignment, for inspecting a run later.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::assignment::vote::TopicAssignment;
use crate::data::models::Digit;

#[derive(Debug, Serialize)]
struct AssignmentFile {
    topics: Vec<TopicEntry>,
    unclaimed_digits: Vec<Digit>,
    duplicate_digits: Vec<Digit>,
}

#[derive(Debug, Serialize)]
struct TopicEntry {
    topic: usize,
    /// `null` when no training row voted for the topic
    digit: Option<Digit>,
}

/// Render the assignment as pretty-printed JSON.
pub fn assignment_json(assignment: &TopicAssignment) -> Result<String> {
    let file = AssignmentFile {
        topics: assignment
            .iter()
            .map(|(topic, digit)| TopicEntry { topic, digit })
            .collect(),
        unclaimed_digits: assignment.unclaimed_digits(),
        duplicate_digits: assignment.duplicate_digits(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Write the assignment JSON to `path`.
pub fn write_assignment_json(path: &Path, assignment: &TopicAssignment) -> Result<()> {
    let json = assignment_json(assignment)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write assignment to {}", path.display()))?;
    info!(path = %path.display(), "Wrote topic assignment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let assignment = TopicAssignment::from_topics(vec![Some(Digit::new(3).unwrap()), None]);
        let json = assignment_json(&assignment).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["topics"][0]["digit"], 3);
        assert!(value["topics"][1]["digit"].is_null());
        assert_eq!(value["unclaimed_digits"].as_array().unwrap().len(), 9);
    }
}
