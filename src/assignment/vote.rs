// Majority-vote topic -> digit assignment.
//
// The topic model never sees labels, so its topics come out unnamed. We name
// them after the fact: every training row votes for the digit it carries
// under its dominant topic, and each topic takes the digit with the most
// votes. Ties go to the lower digit, and a topic with no votes at all stays
// unassigned until the caller picks a fallback.

use anyhow::Result;
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

use crate::data::models::{Digit, DIGIT_COUNT};

/// What to do when a digit has no training rows at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingLabelPolicy {
    /// Refuse to build an assignment (the vote would be incomplete).
    #[default]
    Error,
    /// Treat the digit as an empty group that simply never wins a vote.
    Empty,
}

/// How to resolve a topic that received no votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnassignedPolicy {
    /// Use this digit instead.
    Fallback(Digit),
    /// Fail the lookup.
    Error,
}

impl Default for UnassignedPolicy {
    fn default() -> Self {
        UnassignedPolicy::Fallback(Digit::ZERO)
    }
}

/// Index of the largest probability in a topic distribution row.
///
/// Ties resolve to the lowest index: a later topic has to be strictly
/// greater to take over.
pub fn dominant_topic(row: ArrayView1<'_, f64>) -> Result<usize> {
    let mut iter = row.iter().enumerate();
    let (mut best, mut best_p) = match iter.next() {
        Some((i, &p)) => (i, p),
        None => anyhow::bail!("cannot take the dominant topic of an empty distribution"),
    };
    for (i, &p) in iter {
        if p > best_p {
            best = i;
            best_p = p;
        }
    }
    Ok(best)
}

/// Dominant topics of the training rows, grouped by their true digit.
///
/// All ten digits are present from the start; a digit without rows has an
/// empty group.
#[derive(Debug, Clone, Default)]
pub struct LabelGroups {
    groups: [Vec<usize>; DIGIT_COUNT],
}

impl LabelGroups {
    /// Dominant topics (in row order) of rows labeled `digit`.
    pub fn topics_for(&self, digit: Digit) -> &[usize] {
        &self.groups[digit.index()]
    }

    /// How many rows labeled `digit` had `topic` as their dominant topic.
    pub fn count(&self, digit: Digit, topic: usize) -> usize {
        self.topics_for(digit).iter().filter(|&&t| t == topic).count()
    }

    /// Digits with no training rows.
    pub fn missing_digits(&self) -> Vec<Digit> {
        Digit::all()
            .filter(|d| self.topics_for(*d).is_empty())
            .collect()
    }
}

/// Group each row's dominant topic under its label.
pub fn group_by_label(distributions: &Array2<f64>, labels: &[Digit]) -> Result<LabelGroups> {
    if distributions.nrows() != labels.len() {
        anyhow::bail!(
            "{} topic distributions but {} labels",
            distributions.nrows(),
            labels.len()
        );
    }

    let mut groups = LabelGroups::default();
    for (row, label) in distributions.outer_iter().zip(labels) {
        groups.groups[label.index()].push(dominant_topic(row)?);
    }
    Ok(groups)
}

/// Mapping from topic index to digit. `None` marks a topic that was never
/// the dominant topic of any training row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicAssignment {
    topics: Vec<Option<Digit>>,
}

impl TopicAssignment {
    /// Build an assignment directly from per-topic digits.
    pub fn from_topics(topics: Vec<Option<Digit>>) -> Self {
        Self { topics }
    }

    /// Run the majority vote over `num_topics` topics.
    pub fn resolve(
        groups: &LabelGroups,
        num_topics: usize,
        policy: MissingLabelPolicy,
    ) -> Result<Self> {
        let missing = groups.missing_digits();
        if policy == MissingLabelPolicy::Error && !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|d| d.to_string()).collect();
            anyhow::bail!(
                "no training rows for digit(s) {}; every digit 0-9 needs at least one example",
                listed.join(", ")
            );
        }

        // counts[digit][topic]
        let mut counts = vec![vec![0usize; num_topics]; DIGIT_COUNT];
        for digit in Digit::all() {
            for &topic in groups.topics_for(digit) {
                if topic >= num_topics {
                    anyhow::bail!("dominant topic {topic} is out of range for {num_topics} topics");
                }
                counts[digit.index()][topic] += 1;
            }
        }

        let topics = (0..num_topics)
            .map(|topic| {
                let mut best: Option<Digit> = None;
                let mut best_count = 0;
                for digit in Digit::all() {
                    let count = counts[digit.index()][topic];
                    if count > best_count {
                        best_count = count;
                        best = Some(digit);
                    }
                }
                best
            })
            .collect();

        Ok(Self { topics })
    }

    /// Group and vote in one step; the topic count is the distribution width.
    pub fn from_distributions(
        distributions: &Array2<f64>,
        labels: &[Digit],
        policy: MissingLabelPolicy,
    ) -> Result<Self> {
        let groups = group_by_label(distributions, labels)?;
        Self::resolve(&groups, distributions.ncols(), policy)
    }

    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }

    /// The voted digit for `topic`, or `None` if it got no votes (or does
    /// not exist).
    pub fn assigned(&self, topic: usize) -> Option<Digit> {
        self.topics.get(topic).copied().flatten()
    }

    /// Resolve `topic` to a digit, applying `policy` to unassigned topics.
    pub fn label_for(&self, topic: usize, policy: UnassignedPolicy) -> Result<Digit> {
        match self.topics.get(topic) {
            None => anyhow::bail!(
                "topic {topic} is out of range for an assignment over {} topics",
                self.topics.len()
            ),
            Some(Some(digit)) => Ok(*digit),
            Some(None) => match policy {
                UnassignedPolicy::Fallback(digit) => Ok(digit),
                UnassignedPolicy::Error => anyhow::bail!(
                    "topic {topic} has no assigned digit (no training row voted for it)"
                ),
            },
        }
    }

    /// (topic, digit) pairs in topic order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<Digit>)> + '_ {
        self.topics.iter().copied().enumerate()
    }

    /// Digits no topic was assigned to.
    pub fn unclaimed_digits(&self) -> Vec<Digit> {
        Digit::all()
            .filter(|d| !self.topics.contains(&Some(*d)))
            .collect()
    }

    /// Digits claimed by more than one topic.
    pub fn duplicate_digits(&self) -> Vec<Digit> {
        Digit::all()
            .filter(|d| self.topics.iter().filter(|t| **t == Some(*d)).count() > 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::aview1;

    fn digit(v: u8) -> Digit {
        Digit::new(v).unwrap()
    }

    #[test]
    fn test_dominant_topic_first_max_wins() {
        let row = [0.3, 0.3, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(dominant_topic(aview1(&row)).unwrap(), 2);

        let row = [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(dominant_topic(aview1(&row)).unwrap(), 0);
    }

    #[test]
    fn test_dominant_topic_empty_row_fails() {
        let row: [f64; 0] = [];
        assert!(dominant_topic(aview1(&row)).is_err());
    }

    #[test]
    fn test_label_for_policies() {
        let assignment = TopicAssignment::from_topics(vec![Some(digit(4)), None]);
        assert_eq!(
            assignment.label_for(0, UnassignedPolicy::Error).unwrap(),
            digit(4)
        );
        assert_eq!(
            assignment.label_for(1, UnassignedPolicy::default()).unwrap(),
            Digit::ZERO
        );
        assert!(assignment.label_for(1, UnassignedPolicy::Error).is_err());
        assert!(assignment.label_for(2, UnassignedPolicy::default()).is_err());
    }

    #[test]
    fn test_unclaimed_and_duplicates() {
        let mut topics = vec![None; 10];
        topics[0] = Some(digit(1));
        topics[1] = Some(digit(1));
        topics[2] = Some(digit(2));
        let assignment = TopicAssignment::from_topics(topics);

        assert_eq!(assignment.duplicate_digits(), vec![digit(1)]);
        let unclaimed = assignment.unclaimed_digits();
        assert_eq!(unclaimed.len(), 8);
        assert!(!unclaimed.contains(&digit(1)));
        assert!(!unclaimed.contains(&digit(2)));
    }
}
