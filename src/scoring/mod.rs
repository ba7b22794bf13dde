// Scoring: how well predictions match known labels.

pub mod accuracy;
