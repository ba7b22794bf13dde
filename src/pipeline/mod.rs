// Pipelines: the end-to-end run and the held-out evaluation.

pub mod evaluate;
pub mod run;
