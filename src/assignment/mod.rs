// Topic -> digit assignment and prediction.
//
// This is where the training labels finally come in: only to name the
// topics the model found on its own.

pub mod predict;
pub mod vote;
