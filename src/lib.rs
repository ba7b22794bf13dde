// Digit Topics: unsupervised handwritten-digit recognition with LDA.
//
// This is the library root. Each module corresponds to a stage of the
// pipeline: load images, fit topics without labels, name the topics by
// majority vote, predict and write results.

pub mod assignment;
pub mod config;
pub mod data;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod topics;
