// Topic modeling: the model trait and the online LDA behind it.

pub mod lda;
pub mod traits;
