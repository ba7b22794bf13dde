// Output: the submission file, the assignment dump, and terminal display.

pub mod assignment;
pub mod submission;
pub mod terminal;
