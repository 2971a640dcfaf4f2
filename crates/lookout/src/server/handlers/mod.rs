pub mod logs;
pub mod matching;
pub mod status;
