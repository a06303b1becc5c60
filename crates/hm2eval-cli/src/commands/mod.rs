pub mod check;
pub mod evaluate;
pub mod init;
pub mod summarize;
