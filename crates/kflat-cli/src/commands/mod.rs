pub mod check;
pub mod dump;
pub mod run;
pub mod targets;

#[cfg(test)]
mod run_tests;
