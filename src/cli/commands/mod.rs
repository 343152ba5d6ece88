pub mod experiment;
pub mod run;
