pub mod run;
pub mod split;
pub mod status;
