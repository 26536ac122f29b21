pub mod bench;
pub mod rules;
pub mod scan;
