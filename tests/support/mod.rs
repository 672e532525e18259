pub mod analyzer_harness;
