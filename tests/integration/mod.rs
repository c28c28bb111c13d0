mod harness_runs;
mod transport_tests;
