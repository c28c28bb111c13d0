/// Unit tests against the public library surface
mod harness_tests;
mod validator_tests;
