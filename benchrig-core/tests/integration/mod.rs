mod experiment_tests;
mod lifecycle_tests;
mod shutdown_tests;
mod support;
