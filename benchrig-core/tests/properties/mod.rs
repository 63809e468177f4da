mod command_tests;
mod counter_tests;
mod estimator_tests;
mod metrics_tests;
