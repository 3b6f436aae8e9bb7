pub mod env;
pub mod scripted;

#[allow(unused_imports)]
pub use env::{live_target, should_run_live_tests};
#[allow(unused_imports)]
pub use scripted::{connect, int_table, scripted_driver};
