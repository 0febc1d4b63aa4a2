//! Unit test modules.

mod config_test;
mod derived_view_test;
mod session_test;
mod store_test;
mod wizard_test;
