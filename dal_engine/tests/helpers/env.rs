//! Helper functions for reading environment variables in tests

use dal_engine::config::load_dotenv;

/// Base URL of a live Simple Cone Search service (`DAL_TEST_CONE_URL`).
/// Returns None if not set (live tests skip in this case)
pub fn get_test_cone_url() -> Option<String> {
    load_dotenv();
    std::env::var("DAL_TEST_CONE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
}
