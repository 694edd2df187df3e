//! Integration tests for Velour.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a backend project
//! export VELOUR_BACKEND_URL="https://shop-api.example.dev"
//! export VELOUR_BACKEND_ANON_KEY="<anon key>"
//!
//! # Optional: a seeded account for the signed-in tests
//! export VELOUR_TEST_EMAIL="it@example.com"
//! export VELOUR_TEST_PASSWORD="..."
//!
//! # Run the live tests
//! cargo test -p velour-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `live_backend` - Full flows against a reachable backend project
//!
//! All tests are `#[ignore]`d by default because they need network access
//! and project credentials; the unit suites in `velour-storefront` cover
//! the same flows over an in-memory backend.
