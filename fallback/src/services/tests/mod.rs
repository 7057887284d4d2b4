//! Tests for the real service implementations
//!
//! File-backed services run against temporary directories; the HTTP
//! transport runs against a local wiremock server.
