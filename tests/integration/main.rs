//! Integration tests for olympedia-sync

mod sync_tests;
