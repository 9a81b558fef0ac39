// Marketplace registry integration tests

mod registry_test;
