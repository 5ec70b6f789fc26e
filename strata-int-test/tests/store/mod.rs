//! Store integration test module.

mod store_transaction_test;
