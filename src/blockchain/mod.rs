pub mod ledger_client;
