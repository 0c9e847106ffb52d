pub mod ledger_rpc;
