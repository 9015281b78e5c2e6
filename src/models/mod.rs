pub mod ledgermodels;
