pub mod balance_writer;
pub mod event_reader;
pub mod runner;
