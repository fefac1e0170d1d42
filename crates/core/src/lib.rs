pub mod chain;
pub mod config;
pub mod contracts;
pub mod ledger;
pub mod pipeline;
pub mod steps;
pub mod token;

#[cfg(test)]
pub(crate) mod test_fixtures;
