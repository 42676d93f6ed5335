pub mod resolver;
pub mod simulator;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod test_utils;
