pub mod alphabet;
pub mod automaton;
pub mod distribution;
pub mod fragment;
pub mod learner;
pub mod model;
pub mod progress;
pub mod scorer;
pub mod smoothing;
pub mod spectrum;
pub mod tree;

#[doc(hidden)]
pub mod _internal_test_data;
