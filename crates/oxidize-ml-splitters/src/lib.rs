//! Splitters turn one dataset into an enumerated sequence of splits, each an
//! ordered tuple of zero-copy views (train, test, ...).

pub mod splitter;
pub mod train_test;
pub mod kfold;
pub mod sequential;
pub mod stacked;
pub mod test_in_train;
pub mod config;

pub use config::SplitterConfig;
pub use kfold::{KFoldConfig, KFoldSplitter};
pub use sequential::{SequentialConfig, SequentialSplitter};
pub use splitter::{split, split_block, IdentitySplitter, Splitter};
pub use stacked::StackedSplitter;
pub use test_in_train::TestInTrainSplitter;
pub use train_test::{TrainTestBagsConfig, TrainTestBagsSplitter, TrainTestConfig, TrainTestSplitter};
pub use train_valid_test::{TrainValidTestConfig, TrainValidTestSplitter};
