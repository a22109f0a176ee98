use serde::{Deserialize, Serialize};

use crate::kfold::{KFoldConfig, KFoldSplitter};
use crate::sequential::{SequentialConfig, SequentialSplitter};
use crate::splitter::{IdentitySplitter, Splitter};
use crate::stacked::StackedSplitter;
use crate::test_in_train::TestInTrainSplitter;
use crate::train_test::{TrainTestBagsConfig, TrainTestBagsSplitter, TrainTestConfig, TrainTestSplitter};
use crate::train_valid_test::{TrainValidTestConfig, TrainValidTestSplitter};

fn default_percentage_added() -> f64 {
    0.1
}

/// Serializable description of a splitter tree.
///
/// ```json
/// { "type": "stacked",
///   "initial": { "type": "k_fold", "k": 5 },
///   "top": [ { "type": "train_test", "test_fraction": 0.2 }, null ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitterConfig {
    Identity,
    TrainTest(TrainTestConfig),
    TrainTestBags(TrainTestBagsConfig),
    KFold(KFoldConfig),
    Sequential(SequentialConfig),
    TrainValidTest(TrainValidTestConfig),
    Stacked {
        initial: Box<SplitterConfig>,
        #[serde(default)]
        top: Vec<Option<SplitterConfig>>,
    },
    TestInTrain {
        source: Box<SplitterConfig>,
        #[serde(default = "default_percentage_added")]
        percentage_added: f64,
    },
}

impl SplitterConfig {
    pub fn build(&self) -> Box<dyn Splitter> {
        match self {
            SplitterConfig::Identity => Box::new(IdentitySplitter::new()),
            SplitterConfig::TrainTest(c) => Box::new(TrainTestSplitter::new(c.clone())),
            SplitterConfig::TrainTestBags(c) => Box::new(TrainTestBagsSplitter::new(c.clone())),
            SplitterConfig::KFold(c) => Box::new(KFoldSplitter::new(c.clone())),
            SplitterConfig::Sequential(c) => Box::new(SequentialSplitter::new(c.clone())),
            SplitterConfig::TrainValidTest(c) => Box::new(TrainValidTestSplitter::new(c.clone())),
            SplitterConfig::Stacked { initial, top } => Box::new(StackedSplitter::new(
                initial.build(),
                top.iter().map(|t| t.as_ref().map(|c| c.build())).collect(),
            )),
            SplitterConfig::TestInTrain {
                source,
                percentage_added,
            } => Box::new(TestInTrainSplitter::new(source.build(), *percentage_added)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::tests::numbered;

    #[test]
    fn test_parse_and_build_stacked() {
        let json = r#"{
            "type": "stacked",
            "initial": { "type": "k_fold", "k": 2 },
            "top": [ { "type": "train_test", "test_fraction": 0.5 }, null ]
        }"#;
        let config: SplitterConfig = serde_json::from_str(json).unwrap();
        match &config {
            SplitterConfig::Stacked { initial, top } => {
                assert_eq!(**initial, SplitterConfig::KFold(KFoldConfig { k: 2, append_train: false }));
                assert_eq!(top.len(), 2);
                assert!(top[1].is_none());
            }
            other => panic!("unexpected config {:?}", other),
        }
        let mut s = config.build();
        assert_eq!(s.class_name(), "StackedSplitter");
        s.set_dataset(numbered(8)).unwrap();
        assert_eq!(s.nsplits().unwrap(), 2);
        assert_eq!(s.n_sets_per_split().unwrap(), 3);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: SplitterConfig =
            serde_json::from_str(r#"{ "type": "test_in_train", "source": { "type": "train_test" } }"#).unwrap();
        assert_eq!(
            config,
            SplitterConfig::TestInTrain {
                source: Box::new(SplitterConfig::TrainTest(TrainTestConfig::default())),
                percentage_added: 0.1,
            }
        );
        let back: SplitterConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
