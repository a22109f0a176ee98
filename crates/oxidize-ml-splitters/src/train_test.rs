use std::sync::Arc;

use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::{SelectRowsVMatrix, VMat, VMatrix};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::splitter::{attached, block_size, check_split, split, split_block, Splitter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainTestConfig {
    /// Share of rows in the test set, or an absolute row count when `>= 1`.
    pub test_fraction: f64,
    /// Return the train set a second time as a third view.
    pub append_train: bool,
    /// Permute the rows once when the dataset is attached.
    pub shuffle: bool,
    /// Seed for the permutation; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for TrainTestConfig {
    fn default() -> Self {
        TrainTestConfig {
            test_fraction: 0.1,
            append_train: false,
            shuffle: false,
            seed: None,
        }
    }
}

/// One split: train is the head of the dataset, test its tail.
pub struct TrainTestSplitter {
    config: TrainTestConfig,
    dataset: Option<VMat>,
    ordered: Option<VMat>,
}

impl TrainTestSplitter {
    pub fn new(config: TrainTestConfig) -> Self {
        TrainTestSplitter {
            config,
            dataset: None,
            ordered: None,
        }
    }

    pub fn with_fraction(test_fraction: f64) -> Self {
        TrainTestSplitter::new(TrainTestConfig {
            test_fraction,
            ..TrainTestConfig::default()
        })
    }

    pub fn config(&self) -> &TrainTestConfig {
        &self.config
    }
}

/// Rows of `dataset` in a random order drawn from `seed`.
pub(crate) fn shuffled(dataset: &VMat, seed: Option<u64>) -> VMatResult<VMat> {
    let mut indices: Vec<usize> = (0..dataset.length()).collect();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    indices.shuffle(&mut rng);
    Ok(Arc::new(SelectRowsVMatrix::new(dataset.clone(), indices)?))
}

impl Splitter for TrainTestSplitter {
    fn class_name(&self) -> &'static str {
        "TrainTestSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        block_size(self.config.test_fraction, dataset.length())?;
        let ordered = if self.config.shuffle {
            shuffled(&dataset, self.config.seed)?
        } else {
            dataset.clone()
        };
        debug!(length = dataset.length(), shuffle = self.config.shuffle, "TrainTestSplitter dataset set");
        self.ordered = Some(ordered);
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(1)
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(if self.config.append_train { 3 } else { 2 })
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        let ordered = attached(&self.ordered, self.class_name())?;
        check_split(k, 1)?;
        let (train, test) = split(ordered, self.config.test_fraction, 0)?;
        let mut out = vec![train.clone(), test];
        if self.config.append_train {
            out.push(train);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainTestBagsConfig {
    pub test_fraction: f64,
    pub append_train: bool,
    /// Move the cut back to the start of the bag it falls in.
    pub respect_bags: bool,
}

impl Default for TrainTestBagsConfig {
    fn default() -> Self {
        TrainTestBagsConfig {
            test_fraction: 0.1,
            append_train: false,
            respect_bags: false,
        }
    }
}

/// Tail split over bagged data. The bag tag sits in the last target column;
/// a tag of 1 or 3 opens a bag.
pub struct TrainTestBagsSplitter {
    config: TrainTestBagsConfig,
    dataset: Option<VMat>,
}

impl TrainTestBagsSplitter {
    pub fn new(config: TrainTestBagsConfig) -> Self {
        TrainTestBagsSplitter { config, dataset: None }
    }

    /// First row of the test set.
    fn cut(&self, dataset: &VMat) -> VMatResult<usize> {
        let l = dataset.length();
        let n = block_size(self.config.test_fraction, l)?.min(l);
        let cut = l - n;
        if !self.config.respect_bags || cut == l {
            return Ok(cut);
        }
        let sizes = dataset.sizes().resolve(dataset.width());
        let (is, ts, _) = sizes.required()?;
        if ts == 0 {
            return Err(VMatError::config("respect_bags needs a target column holding bag tags"));
        }
        let tag_col = is + ts - 1;
        for r in (0..=cut).rev() {
            let tag = dataset.get(r, tag_col)?;
            if tag == 1.0 || tag == 3.0 {
                return Ok(r);
            }
        }
        Ok(0)
    }
}

impl Splitter for TrainTestBagsSplitter {
    fn class_name(&self) -> &'static str {
        "TrainTestBagsSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        block_size(self.config.test_fraction, dataset.length())?;
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(1)
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(if self.config.append_train { 3 } else { 2 })
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        let d = self.dataset()?;
        check_split(k, 1)?;
        let cut = self.cut(d)?;
        let (train, test) = split_block(d, cut, d.length() - cut)?;
        let mut out = vec![train.clone(), test];
        if self.config.append_train {
            out.push(train);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::tests::{ids, numbered};
    use oxidize_ml_core::RoleSizes;
    use oxidize_ml_vmat::MemoryVMatrix;

    #[test]
    fn test_tail_split() {
        let d = numbered(10);
        let mut s = TrainTestSplitter::with_fraction(0.3);
        assert!(matches!(s.get_split(0), Err(VMatError::NotInitialized(_))));
        s.set_dataset(d.clone()).unwrap();
        assert_eq!(s.nsplits().unwrap(), 1);
        assert_eq!(s.n_sets_per_split().unwrap(), 2);
        let split = s.get_split(0).unwrap();
        assert_eq!(split[0].length(), 7);
        assert_eq!(split[1].length(), 3);
        for i in 0..3 {
            assert_eq!(split[1].row(i).unwrap(), d.row(7 + i).unwrap());
        }
        assert_eq!(split[1].sizes(), RoleSizes::new(2, 1, 0, 0));
        assert!(matches!(s.get_split(1), Err(VMatError::OutOfRange { .. })));
    }

    #[test]
    fn test_absolute_count_and_append_train() {
        let mut s = TrainTestSplitter::new(TrainTestConfig {
            test_fraction: 4.0,
            append_train: true,
            ..TrainTestConfig::default()
        });
        s.set_dataset(numbered(10)).unwrap();
        assert_eq!(s.n_sets_per_split().unwrap(), 3);
        let split = s.get_split(0).unwrap();
        assert_eq!(ids(&split[1]), vec![6, 7, 8, 9]);
        assert_eq!(ids(&split[0]), ids(&split[2]));
    }

    #[test]
    fn test_shuffle_is_stable_until_reset() {
        let d = numbered(20);
        let mut s = TrainTestSplitter::new(TrainTestConfig {
            test_fraction: 0.25,
            shuffle: true,
            seed: Some(7),
            ..TrainTestConfig::default()
        });
        s.set_dataset(d.clone()).unwrap();
        let a = s.get_split(0).unwrap();
        let b = s.get_split(0).unwrap();
        assert_eq!(ids(&a[1]), ids(&b[1]));
        assert_eq!(ids(&a[0]), ids(&b[0]));

        let mut all: Vec<usize> = ids(&a[0]).into_iter().chain(ids(&a[1])).collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());

        let mut again = TrainTestSplitter::new(s.config().clone());
        again.set_dataset(d).unwrap();
        assert_eq!(ids(&again.get_split(0).unwrap()[1]), ids(&a[1]));
    }

    fn bagged() -> VMat {
        // bags: [0,1,2] [3,4] [5] [6,7,8,9]
        let tags = [1.0, 0.0, 2.0, 1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 2.0];
        let rows: Vec<Vec<f64>> = tags.iter().enumerate().map(|(i, &t)| vec![i as f64, t]).collect();
        let m = MemoryVMatrix::from_rows(&rows).unwrap();
        m.set_sizes(RoleSizes::new(1, 1, 0, 0)).unwrap();
        Arc::new(m)
    }

    #[test]
    fn test_bags_plain_cut() {
        let mut s = TrainTestBagsSplitter::new(TrainTestBagsConfig {
            test_fraction: 0.2,
            ..TrainTestBagsConfig::default()
        });
        s.set_dataset(bagged()).unwrap();
        let split = s.get_split(0).unwrap();
        assert_eq!(ids(&split[1]), vec![8, 9]);
    }

    #[test]
    fn test_bags_respected() {
        let mut s = TrainTestBagsSplitter::new(TrainTestBagsConfig {
            test_fraction: 0.2,
            append_train: true,
            respect_bags: true,
        });
        s.set_dataset(bagged()).unwrap();
        let split = s.get_split(0).unwrap();
        assert_eq!(split.len(), 3);
        assert_eq!(ids(&split[1]), vec![6, 7, 8, 9]);
        assert_eq!(ids(&split[0]), vec![0, 1, 2, 3, 4, 5]);
    }
}
