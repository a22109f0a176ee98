use std::sync::Arc;

use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::{SelectRowsVMatrix, VMat, VMatrix};
use tracing::debug;

use crate::splitter::{attached, check_split, concat, Splitter};

/// Moves successive chunks of each test set into the train set.
///
/// For every split of the source splitter, chunk `c` adds test rows
/// `[c*n, (c+1)*n)` (wrapping to the start of the test set) to the train
/// set, with `n = round(n_train * percentage_added)`. Each split is
/// `[train + chunk, test, other source sets...]`. Train and test sizes must
/// not vary across the source's splits.
pub struct TestInTrainSplitter {
    source: Box<dyn Splitter>,
    percentage_added: f64,
    n_to_add: usize,
    n_test: usize,
    per_split: usize,
    dataset: Option<VMat>,
}

impl TestInTrainSplitter {
    pub fn new(source: Box<dyn Splitter>, percentage_added: f64) -> Self {
        TestInTrainSplitter {
            source,
            percentage_added,
            n_to_add: 0,
            n_test: 0,
            per_split: 0,
            dataset: None,
        }
    }

    /// Test rows added to each train set.
    pub fn n_to_add(&self) -> usize {
        self.n_to_add
    }
}

impl Splitter for TestInTrainSplitter {
    fn class_name(&self) -> &'static str {
        "TestInTrainSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        self.dataset = None;
        if !(0.0..=1.0).contains(&self.percentage_added) {
            return Err(VMatError::config(format!(
                "percentage_added must lie in [0, 1], got {}",
                self.percentage_added
            )));
        }
        self.source.set_dataset(dataset.clone())?;
        let first = self.source.get_split(0)?;
        if first.len() < 2 {
            return Err(VMatError::config("source splitter must return at least a train and a test set"));
        }
        let (n_train, n_test) = (first[0].length(), first[1].length());
        let n_to_add = (n_train as f64 * self.percentage_added).round() as usize;
        if n_to_add == 0 {
            return Err(VMatError::config(format!(
                "adding {} of {} train rows moves no test row",
                self.percentage_added, n_train
            )));
        }
        if n_to_add > n_test {
            return Err(VMatError::OutOfRange {
                what: "test rows to add",
                index: n_to_add,
                len: n_test + 1,
            });
        }
        self.n_to_add = n_to_add;
        self.n_test = n_test;
        self.per_split = n_test.div_ceil(n_to_add);
        debug!(n_train, n_test, n_to_add, per_split = self.per_split, "TestInTrainSplitter dataset set");
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(self.source.nsplits()? * self.per_split)
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        self.source.n_sets_per_split()
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        check_split(k, self.nsplits()?)?;
        let (outer, chunk) = (k / self.per_split, k % self.per_split);
        let mut sets = self.source.get_split(outer)?;
        let test = sets[1].clone();
        if test.length() != self.n_test {
            return Err(VMatError::config(format!(
                "source split {} has {} test rows, expected {}",
                outer,
                test.length(),
                self.n_test
            )));
        }
        let start = chunk * self.n_to_add;
        let picked: Vec<usize> = (start..start + self.n_to_add).map(|i| i % self.n_test).collect();
        let added: VMat = Arc::new(SelectRowsVMatrix::new(test, picked)?);
        sets[0] = concat(vec![sets[0].clone(), added])?;
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kfold::KFoldSplitter;
    use crate::splitter::tests::{ids, numbered};
    use crate::train_test::TrainTestSplitter;

    #[test]
    fn test_chunks_wrap_around() {
        // 8 train rows, 4 test rows, 3 added per split
        let mut s = TestInTrainSplitter::new(Box::new(TrainTestSplitter::with_fraction(4.0)), 0.375);
        s.set_dataset(numbered(12)).unwrap();
        assert_eq!(s.n_to_add(), 3);
        assert_eq!(s.nsplits().unwrap(), 2);
        assert_eq!(s.n_sets_per_split().unwrap(), 2);

        let first = s.get_split(0).unwrap();
        assert_eq!(ids(&first[0]), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(ids(&first[1]), vec![8, 9, 10, 11]);

        let second = s.get_split(1).unwrap();
        assert_eq!(ids(&second[0])[8..].to_vec(), vec![11, 8, 9]);
        assert!(s.get_split(2).is_err());
    }

    #[test]
    fn test_over_kfold() {
        let mut s = TestInTrainSplitter::new(Box::new(KFoldSplitter::with_folds(4)), 0.25);
        s.set_dataset(numbered(8)).unwrap();
        // 6 train rows, 2 test rows, 2 added: one chunk per fold
        assert_eq!(s.nsplits().unwrap(), 4);
        let split = s.get_split(2).unwrap();
        assert_eq!(ids(&split[1]), vec![4, 5]);
        assert_eq!(ids(&split[0]), vec![0, 1, 2, 3, 6, 7, 4, 5]);
    }

    #[test]
    fn test_too_many_rows_to_add() {
        let mut s = TestInTrainSplitter::new(Box::new(TrainTestSplitter::with_fraction(2.0)), 0.5);
        assert!(matches!(
            s.set_dataset(numbered(10)),
            Err(VMatError::OutOfRange { .. })
        ));
        assert!(matches!(s.nsplits(), Err(VMatError::NotInitialized(_))));
    }
}
