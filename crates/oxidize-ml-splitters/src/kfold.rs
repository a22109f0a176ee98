use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::{VMat, VMatrix};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::splitter::{attached, check_split, split_block, Splitter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KFoldConfig {
    /// Number of folds.
    pub k: usize,
    pub append_train: bool,
}

impl Default for KFoldConfig {
    fn default() -> Self {
        KFoldConfig {
            k: 5,
            append_train: false,
        }
    }
}

/// K-fold cross-validation over contiguous blocks.
///
/// Fold `f` tests on rows `[f*b, min((f+1)*b, length))` with
/// `b = max(1, ceil(length / k))` and trains on the rest. With `k >= length`
/// this is leave-one-out. Trailing folds starting at or past `length` have
/// an empty test set; this happens whenever `(k - 1) * b >= length`, e.g.
/// 6 folds over 10 rows.
pub struct KFoldSplitter {
    config: KFoldConfig,
    dataset: Option<VMat>,
}

impl KFoldSplitter {
    pub fn new(config: KFoldConfig) -> Self {
        KFoldSplitter { config, dataset: None }
    }

    pub fn with_folds(k: usize) -> Self {
        KFoldSplitter::new(KFoldConfig {
            k,
            ..KFoldConfig::default()
        })
    }

    fn fold_size(&self, length: usize) -> usize {
        length.div_ceil(self.config.k).max(1)
    }

    /// Trailing folds with an empty test set over `length` rows.
    pub fn empty_folds(&self, length: usize) -> usize {
        let b = self.fold_size(length);
        self.config.k.saturating_sub(length.div_ceil(b))
    }
}

impl Splitter for KFoldSplitter {
    fn class_name(&self) -> &'static str {
        "KFoldSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        if self.config.k == 0 {
            return Err(VMatError::config("KFoldSplitter needs at least one fold"));
        }
        let empty = self.empty_folds(dataset.length());
        if empty > 0 {
            warn!(k = self.config.k, length = dataset.length(), empty, "some folds have an empty test set");
        }
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(self.config.k)
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(if self.config.append_train { 3 } else { 2 })
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        let d = self.dataset()?;
        check_split(k, self.config.k)?;
        let l = d.length();
        let b = self.fold_size(l);
        let start = (k * b).min(l);
        let (train, test) = split_block(d, start, b.min(l - start))?;
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

    #[test]
    fn test_folds_partition_dataset() {
        let mut s = KFoldSplitter::with_folds(5);
        s.set_dataset(numbered(10)).unwrap();
        assert_eq!(s.nsplits().unwrap(), 5);
        let mut seen = Vec::new();
        for f in 0..5 {
            let split = s.get_split(f).unwrap();
            let test = ids(&split[1]);
            assert_eq!(test, vec![2 * f, 2 * f + 1]);
            assert_eq!(split[0].length(), 8);
            assert!(ids(&split[0]).iter().all(|r| !test.contains(r)));
            seen.extend(test);
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(matches!(s.get_split(5), Err(VMatError::OutOfRange { .. })));
    }

    #[test]
    fn test_uneven_folds() {
        let mut s = KFoldSplitter::with_folds(3);
        s.set_dataset(numbered(7)).unwrap();
        let sizes: Vec<usize> = (0..3).map(|f| s.get_split(f).unwrap()[1].length()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_leave_one_out_and_empty_folds() {
        let mut s = KFoldSplitter::with_folds(4);
        s.set_dataset(numbered(3)).unwrap();
        assert_eq!(ids(&s.get_split(1).unwrap()[1]), vec![1]);
        let last = s.get_split(3).unwrap();
        assert_eq!(last[1].length(), 0);
        assert_eq!(last[0].length(), 3);
    }

    #[test]
    fn test_empty_trailing_fold_with_fewer_folds_than_rows() {
        let mut s = KFoldSplitter::with_folds(6);
        assert_eq!(s.empty_folds(10), 1);
        s.set_dataset(numbered(10)).unwrap();
        let sizes: Vec<usize> = (0..6).map(|f| s.get_split(f).unwrap()[1].length()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 2, 2, 0]);
        assert_eq!(s.get_split(5).unwrap()[0].length(), 10);

        assert_eq!(s.empty_folds(12), 0);
        assert_eq!(KFoldSplitter::with_folds(3).empty_folds(7), 0);
        assert_eq!(KFoldSplitter::with_folds(4).empty_folds(3), 1);
        assert_eq!(KFoldSplitter::with_folds(2).empty_folds(0), 2);
    }

    #[test]
    fn test_idempotent() {
        let mut s = KFoldSplitter::new(KFoldConfig { k: 4, append_train: true });
        s.set_dataset(numbered(8)).unwrap();
        let a = s.get_split(2).unwrap();
        let b = s.get_split(2).unwrap();
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(ids(x), ids(y));
        }
    }

    #[test]
    fn test_zero_folds_rejected() {
        let mut s = KFoldSplitter::with_folds(0);
        assert!(s.set_dataset(numbered(3)).is_err());
        assert!(matches!(s.nsplits(), Err(VMatError::NotInitialized(_))));
    }
}
