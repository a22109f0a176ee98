use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::{VMat, VMatrix};
use serde::{Deserialize, Serialize};

use crate::splitter::{attached, check_split, rows, Splitter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialConfig {
    /// Rows in the first train set.
    pub init_train_size: usize,
    /// Rows predicted past the end of each train set.
    pub horizon: usize,
    /// Test sets start at row 0 instead of at the end of the train set.
    pub return_entire_vmat: bool,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        SequentialConfig {
            init_train_size: 1,
            horizon: 1,
            return_entire_vmat: false,
        }
    }
}

/// Walk-forward validation for time series.
///
/// Split `k` trains on rows `[0, t)` with `t = init_train_size + k` and
/// tests on rows up to `t + horizon`, starting at `t` or at 0.
pub struct SequentialSplitter {
    config: SequentialConfig,
    dataset: Option<VMat>,
}

impl SequentialSplitter {
    pub fn new(config: SequentialConfig) -> Self {
        SequentialSplitter { config, dataset: None }
    }
}

impl Splitter for SequentialSplitter {
    fn class_name(&self) -> &'static str {
        "SequentialSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        let c = &self.config;
        if c.init_train_size == 0 {
            return Err(VMatError::config("init_train_size must be positive"));
        }
        if c.horizon == 0 {
            return Err(VMatError::config("horizon must be positive"));
        }
        if c.init_train_size >= dataset.length() {
            return Err(VMatError::config(format!(
                "init_train_size {} leaves no test rows in a dataset of length {}",
                c.init_train_size,
                dataset.length()
            )));
        }
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        let l = self.dataset()?.length();
        Ok((l + 1).saturating_sub(self.config.init_train_size + self.config.horizon))
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(2)
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        let d = self.dataset()?;
        check_split(k, self.nsplits()?)?;
        let t = self.config.init_train_size + k;
        let start_test = if self.config.return_entire_vmat { 0 } else { t };
        let train = rows(d, 0, t)?;
        let test = rows(d, start_test, t + self.config.horizon - start_test)?;
        Ok(vec![train, test])
    }
}
