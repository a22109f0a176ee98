use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::VMat;
use parking_lot::Mutex;
use tracing::debug;

use crate::splitter::{attached, check_split, Splitter};

struct TopStage {
    /// Outer split the top splitters currently see. `None` while a refresh
    /// is pending or after one failed.
    outer: Option<usize>,
    /// `None` entries pass their view through unchanged.
    top: Vec<Option<Box<dyn Splitter>>>,
    views: Vec<VMat>,
}

/// Splitter of splitters.
///
/// Each view of an initial split becomes the dataset of one top splitter;
/// split `k` is outer split `k / n` of the initial splitter followed by
/// inner split `k % n` of every top splitter, `n` being their common split
/// count. Missing top splitters return their view for every inner split.
/// The initial split is recomputed only when the outer index changes.
pub struct StackedSplitter {
    initial: Box<dyn Splitter>,
    stage: Mutex<TopStage>,
    top_nsplits: usize,
    dataset: Option<VMat>,
}

impl StackedSplitter {
    /// `None` entries in `top` leave the corresponding view as is. An empty
    /// `top` leaves every view as is.
    pub fn new(initial: Box<dyn Splitter>, top: Vec<Option<Box<dyn Splitter>>>) -> Self {
        StackedSplitter {
            initial,
            stage: Mutex::new(TopStage {
                outer: None,
                top,
                views: Vec::new(),
            }),
            top_nsplits: 0,
            dataset: None,
        }
    }

    /// Hand `views` to the top splitters and return the split counts of the
    /// explicit ones. Leaves `stage.outer` unset; the caller marks it once
    /// the counts are accepted.
    fn feed(stage: &mut TopStage, views: Vec<VMat>) -> VMatResult<Vec<usize>> {
        stage.outer = None;
        if views.len() != stage.top.len() {
            return Err(VMatError::config(format!(
                "initial split has {} sets but there are {} top splitters",
                views.len(),
                stage.top.len()
            )));
        }
        let mut counts = Vec::new();
        for (t, v) in stage.top.iter_mut().zip(&views) {
            if let Some(t) = t {
                t.set_dataset(v.clone())?;
                counts.push(t.nsplits()?);
            }
        }
        stage.views = views;
        Ok(counts)
    }
}

impl Splitter for StackedSplitter {
    fn class_name(&self) -> &'static str {
        "StackedSplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
        self.dataset = None;
        self.initial.set_dataset(dataset.clone())?;
        let first = self.initial.get_split(0)?;
        let stage = self.stage.get_mut();
        if stage.top.is_empty() {
            stage.top = first.iter().map(|_| None).collect();
        }
        let counts = StackedSplitter::feed(stage, first)?;
        if counts.windows(2).any(|w| w[0] != w[1]) {
            return Err(VMatError::config(format!(
                "top splitters disagree on the number of splits: {:?}",
                counts
            )));
        }
        self.top_nsplits = counts.first().copied().unwrap_or(1);
        stage.outer = Some(0);
        debug!(top_nsplits = self.top_nsplits, "StackedSplitter dataset set");
        self.dataset = Some(dataset);
        Ok(())
    }

    fn dataset(&self) -> VMatResult<&VMat> {
        attached(&self.dataset, self.class_name())
    }

    fn nsplits(&self) -> VMatResult<usize> {
        self.dataset()?;
        Ok(self.initial.nsplits()? * self.top_nsplits)
    }

    fn n_sets_per_split(&self) -> VMatResult<usize> {
        self.dataset()?;
        let stage = self.stage.lock();
        stage
            .top
            .iter()
            .map(|t| t.as_ref().map_or(Ok(1), |t| t.n_sets_per_split()))
            .sum()
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        check_split(k, self.nsplits()?)?;
        let (outer, inner) = (k / self.top_nsplits, k % self.top_nsplits);
        let mut stage = self.stage.lock();
        if stage.outer != Some(outer) {
            let views = self.initial.get_split(outer)?;
            let counts = StackedSplitter::feed(&mut stage, views)?;
            if let Some(&n) = counts.iter().find(|&&n| n != self.top_nsplits) {
                return Err(VMatError::config(format!(
                    "outer split {} gives a top splitter {} splits, expected {}",
                    outer, n, self.top_nsplits
                )));
            }
            stage.outer = Some(outer);
            debug!(outer, "StackedSplitter top splitters refreshed");
        }
        let mut out = Vec::new();
        for (t, v) in stage.top.iter().zip(&stage.views) {
            match t {
                Some(t) => out.extend(t.get_split(inner)?),
                None => out.push(v.clone()),
            }
        }
        Ok(out)
    }
}
