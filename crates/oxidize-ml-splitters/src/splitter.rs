use std::sync::Arc;

use oxidize_ml_core::value::fraction_rows;
use oxidize_ml_core::{VMatError, VMatResult};
use oxidize_ml_vmat::{ConcatRowsVMatrix, VMat, VMatExt, VMatrix};

/// Enumerates the splits of one dataset. Every split is a tuple of views
/// over the dataset; nothing is copied and the dataset is never mutated.
pub trait Splitter: Send + Sync {
    fn class_name(&self) -> &'static str;

    /// Attach the dataset, dropping anything derived from a previous one.
    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()>;

    fn dataset(&self) -> VMatResult<&VMat>;

    fn nsplits(&self) -> VMatResult<usize>;

    /// Views per split, the same for every split.
    fn n_sets_per_split(&self) -> VMatResult<usize>;

    /// Views of split `k`. Repeated calls give the same content.
    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>>;
}

/// The attached dataset, or NotInitialized.
pub(crate) fn attached<'a>(dataset: &'a Option<VMat>, who: &str) -> VMatResult<&'a VMat> {
    dataset
        .as_ref()
        .ok_or_else(|| VMatError::NotInitialized(format!("{} has no dataset", who)))
}

pub(crate) fn check_split(k: usize, nsplits: usize) -> VMatResult<()> {
    if k >= nsplits {
        return Err(VMatError::OutOfRange {
            what: "split",
            index: k,
            len: nsplits,
        });
    }
    Ok(())
}

/// Rows in a test block: `test_fraction` of `length`, or the absolute count
/// when `test_fraction >= 1`.
pub fn block_size(test_fraction: f64, length: usize) -> VMatResult<usize> {
    if test_fraction.is_nan() || test_fraction < 0.0 {
        return Err(VMatError::config(format!(
            "test_fraction must be non-negative, got {}",
            test_fraction
        )));
    }
    if test_fraction >= 1.0 {
        return Ok(test_fraction as usize);
    }
    Ok(fraction_rows(test_fraction, length))
}

/// Rows `[start, start + length)` of `dataset`, all columns.
pub fn rows(dataset: &VMat, start: usize, length: usize) -> VMatResult<VMat> {
    dataset.sub_mat_rows(start, length)
}

/// Stack views, skipping empty ones.
pub fn concat(parts: Vec<VMat>) -> VMatResult<VMat> {
    let mut nonempty: Vec<VMat> = parts.iter().filter(|p| p.length() > 0).cloned().collect();
    match nonempty.len() {
        0 => parts
            .into_iter()
            .next()
            .ok_or_else(|| VMatError::config("nothing to concatenate")),
        1 => Ok(nonempty.remove(0)),
        _ => Ok(Arc::new(ConcatRowsVMatrix::of(nonempty)?)),
    }
}

/// `(train, test)` where test is rows `[start, start + n)` and train is
/// everything before and after it.
pub fn split_block(dataset: &VMat, start: usize, n: usize) -> VMatResult<(VMat, VMat)> {
    let l = dataset.length();
    if start + n > l {
        return Err(VMatError::OutOfBounds {
            what: "test block end",
            index: start + n,
            bound: l + 1,
        });
    }
    let test = rows(dataset, start, n)?;
    let train = concat(vec![rows(dataset, 0, start)?, rows(dataset, start + n, l - start - n)?])?;
    Ok((train, test))
}

/// `(train, test)` with a test block of [`block_size`] rows. `index`
/// counts blocks from the end: block 0 is the tail of the dataset.
pub fn split(dataset: &VMat, test_fraction: f64, index: usize) -> VMatResult<(VMat, VMat)> {
    let l = dataset.length();
    let n = block_size(test_fraction, l)?;
    let nblocks = if n == 0 { 1 } else { l / n };
    if (index + 1) * n > l || index >= nblocks {
        return Err(VMatError::OutOfRange {
            what: "test block",
            index,
            len: nblocks,
        });
    }
    split_block(dataset, l - (index + 1) * n, n)
}

/// One split made of the dataset itself.
#[derive(Default)]
pub struct IdentitySplitter {
    dataset: Option<VMat>,
}

impl IdentitySplitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Splitter for IdentitySplitter {
    fn class_name(&self) -> &'static str {
        "IdentitySplitter"
    }

    fn set_dataset(&mut self, dataset: VMat) -> VMatResult<()> {
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
        Ok(1)
    }

    fn get_split(&self, k: usize) -> VMatResult<Vec<VMat>> {
        let d = self.dataset()?;
        check_split(k, 1)?;
        Ok(vec![d.clone()])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use oxidize_ml_core::RoleSizes;
    use oxidize_ml_vmat::MemoryVMatrix;

    /// `l` rows of width 3 where row `i` is `[i, i + 0.5, i % 2]`, two
    /// inputs and one target.
    pub(crate) fn numbered(l: usize) -> VMat {
        let rows: Vec<Vec<f64>> = (0..l)
            .map(|i| vec![i as f64, i as f64 + 0.5, (i % 2) as f64])
            .collect();
        let m = MemoryVMatrix::from_rows(&rows).unwrap();
        m.set_sizes(RoleSizes::new(2, 1, 0, 0)).unwrap();
        Arc::new(m)
    }

    /// Row ids (column 0) of a view.
    pub(crate) fn ids(v: &VMat) -> Vec<usize> {
        v.column(0).unwrap().into_iter().map(|x| x as usize).collect()
    }

    #[test]
    fn test_block_size() {
        assert_eq!(block_size(0.3, 10).unwrap(), 3);
        assert_eq!(block_size(0.29, 100).unwrap(), 29);
        assert_eq!(block_size(0.25, 10).unwrap(), 2);
        assert_eq!(block_size(4.0, 10).unwrap(), 4);
        assert!(block_size(-0.1, 10).is_err());
    }

    #[test]
    fn test_split_from_tail() {
        let d = numbered(10);
        let (train, test) = split(&d, 0.2, 0).unwrap();
        assert_eq!(ids(&test), vec![8, 9]);
        assert_eq!(ids(&train), (0..8).collect::<Vec<_>>());
        let (train, test) = split(&d, 0.2, 1).unwrap();
        assert_eq!(ids(&test), vec![6, 7]);
        assert_eq!(ids(&train), vec![0, 1, 2, 3, 4, 5, 8, 9]);
        assert_eq!(train.sizes(), RoleSizes::new(2, 1, 0, 0));
        assert!(matches!(split(&d, 0.2, 5), Err(VMatError::OutOfRange { .. })));
    }

    #[test]
    fn test_identity() {
        let mut s = IdentitySplitter::new();
        assert!(matches!(s.nsplits(), Err(VMatError::NotInitialized(_))));
        let d = numbered(4);
        s.set_dataset(d.clone()).unwrap();
        let split = s.get_split(0).unwrap();
        assert!(Arc::ptr_eq(&split[0], &d));
        assert!(matches!(s.get_split(1), Err(VMatError::OutOfRange { .. })));
    }
}
