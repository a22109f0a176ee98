use serde::{Deserialize, Serialize};

use crate::error::{VMatError, VMatResult};

/// Positional input/target/weight/extra partition of a row's columns.
///
/// `None` marks a size that is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleSizes {
    pub inputsize: Option<usize>,
    pub targetsize: Option<usize>,
    pub weightsize: Option<usize>,
    pub extrasize: Option<usize>,
}

impl RoleSizes {
    pub fn new(inputsize: usize, targetsize: usize, weightsize: usize, extrasize: usize) -> Self {
        RoleSizes {
            inputsize: Some(inputsize),
            targetsize: Some(targetsize),
            weightsize: Some(weightsize),
            extrasize: Some(extrasize),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    /// Every column is input.
    pub fn all_input(width: usize) -> Self {
        Self::new(width, 0, 0, 0)
    }

    pub fn is_complete(&self) -> bool {
        self.inputsize.is_some()
            && self.targetsize.is_some()
            && self.weightsize.is_some()
            && self.extrasize.is_some()
    }

    pub fn is_unknown(&self) -> bool {
        self.inputsize.is_none()
            && self.targetsize.is_none()
            && self.weightsize.is_none()
            && self.extrasize.is_none()
    }

    /// Check the partition against a matrix width.
    pub fn validate(&self, width: usize) -> VMatResult<()> {
        if let Some(ws) = self.weightsize {
            if ws > 1 {
                return Err(VMatError::config(format!("weightsize must be 0 or 1, got {}", ws)));
            }
        }
        let known: usize = [self.inputsize, self.targetsize, self.weightsize, self.extrasize]
            .iter()
            .flatten()
            .sum();
        if self.is_complete() && known != width {
            return Err(VMatError::config(format!(
                "sizes {}+{}+{}+{} do not add up to width {}",
                self.inputsize.unwrap_or(0),
                self.targetsize.unwrap_or(0),
                self.weightsize.unwrap_or(0),
                self.extrasize.unwrap_or(0),
                width
            )));
        }
        if known > width {
            return Err(VMatError::config(format!(
                "known sizes sum to {} which exceeds width {}",
                known, width
            )));
        }
        Ok(())
    }

    /// Fill missing sizes: with input/target/weight known, extra takes the
    /// rest; with nothing usable, everything is input.
    pub fn resolve(&self, width: usize) -> RoleSizes {
        match (self.inputsize, self.targetsize, self.weightsize) {
            (Some(is), Some(ts), Some(ws)) if is + ts + ws <= width => {
                RoleSizes::new(is, ts, ws, width - is - ts - ws)
            }
            (Some(is), Some(ts), None) if is + ts <= width && self.extrasize.is_none() => {
                RoleSizes::new(is, ts, 0, width - is - ts)
            }
            (Some(is), None, None) if is <= width && self.extrasize.is_none() => {
                RoleSizes::new(is, width - is, 0, 0)
            }
            _ => RoleSizes::all_input(width),
        }
    }

    /// Column offsets `(input, target, weight, extra)`. Fails if a size is
    /// missing.
    pub fn offsets(&self) -> VMatResult<(usize, usize, usize, usize)> {
        let (is, ts, ws) = self.required()?;
        Ok((0, is, is + ts, is + ts + ws))
    }

    /// Input, target and weight sizes, all of which must be known.
    pub fn required(&self) -> VMatResult<(usize, usize, usize)> {
        match (self.inputsize, self.targetsize, self.weightsize) {
            (Some(is), Some(ts), Some(ws)) => Ok((is, ts, ws)),
            _ => Err(VMatError::config(
                "inputsize, targetsize and weightsize must all be defined",
            )),
        }
    }
}

impl std::fmt::Display for RoleSizes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<usize>| v.map(|x| x as i64).unwrap_or(-1);
        write!(
            f,
            "{} {} {} {}",
            show(self.inputsize),
            show(self.targetsize),
            show(self.weightsize),
            show(self.extrasize)
        )
    }
}
