use oxidize_ml_core::value::fraction_rows;
use oxidize_ml_core::{RoleSizes, VMatError, VMatResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::meta::VMatMeta;
use crate::vmatrix::{gather_metadata, generic_dot, generic_dot_vec, VMat, VMatrix};

/// Window specification. Fractional fields, when set, win over their
/// absolute counterparts and are resolved against the source length at
/// build time. Unset extents run to the end of the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubVMatrixConfig {
    pub istart: usize,
    pub jstart: usize,
    pub length: Option<usize>,
    pub width: Option<usize>,
    pub fistart: Option<f64>,
    pub flength: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Window {
    istart: usize,
    jstart: usize,
}

/// Rectangular window `[istart, istart+length) x [jstart, jstart+width)` of
/// a source matrix. Reads and writes are forwarded with an index offset.
pub struct SubVMatrix {
    source: VMat,
    config: SubVMatrixConfig,
    window: RwLock<Window>,
    meta: VMatMeta,
}

impl SubVMatrix {
    pub fn new(source: VMat, config: SubVMatrixConfig) -> VMatResult<Self> {
        let m = SubVMatrix {
            source,
            config,
            window: RwLock::new(Window::default()),
            meta: VMatMeta::new(0, 0),
        };
        m.build()?;
        Ok(m)
    }

    /// Window with absolute offsets and extents.
    pub fn window(source: VMat, istart: usize, jstart: usize, length: usize, width: usize) -> VMatResult<Self> {
        SubVMatrix::new(
            source,
            SubVMatrixConfig {
                istart,
                jstart,
                length: Some(length),
                width: Some(width),
                ..SubVMatrixConfig::default()
            },
        )
    }

    /// Full-width window over a fraction of the source's rows.
    pub fn fraction(source: VMat, fistart: f64, flength: f64) -> VMatResult<Self> {
        SubVMatrix::new(
            source,
            SubVMatrixConfig {
                fistart: Some(fistart),
                flength: Some(flength),
                ..SubVMatrixConfig::default()
            },
        )
    }

    pub fn source(&self) -> &VMat {
        &self.source
    }

    pub fn istart(&self) -> usize {
        self.window.read().istart
    }

    pub fn jstart(&self) -> usize {
        self.window.read().jstart
    }

    /// Resolve the window against the source's current dimensions. Safe to
    /// call again.
    pub fn build(&self) -> VMatResult<()> {
        let (sl, sw) = (self.source.length(), self.source.width());
        let c = &self.config;

        let istart = match c.fistart {
            Some(f) => {
                check_fraction("fistart", f)?;
                fraction_rows(f, sl)
            }
            None => c.istart,
        };
        if istart > sl {
            return Err(VMatError::OutOfBounds {
                what: "istart",
                index: istart,
                bound: sl + 1,
            });
        }
        let length = match c.flength {
            Some(f) => {
                check_fraction("flength", f)?;
                fraction_rows(f, sl)
            }
            None => c.length.unwrap_or(sl - istart),
        };
        if c.jstart > sw {
            return Err(VMatError::OutOfBounds {
                what: "jstart",
                index: c.jstart,
                bound: sw + 1,
            });
        }
        let width = c.width.unwrap_or(sw - c.jstart);
        if istart + length > sl {
            return Err(VMatError::OutOfBounds {
                what: "window row end",
                index: istart + length,
                bound: sl + 1,
            });
        }
        if c.jstart + width > sw {
            return Err(VMatError::OutOfBounds {
                what: "window column end",
                index: c.jstart + width,
                bound: sw + 1,
            });
        }

        *self.window.write() = Window {
            istart,
            jstart: c.jstart,
        };
        self.meta.set_dims(length, width);
        let columns: Vec<usize> = (c.jstart..c.jstart + width).collect();
        gather_metadata(&self.meta, self.source.as_ref(), &columns)?;
        self.meta
            .set_sizes(window_sizes(self.source.sizes(), sw, c.jstart, width))?;
        debug!(istart, length, jstart = c.jstart, width, "built SubVMatrix");
        Ok(())
    }
}

fn check_fraction(name: &str, f: f64) -> VMatResult<()> {
    if !(0.0..=1.0).contains(&f) {
        return Err(VMatError::config(format!("{} must lie in [0, 1], got {}", name, f)));
    }
    Ok(())
}

/// Role sizes of the column window `[jstart, jstart+width)` of a source
/// whose own partition is `src`.
///
/// A full-width window keeps the source's sizes; a narrower one takes its
/// overlap with each role segment in turn. Without a complete source
/// partition every column is input.
pub fn window_sizes(src: RoleSizes, source_width: usize, jstart: usize, width: usize) -> RoleSizes {
    if !src.is_complete() || src.validate(source_width).is_err() {
        return RoleSizes::all_input(width);
    }
    if jstart == 0 && width == source_width {
        return src;
    }
    let bounds = [
        src.inputsize.unwrap_or(0),
        src.targetsize.unwrap_or(0),
        src.weightsize.unwrap_or(0),
        src.extrasize.unwrap_or(0),
    ];
    let (lo, hi) = (jstart, jstart + width);
    let mut out = [0usize; 4];
    let mut seg_start = 0;
    for (k, len) in bounds.iter().enumerate() {
        let seg_end = seg_start + len;
        let a = lo.max(seg_start);
        let b = hi.min(seg_end);
        out[k] = b.saturating_sub(a);
        seg_start = seg_end;
    }
    RoleSizes::new(out[0], out[1], out[2], out[3])
}

impl VMatrix for SubVMatrix {
    fn meta(&self) -> &VMatMeta {
        &self.meta
    }

    fn class_name(&self) -> &'static str {
        "SubVMatrix"
    }

    fn get(&self, i: usize, j: usize) -> VMatResult<f64> {
        self.meta.check(i, j)?;
        let w = *self.window.read();
        self.source.get(i + w.istart, j + w.jstart)
    }

    fn get_sub_row(&self, i: usize, j: usize, buf: &mut [f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, buf.len())?;
        let w = *self.window.read();
        self.source.get_sub_row(i + w.istart, j + w.jstart, buf)
    }

    fn put(&self, i: usize, j: usize, v: f64) -> VMatResult<()> {
        self.meta.check(i, j)?;
        let w = *self.window.read();
        self.source.put(i + w.istart, j + w.jstart, v)
    }

    fn put_sub_row(&self, i: usize, j: usize, values: &[f64]) -> VMatResult<()> {
        self.meta.check_span(i, j, values.len())?;
        let w = *self.window.read();
        self.source.put_sub_row(i + w.istart, j + w.jstart, values)
    }

    fn dot(&self, i1: usize, i2: usize, inputsize: usize) -> VMatResult<f64> {
        let w = *self.window.read();
        if w.jstart != 0 {
            return generic_dot(self, i1, i2, inputsize);
        }
        self.meta.check_span(i1, 0, inputsize)?;
        self.meta.check_span(i2, 0, inputsize)?;
        self.source.dot(i1 + w.istart, i2 + w.istart, inputsize)
    }

    fn dot_vec(&self, i: usize, v: &[f64]) -> VMatResult<f64> {
        let w = *self.window.read();
        if w.jstart != 0 {
            return generic_dot_vec(self, i, v);
        }
        self.meta.check_span(i, 0, v.len())?;
        self.source.dot_vec(i + w.istart, v)
    }

    fn reset_dimensions(&self) -> VMatResult<()> {
        self.build()
    }
}
