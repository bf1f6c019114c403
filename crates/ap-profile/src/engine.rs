//! Single-pass profile building over a [`DataSource`].

use std::borrow::Cow;
use std::ops::Range;

use ap_core::{DataSource, Error, Result};
use rayon::prelude::*;

use crate::binning::{BinAxis, BinScale};
use crate::profile::{FieldValues, Profile};
use crate::request::ProfileRequest;

/// Build a profile of `request.fields` binned by `request.bin_fields`.
///
/// Elements that cannot be binned (outside an explicit range, non-finite, or
/// non-positive on a log axis) are dropped and counted, never an error.
pub fn create_profile<S>(source: &S, request: &ProfileRequest) -> Result<Profile>
where
    S: DataSource + ?Sized,
{
    let plan = request.plan()?;
    let n = source.len();

    let bin_cols = fetch(source, &request.bin_fields, n)?;
    let mut axes = Vec::with_capacity(bin_cols.len());
    for ((name, col), &n_bins) in request.bin_fields.iter().zip(&bin_cols).zip(&plan.n_bins) {
        let scale = request.log_scale.scale_for(name, source.field_info(name).as_ref());
        let axis = match request.ranges.get(name) {
            Some(&[lo, hi]) => BinAxis::new(name.as_str(), scale, n_bins, lo, hi)?,
            None => {
                let (lo, hi) = auto_range(col, scale, n_bins);
                BinAxis::from_scaled_range(name.as_str(), scale, n_bins, lo, hi)?
            }
        };
        axes.push(axis);
    }

    let value_cols = fetch(source, &plan.fields, n)?;
    let weight_col = match &request.weight_field {
        Some(w) => fetch(source, std::slice::from_ref(w), n)?.pop(),
        None => None,
    };

    let columns = Columns {
        axes: &axes,
        bins: bin_cols.iter().map(|c| &**c).collect(),
        values: value_cols.iter().map(|c| &**c).collect(),
        weights: weight_col.as_deref(),
    };
    let n_cells: usize = axes.iter().map(BinAxis::n_bins).product();

    let acc = match request.chunk_size {
        Some(chunk) if n > chunk => {
            let starts: Vec<usize> = (0..n).step_by(chunk).collect();
            let partials: Vec<Accumulator> = starts
                .into_par_iter()
                .map(|start| {
                    let mut part = Accumulator::new(n_cells, columns.values.len());
                    part.fill(&columns, start..(start + chunk).min(n));
                    part
                })
                .collect();
            let mut total = Accumulator::new(n_cells, columns.values.len());
            for part in partials {
                total.merge(part);
            }
            total
        }
        _ => {
            let mut acc = Accumulator::new(n_cells, columns.values.len());
            acc.fill(&columns, 0..n);
            acc
        }
    };

    let mut profile = acc.finish(axes, plan.fields, request.weight_field.clone());
    profile.accumulate(&plan.accumulate)?;

    log::debug!(
        "profile {:?} by {:?}: {} elements, {} bins, {} dropped",
        profile.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        request.bin_fields,
        n,
        n_cells,
        profile.dropped
    );
    Ok(profile)
}

fn fetch<'a, S>(source: &'a S, names: &[String], n: usize) -> Result<Vec<Cow<'a, [f64]>>>
where
    S: DataSource + ?Sized,
{
    names
        .iter()
        .map(|name| {
            let col = source.field(name)?;
            if col.len() != n {
                return Err(Error::Configuration(format!(
                    "field '{name}' has {} values, source has {n} elements",
                    col.len()
                )));
            }
            Ok(col)
        })
        .collect()
}

/// `[min, max]` of the representable values in scaled space.
///
/// `[0, 1]` when nothing is representable. A spread too small to hold
/// `n_bins` distinct edges is widened about its midpoint by at least 0.5 on
/// each side, so a single value `v` gives `[v - 0.5, v + 0.5]`.
fn auto_range(values: &[f64], scale: BinScale, n_bins: usize) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .map(|&v| scale.forward(v))
        .filter(|s| s.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let min_width = lo.abs().max(hi.abs()) * n_bins as f64 * 8.0 * f64::EPSILON;
    if hi - lo > min_width {
        return (lo, hi);
    }
    let mid = 0.5 * lo + 0.5 * hi;
    let half = min_width.max(0.5);
    (mid - half, mid + half)
}

struct Columns<'a> {
    axes: &'a [BinAxis],
    bins: Vec<&'a [f64]>,
    values: Vec<&'a [f64]>,
    weights: Option<&'a [f64]>,
}

impl Columns<'_> {
    #[inline]
    fn locate(&self, i: usize) -> Option<usize> {
        let mut flat = 0;
        for (axis, col) in self.axes.iter().zip(&self.bins) {
            flat = flat * axis.n_bins() + axis.locate(col[i])?;
        }
        Some(flat)
    }
}

/// Partial sums over a range of elements.
#[derive(Debug, Clone)]
struct Accumulator {
    counts: Vec<u64>,
    weight_sums: Vec<f64>,
    sums: Vec<Vec<f64>>,
    dropped: u64,
}

impl Accumulator {
    fn new(n_cells: usize, n_fields: usize) -> Self {
        Self {
            counts: vec![0; n_cells],
            weight_sums: vec![0.0; n_cells],
            sums: vec![vec![0.0; n_cells]; n_fields],
            dropped: 0,
        }
    }

    fn fill(&mut self, cols: &Columns<'_>, range: Range<usize>) {
        for i in range {
            let Some(bin) = cols.locate(i) else {
                self.dropped += 1;
                continue;
            };
            let w = cols.weights.map_or(1.0, |w| w[i]);
            self.counts[bin] += 1;
            self.weight_sums[bin] += w;
            for (sum, col) in self.sums.iter_mut().zip(&cols.values) {
                sum[bin] += col[i] * w;
            }
        }
    }

    fn merge(&mut self, other: Accumulator) {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        for (a, b) in self.weight_sums.iter_mut().zip(other.weight_sums) {
            *a += b;
        }
        for (sa, sb) in self.sums.iter_mut().zip(other.sums) {
            for (a, b) in sa.iter_mut().zip(sb) {
                *a += b;
            }
        }
        self.dropped += other.dropped;
    }

    fn finish(
        self,
        axes: Vec<BinAxis>,
        names: Vec<String>,
        weight_field: Option<String>,
    ) -> Profile {
        let weighted = weight_field.is_some();
        let used: Vec<bool> = self
            .counts
            .iter()
            .zip(&self.weight_sums)
            .map(|(&c, &w)| c > 0 && (!weighted || w != 0.0))
            .collect();
        let fields = names
            .into_iter()
            .zip(self.sums)
            .map(|(name, sums)| {
                let values = if weighted {
                    sums.iter()
                        .zip(&self.weight_sums)
                        .map(|(&s, &w)| if w != 0.0 { s / w } else { 0.0 })
                        .collect()
                } else {
                    sums
                };
                FieldValues { name, values }
            })
            .collect();
        let ndim = axes.len();
        Profile {
            axes,
            fields,
            weight_field,
            counts: self.counts,
            weight_sums: self.weight_sums,
            used,
            dropped: self.dropped,
            accumulated: vec![false; ndim],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn source(cols: &[(&str, Vec<f64>)]) -> HashMap<String, Vec<f64>> {
        cols.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / (n - 1) as f64).collect()
    }

    #[test]
    fn test_every_element_binned_or_dropped() {
        let x: Vec<f64> = (0..100).map(|i| i as f64 * 0.1 - 2.0).collect();
        let src = source(&[("x", x), ("m", vec![1.0; 100])]);
        let req = ProfileRequest::new(["x"], ["m"]).n_bins(7).range("x", 0.0, 5.0);
        let p = create_profile(&src, &req).unwrap();
        let binned: u64 = p.counts().iter().sum();
        assert_eq!(binned + p.dropped(), 100);
        assert!(p.dropped() > 0);
    }

    #[test]
    fn test_unweighted_ones_sum_to_counts() {
        let src = source(&[("x", ramp(1000)), ("one", vec![1.0; 1000])]);
        let p = create_profile(&src, &ProfileRequest::new(["x"], ["one"]).n_bins(13)).unwrap();
        assert_eq!(p.dropped(), 0);
        for (v, &c) in p.field("one").unwrap().iter().zip(p.counts()) {
            assert_eq!(*v, c as f64);
        }
        assert_eq!(p.counts().iter().sum::<u64>(), 1000);
    }

    #[test]
    fn test_weighted_mean_of_constant() {
        let n = 257;
        let w: Vec<f64> = (0..n).map(|i| 0.5 + (i % 7) as f64).collect();
        let src = source(&[("x", ramp(n)), ("t", vec![42.5; n]), ("w", w)]);
        let req = ProfileRequest::new(["x"], ["t"]).n_bins(10).weight("w");
        let p = create_profile(&src, &req).unwrap();
        assert_eq!(p.weight_field(), Some("w"));
        for (v, &used) in p.field("t").unwrap().iter().zip(p.used()) {
            assert!(used);
            assert_relative_eq!(*v, 42.5, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_zero_weight_bin() {
        let src = source(&[
            ("x", vec![0.1, 0.2, 0.8, 0.9]),
            ("t", vec![5.0, 7.0, 3.0, 3.0]),
            ("w", vec![1.0, 3.0, 0.0, 0.0]),
        ]);
        let req = ProfileRequest::new(["x"], ["t"]).n_bins(2).range("x", 0.0, 1.0).weight("w");
        let p = create_profile(&src, &req).unwrap();
        let t = p.field("t").unwrap();
        assert_relative_eq!(t[0], 6.5);
        assert_eq!(t[1], 0.0);
        assert_eq!(p.used(), &[true, false]);
        assert_eq!(p.counts(), &[2, 2]);
    }

    #[test]
    fn test_empty_bins_unused() {
        let src = source(&[("x", vec![0.1, 0.9]), ("m", vec![1.0, 2.0])]);
        let req = ProfileRequest::new(["x"], ["m"]).n_bins(4).range("x", 0.0, 1.0);
        let p = create_profile(&src, &req).unwrap();
        assert_eq!(p.used(), &[true, false, false, true]);
        assert_eq!(p.field("m").unwrap(), &[1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_accumulation_monotone_and_total() {
        let n = 500;
        let m: Vec<f64> = (0..n).map(|i| 1.0 + (i % 5) as f64).collect();
        let total: f64 = m.iter().sum();
        let src = source(&[("r", ramp(n)), ("m", m)]);
        let req = ProfileRequest::new(["r"], ["m"]).n_bins(16).accumulate(true);
        let p = create_profile(&src, &req).unwrap();
        let v = p.field("m").unwrap();
        assert!(v.windows(2).all(|w| w[0] <= w[1]));
        assert_relative_eq!(v[15], total, max_relative = 1e-12);
        assert_eq!(p.accumulated(), &[true]);
    }

    #[test]
    fn test_accumulation_is_idempotent() {
        let src = source(&[("r", ramp(50)), ("m", vec![1.0; 50])]);
        let req = ProfileRequest::new(["r"], ["m"]).n_bins(5).accumulate(true);
        let mut p = create_profile(&src, &req).unwrap();
        let before = p.field("m").unwrap().to_vec();
        p.accumulate(&[true]).unwrap();
        assert_eq!(p.field("m").unwrap(), before.as_slice());
        assert!(p.accumulate(&[true, true]).is_err());
    }

    #[test]
    fn test_bin_field_count_errors() {
        let src = source(&[("x", vec![1.0]), ("y", vec![1.0]), ("z", vec![1.0])]);
        let none: [&str; 0] = [];
        let e = create_profile(&src, &ProfileRequest::new(none, ["x"])).unwrap_err();
        assert!(matches!(e, Error::Configuration(_)));
        let e = create_profile(&src, &ProfileRequest::new(["x", "y", "z"], ["x"])).unwrap_err();
        assert!(matches!(e, Error::Dimensionality(3)));
    }

    #[test]
    fn test_missing_fields() {
        let src = source(&[("x", vec![1.0, 2.0])]);
        let e = create_profile(&src, &ProfileRequest::new(["x"], ["nope"])).unwrap_err();
        assert!(matches!(e, Error::FieldNotFound(ref f) if f == "nope"));
        let e = create_profile(&src, &ProfileRequest::new(["x"], ["x"]).weight("w")).unwrap_err();
        assert!(matches!(e, Error::FieldNotFound(ref f) if f == "w"));
        let e = create_profile(&src, &ProfileRequest::new(["q"], ["x"])).unwrap_err();
        assert!(matches!(e, Error::FieldNotFound(_)));
    }

    #[test]
    fn test_auto_range_degenerate_and_empty() {
        let src = source(&[("x", vec![3.0, 3.0]), ("m", vec![1.0, 1.0])]);
        let p = create_profile(&src, &ProfileRequest::new(["x"], ["m"]).n_bins(2)).unwrap();
        assert_eq!(p.bin_edges(0), &[2.5, 3.0, 3.5]);
        assert_eq!(p.counts(), &[0, 2]);

        let src = source(&[("x", vec![]), ("m", vec![])]);
        let p = create_profile(&src, &ProfileRequest::new(["x"], ["m"]).n_bins(2)).unwrap();
        assert_eq!(p.bin_edges(0), &[0.0, 0.5, 1.0]);
        assert_eq!(p.counts(), &[0, 0]);
    }

    #[test]
    fn test_auto_range_widens_near_degenerate_spread() {
        let x = vec![1.0, 1.0 + 4.0 * f64::EPSILON];
        let src = source(&[("x", x), ("m", vec![1.0, 1.0])]);
        let p = create_profile(&src, &ProfileRequest::new(["x"], ["m"]).n_bins(64)).unwrap();
        let e = p.bin_edges(0);
        assert!(e.windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(e[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(e[64], 1.5, max_relative = 1e-12);
        assert_eq!(p.dropped(), 0);
        assert_eq!(p.counts().iter().sum::<u64>(), 2);

        let big = source(&[("x", vec![1e20, 1e20]), ("m", vec![1.0, 1.0])]);
        let p = create_profile(&big, &ProfileRequest::new(["x"], ["m"]).n_bins(64)).unwrap();
        assert!(p.bin_edges(0).windows(2).all(|w| w[0] < w[1]));
        assert_eq!(p.counts().iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_auto_range_spanning_the_float_range() {
        let src = source(&[("x", vec![-1e308, 0.0, 1e308]), ("m", vec![1.0; 3])]);
        let p = create_profile(&src, &ProfileRequest::new(["x"], ["m"]).n_bins(4)).unwrap();
        let e = p.bin_edges(0);
        assert_eq!(e[0], -1e308);
        assert_eq!(e[4], 1e308);
        assert!(e.iter().all(|v| v.is_finite()));
        assert_eq!(p.counts(), &[1, 0, 1, 1]);
    }

    #[test]
    fn test_log_axis_drops_non_positive() {
        let src = source(&[("d", vec![-1.0, 0.0, 1.0, 10.0, 100.0]), ("m", vec![1.0; 5])]);
        let req = ProfileRequest::new(["d"], ["m"]).n_bins(2).log_all(true);
        let p = create_profile(&src, &req).unwrap();
        assert_eq!(p.dropped(), 2);
        assert_eq!(p.counts(), &[1, 2]);
        let e = p.bin_edges(0);
        assert_relative_eq!(e[0], 1.0);
        assert_relative_eq!(e[1], 10.0, max_relative = 1e-12);
        assert_relative_eq!(e[2], 100.0, max_relative = 1e-12);

        let bad = ProfileRequest::new(["d"], ["m"]).log_all(true).range("d", 0.0, 10.0);
        assert!(matches!(create_profile(&src, &bad), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_two_dimensional_layout() {
        let src = source(&[
            ("x", vec![0.1, 0.1, 0.9, 0.9]),
            ("y", vec![0.1, 0.9, 0.1, 0.9]),
            ("m", vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let req = ProfileRequest::new(["x", "y"], ["m"])
            .n_bins_per_axis(vec![2, 3])
            .range("x", 0.0, 1.0)
            .range("y", 0.0, 1.0);
        let p = create_profile(&src, &req).unwrap();
        assert_eq!(p.shape(), vec![2, 3]);
        assert_eq!(p.field("m").unwrap(), &[1.0, 0.0, 2.0, 3.0, 0.0, 4.0]);
        assert_eq!(p.value("m", &[1, 2]), Some(4.0));
        assert_eq!(p.value("m", &[2, 0]), None);

        let mut acc = p.clone();
        acc.accumulate(&[true, true]).unwrap();
        assert_eq!(acc.field("m").unwrap(), &[1.0, 1.0, 3.0, 4.0, 4.0, 10.0]);
        assert_eq!(acc.counts(), p.counts());
    }

    #[test]
    fn test_deterministic_and_chunked() {
        let n = 10_007;
        let x: Vec<f64> = (0..n).map(|i| ((i * 7919) % n) as f64 / n as f64).collect();
        let y: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        let w: Vec<f64> = (0..n).map(|i| 0.1 + (i % 13) as f64).collect();
        let src = source(&[("x", x), ("y", y), ("w", w)]);
        let req = ProfileRequest::new(["x"], ["y"]).n_bins(32).weight("w");

        let a = create_profile(&src, &req).unwrap();
        let b = create_profile(&src, &req).unwrap();
        assert_eq!(a, b);

        let chunked = req.clone().chunk_size(1000);
        let c1 = create_profile(&src, &chunked).unwrap();
        let c2 = create_profile(&src, &chunked).unwrap();
        assert_eq!(c1.field("y").unwrap(), c2.field("y").unwrap());
        assert_eq!(c1.counts(), a.counts());
        assert_eq!(c1.dropped(), a.dropped());
        for (s, c) in a.field("y").unwrap().iter().zip(c1.field("y").unwrap()) {
            assert_relative_eq!(*s, *c, epsilon = 1e-9, max_relative = 1e-9);
        }
    }
}
