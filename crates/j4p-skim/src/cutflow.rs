//! Per-stage pass/fail accounting.
//!
//! Stages are declared once on a [`CutRegistry`] while the pipeline is built;
//! every declaration returns a [`CutId`] the stage keeps. Each parallel chunk
//! then counts into its own zeroed [`Cutflow`], and chunk cutflows are merged
//! by element-wise addition, so totals do not depend on evaluation order.

use std::sync::Arc;

use j4p_core::{Error, Result};
use serde::Serialize;

/// Index of a declared cutflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CutId(usize);

/// Ordered list of declared stage names.
#[derive(Debug, Clone, Default)]
pub struct CutRegistry {
    names: Vec<String>,
}

impl CutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stage; order of declaration is the report order.
    pub fn declare(&mut self, name: impl Into<String>) -> CutId {
        self.names.push(name.into());
        CutId(self.names.len() - 1)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Fresh, zeroed accumulator for the declared stages.
    pub fn cutflow(&self) -> Cutflow {
        Cutflow::new(self.names.clone())
    }
}

/// Pass/total counters for every declared stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutflow {
    names: Arc<[String]>,
    pass: Vec<u64>,
    all: Vec<u64>,
}

impl Cutflow {
    pub fn new(names: Vec<String>) -> Self {
        let n = names.len();
        Self { names: names.into(), pass: vec![0; n], all: vec![0; n] }
    }

    /// Count one event entering `id`; returns `passed` so calls can gate control flow.
    #[inline]
    pub fn check(&mut self, id: CutId, passed: bool) -> bool {
        self.all[id.0] += 1;
        if passed {
            self.pass[id.0] += 1;
        }
        passed
    }

    /// Like [`Cutflow::check`], passing when `value` is `Some`; hands `value` back.
    #[inline]
    pub fn check_some<T>(&mut self, id: CutId, value: Option<T>) -> Option<T> {
        self.check(id, value.is_some());
        value
    }

    /// Add another accumulator built from the same registry.
    pub fn merge(&mut self, other: &Cutflow) -> Result<()> {
        if self.names != other.names {
            return Err(Error::Validation(format!(
                "cannot merge cutflows with different stages: {:?} vs {:?}",
                self.names, other.names
            )));
        }
        for (a, b) in self.pass.iter_mut().zip(&other.pass) {
            *a += b;
        }
        for (a, b) in self.all.iter_mut().zip(&other.all) {
            *a += b;
        }
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Events entering the first declared stage.
    pub fn total_entered(&self) -> u64 {
        self.all.first().copied().unwrap_or(0)
    }

    /// Events passing the last declared stage.
    pub fn total_passed(&self) -> u64 {
        self.pass.last().copied().unwrap_or(0)
    }

    /// Report rows in declaration order. Efficiencies are fractions in `[0, 1]`.
    pub fn entries(&self) -> Vec<CutflowEntry> {
        let first = self.total_entered();
        self.names
            .iter()
            .zip(self.pass.iter().zip(&self.all))
            .map(|(name, (&pass, &all))| CutflowEntry {
                name: name.clone(),
                pass,
                all,
                eff: ratio(pass, all),
                cumulative_eff: ratio(pass, first),
            })
            .collect()
    }

    /// The four aligned distributions written next to the skimmed events.
    pub fn histograms(&self) -> CutflowHistograms {
        let entries = self.entries();
        let labels: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let dist = |name: &str, f: &dyn Fn(&CutflowEntry) -> f64| LabeledDistribution {
            name: name.to_string(),
            labels: labels.clone(),
            values: entries.iter().map(f).collect(),
        };
        CutflowHistograms {
            pass: dist("pass", &|e: &CutflowEntry| e.pass as f64),
            all: dist("all", &|e: &CutflowEntry| e.all as f64),
            eff: dist("eff", &|e: &CutflowEntry| 100.0 * e.eff),
            cumulative_eff: dist("cumulative_eff", &|e: &CutflowEntry| 100.0 * e.cumulative_eff),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// One stage of the cutflow report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutflowEntry {
    pub name: String,
    pub pass: u64,
    pub all: u64,
    pub eff: f64,
    pub cumulative_eff: f64,
}

/// Frequency distribution with one labelled bin per stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledDistribution {
    pub name: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// `pass`, `all`, `eff` and `cumulative_eff` distributions (efficiencies in percent).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutflowHistograms {
    pub pass: LabeledDistribution,
    pub all: LabeledDistribution,
    pub eff: LabeledDistribution,
    pub cumulative_eff: LabeledDistribution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn three_stage() -> (CutRegistry, [CutId; 3]) {
        let mut reg = CutRegistry::new();
        let a = reg.declare("a");
        let b = reg.declare("b");
        let c = reg.declare("c");
        (reg, [a, b, c])
    }

    /// Run an event through stages in order, stopping at the first failure.
    fn feed(cf: &mut Cutflow, ids: &[CutId], outcome: &[bool]) {
        for (id, &ok) in ids.iter().zip(outcome) {
            if !cf.check(*id, ok) {
                break;
            }
        }
    }

    #[test]
    fn efficiencies_follow_declaration_order() {
        let (reg, ids) = three_stage();
        let mut cf = reg.cutflow();
        feed(&mut cf, &ids, &[true, true, true]);
        feed(&mut cf, &ids, &[true, false, true]);
        feed(&mut cf, &ids, &[false, true, true]);
        feed(&mut cf, &ids, &[true, true, false]);

        let e = cf.entries();
        assert_eq!(e.iter().map(|x| x.name.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!((e[0].pass, e[0].all), (3, 4));
        assert_eq!((e[1].pass, e[1].all), (2, 3));
        assert_eq!((e[2].pass, e[2].all), (1, 2));
        assert_relative_eq!(e[0].cumulative_eff, e[0].eff);
        assert_relative_eq!(e[2].cumulative_eff, 0.25);
        assert_eq!(cf.total_entered(), 4);
        assert_eq!(cf.total_passed(), 1);
    }

    #[test]
    fn empty_cutflow_has_zero_efficiencies() {
        let (reg, _) = three_stage();
        let cf = reg.cutflow();
        assert!(cf.entries().iter().all(|e| e.eff == 0.0 && e.cumulative_eff == 0.0));
    }

    #[test]
    fn histograms_are_aligned_and_in_percent() {
        let (reg, ids) = three_stage();
        let mut cf = reg.cutflow();
        feed(&mut cf, &ids, &[true, true, false]);
        feed(&mut cf, &ids, &[true, false, false]);
        let h = cf.histograms();
        assert_eq!(h.pass.labels, vec!["a", "b", "c"]);
        assert_eq!(h.pass.values, vec![2.0, 1.0, 0.0]);
        assert_eq!(h.all.values, vec![2.0, 2.0, 1.0]);
        assert_eq!(h.eff.values, vec![100.0, 50.0, 0.0]);
        assert_eq!(h.cumulative_eff.values, vec![100.0, 50.0, 0.0]);
        let json = serde_json::to_value(&h).unwrap();
        assert!(json.get("cumulative_eff").is_some());
    }

    #[test]
    fn merge_rejects_foreign_stages() {
        let (reg, _) = three_stage();
        let mut other = CutRegistry::new();
        other.declare("x");
        let mut cf = reg.cutflow();
        assert!(cf.merge(&other.cutflow()).is_err());
    }

    proptest! {
        #[test]
        fn prop_merge_is_partition_independent(
            outcomes in proptest::collection::vec(proptest::array::uniform3(any::<bool>()), 0..200),
            n_chunks in 1usize..9,
        ) {
            let (reg, ids) = three_stage();

            let mut serial = reg.cutflow();
            for o in &outcomes {
                feed(&mut serial, &ids, o);
            }

            let chunk = outcomes.len().div_ceil(n_chunks).max(1);
            let mut parts: Vec<Cutflow> = outcomes
                .chunks(chunk)
                .map(|c| {
                    let mut cf = reg.cutflow();
                    for o in c {
                        feed(&mut cf, &ids, o);
                    }
                    cf
                })
                .collect();
            parts.reverse();
            let mut merged = reg.cutflow();
            for p in &parts {
                merged.merge(p).unwrap();
            }
            prop_assert_eq!(&merged, &serial);

            let entries = merged.entries();
            for w in entries.windows(2) {
                prop_assert!(w[1].cumulative_eff <= w[0].cumulative_eff);
            }
            if let Some(first) = entries.first() {
                prop_assert_eq!(first.cumulative_eff, first.eff);
            }
        }
    }
}
