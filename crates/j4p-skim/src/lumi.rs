//! Golden run/luminosity-block validity mask.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use j4p_core::{Error, Event, Result};

use crate::cutflow::{CutId, CutRegistry, Cutflow};
use crate::stage::EventFilter;

/// Cutflow stage name of the lumi mask.
pub const GOLDEN_JSON_CUT: &str = "Golden JSON";

/// Certified `[first, last]` luminosity-block intervals per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldenJson {
    runs: HashMap<u32, Vec<(u32, u32)>>,
}

impl GoldenJson {
    /// Parse the `{"<run>": [[lo, hi], ...]}` format.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<Vec<i64>>> =
            serde_json::from_str(text).map_err(|e| Error::LumiMask(e.to_string()))?;

        let mut runs: HashMap<u32, Vec<(u32, u32)>> = HashMap::with_capacity(raw.len());
        for (key, ranges) in raw {
            let run: u32 = key
                .trim()
                .parse()
                .map_err(|_| {
                    Error::LumiMask(format!("run key '{key}' is not an unsigned integer"))
                })?;
            // keys spelled differently ("100", "0100") may name the same run
            let intervals = runs.entry(run).or_default();
            for r in ranges {
                let [lo, hi] = r[..] else {
                    return Err(Error::LumiMask(format!(
                        "run {run}: interval {r:?} must have exactly two elements"
                    )));
                };
                let lo = to_lumi(run, lo)?;
                let hi = to_lumi(run, hi)?;
                if lo > hi {
                    return Err(Error::LumiMask(format!(
                        "run {run}: interval [{lo}, {hi}] is reversed"
                    )));
                }
                intervals.push((lo, hi));
            }
        }
        Ok(Self { runs })
    }

    /// Read and parse a golden JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mask = Self::from_json_str(&text)?;
        tracing::info!(path = %path.display(), runs = mask.n_runs(), "golden JSON loaded");
        Ok(mask)
    }

    /// Inclusive interval check; unknown runs are never valid.
    pub fn is_valid(&self, run: u32, lumi: u32) -> bool {
        self.runs
            .get(&run)
            .is_some_and(|ranges| ranges.iter().any(|&(lo, hi)| lo <= lumi && lumi <= hi))
    }

    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }
}

fn to_lumi(run: u32, v: i64) -> Result<u32> {
    u32::try_from(v)
        .map_err(|_| Error::LumiMask(format!("run {run}: luminosity block {v} out of range")))
}

/// Drops events outside the golden mask.
pub struct LumiFilter {
    mask: Arc<GoldenJson>,
    cut: CutId,
}

impl LumiFilter {
    pub fn new(mask: Arc<GoldenJson>, registry: &mut CutRegistry) -> Self {
        Self { mask, cut: registry.declare(GOLDEN_JSON_CUT) }
    }
}

impl EventFilter for LumiFilter {
    fn name(&self) -> &str {
        GOLDEN_JSON_CUT
    }

    fn apply(&self, event: &mut Event, cutflow: &mut Cutflow) -> bool {
        cutflow.check(self.cut, self.mask.is_valid(event.run, event.luminosity_block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn event(run: u32, lumi: u32) -> Event {
        Event { run, luminosity_block: lumi, ..Default::default() }
    }

    #[test]
    fn inclusive_bounds_and_unknown_runs() {
        let mask = GoldenJson::from_json_str(r#"{"100": [[1, 10]]}"#).unwrap();
        let mut reg = CutRegistry::new();
        let filter = LumiFilter::new(Arc::new(mask), &mut reg);
        let mut cf = reg.cutflow();

        assert!(filter.apply(&mut event(100, 5), &mut cf));
        assert!(filter.apply(&mut event(100, 1), &mut cf));
        assert!(filter.apply(&mut event(100, 10), &mut cf));
        assert!(!filter.apply(&mut event(100, 15), &mut cf));
        assert!(!filter.apply(&mut event(200, 1), &mut cf));

        let e = &cf.entries()[0];
        assert_eq!(e.name, GOLDEN_JSON_CUT);
        assert_eq!((e.pass, e.all), (3, 5));
    }

    #[test]
    fn several_intervals_per_run() {
        let mask = GoldenJson::from_json_str(r#"{"7": [[1, 2], [5, 9]], "8": []}"#).unwrap();
        assert!(mask.is_valid(7, 2));
        assert!(!mask.is_valid(7, 3));
        assert!(mask.is_valid(7, 9));
        assert!(!mask.is_valid(8, 1));
        assert_eq!(mask.n_runs(), 2);
    }

    #[test]
    fn keys_naming_the_same_run_are_merged() {
        let mask = GoldenJson::from_json_str(r#"{"100": [[1, 10]], "0100": [[20, 30]]}"#).unwrap();
        assert_eq!(mask.n_runs(), 1);
        assert!(mask.is_valid(100, 5));
        assert!(mask.is_valid(100, 25));
        assert!(!mask.is_valid(100, 15));
    }

    #[test]
    fn malformed_masks_are_rejected() {
        for bad in [
            r#"{"abc": [[1, 2]]}"#,
            r#"{"1": [[1, 2, 3]]}"#,
            r#"{"1": [[5, 2]]}"#,
            r#"{"1": [[-1, 2]]}"#,
            r#"{"1": "all"}"#,
            r#"[1, 2]"#,
        ] {
            let err = GoldenJson::from_json_str(bad).unwrap_err();
            assert!(matches!(err, Error::LumiMask(_)), "{bad}: {err}");
        }
    }

    proptest! {
        #[test]
        fn prop_filtering_twice_equals_once(
            events in proptest::collection::vec((95u32..105, 0u32..30), 0..100),
        ) {
            let golden = r#"{"100": [[1, 10], [20, 25]], "103": [[0, 0]]}"#;
            let mask = Arc::new(GoldenJson::from_json_str(golden).unwrap());
            let mut reg = CutRegistry::new();
            let filter = LumiFilter::new(mask, &mut reg);
            let mut cf = reg.cutflow();

            let once: Vec<Event> = events
                .iter()
                .map(|&(r, l)| event(r, l))
                .filter(|e| filter.apply(&mut e.clone(), &mut cf))
                .collect();
            let twice: Vec<Event> =
                once.iter().filter(|e| filter.apply(&mut (*e).clone(), &mut cf)).cloned().collect();
            prop_assert_eq!(once, twice);
        }
    }
}
