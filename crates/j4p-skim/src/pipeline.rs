//! Stage chain, parallel driver and the top-level skim entry point.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use j4p_core::{Dataset, Error, Event, Result, SkimRecord};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::SkimConfig;
use crate::cutflow::{CutRegistry, Cutflow, CutflowEntry};
use crate::lumi::{GoldenJson, LumiFilter};
use crate::observables::compute_observables;
use crate::output::{OutputMaterializer, OutputPaths};
use crate::quality::JetQualityFilter;
use crate::selection::{Selection, TagProbeSelector};
use crate::source::{Chunk, ColumnPlan, RecordSource, SourceOptions};
use crate::stage::EventFilter;
use crate::trigger::{FlagFilter, TriggerFilter};

/// Ordered stages of one skim, fixed at construction.
pub struct SkimPipeline {
    plan: ColumnPlan,
    /// Stages before the tag/probe selection (lumi mask, jet quality).
    pre: Vec<Box<dyn EventFilter>>,
    selector: TagProbeSelector,
    /// Stages after the observables (trigger, flags).
    post: Vec<Box<dyn EventFilter>>,
    registry: CutRegistry,
}

impl SkimPipeline {
    /// Build the chain; stages are declared on the cutflow in evaluation order.
    pub fn new(
        dataset: Dataset,
        triggers: &[String],
        golden: Option<Arc<GoldenJson>>,
        tight_jet_id: i32,
    ) -> Self {
        let mut registry = CutRegistry::new();

        let mut pre: Vec<Box<dyn EventFilter>> = Vec::new();
        if let Some(mask) = golden {
            pre.push(Box::new(LumiFilter::new(mask, &mut registry)));
        }
        pre.push(Box::new(JetQualityFilter::new(tight_jet_id, &mut registry)));

        let selector = TagProbeSelector::new(dataset, &mut registry);

        let post: Vec<Box<dyn EventFilter>> = vec![
            Box::new(TriggerFilter::new(triggers, &mut registry)),
            Box::new(FlagFilter::new(&mut registry)),
        ];

        Self { plan: ColumnPlan::new(dataset, triggers), pre, selector, post, registry }
    }

    /// Build from a validated config, loading the golden JSON when one is set.
    pub fn from_config(cfg: &SkimConfig) -> Result<Self> {
        let golden =
            cfg.golden_json.as_deref().map(GoldenJson::from_path).transpose()?.map(Arc::new);
        if golden.is_none() && !cfg.is_mc {
            tracing::warn!("no golden JSON given for data; lumi sections are not filtered");
        }
        Ok(Self::new(cfg.dataset, &cfg.triggers, golden, cfg.tight_jet_id))
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }

    pub fn dataset(&self) -> Dataset {
        self.selector.dataset()
    }

    /// Declared cutflow stages, in order.
    pub fn cut_names(&self) -> &[String] {
        self.registry.names()
    }

    /// Zeroed accumulator for this pipeline's stages.
    pub fn new_cutflow(&self) -> Cutflow {
        self.registry.cutflow()
    }

    /// Run one event through every stage; `None` if any stage drops it.
    pub fn process_event(&self, mut event: Event, cutflow: &mut Cutflow) -> Option<SkimRecord> {
        for stage in &self.pre {
            if !stage.apply(&mut event, cutflow) {
                return None;
            }
        }

        let tp = self.selector.select(&event, cutflow)?;
        let observables = compute_observables(&tp, &event.met);

        for stage in &self.post {
            if !stage.apply(&mut event, cutflow) {
                return None;
            }
        }

        Some(SkimRecord {
            run: event.run,
            luminosity_block: event.luminosity_block,
            event: event.event,
            n_jet: event.jets.len() as u32,
            met: event.met,
            tag: tp.tag,
            probe: tp.probe,
            activity: tp.activity,
            observables,
            triggers: event.triggers,
            flags: event.flags,
        })
    }

    pub fn process_events(
        &self,
        events: impl IntoIterator<Item = Event>,
        cutflow: &mut Cutflow,
    ) -> Vec<SkimRecord> {
        events.into_iter().filter_map(|e| self.process_event(e, cutflow)).collect()
    }

    /// Decode and process one chunk with its own cutflow.
    pub fn process_chunk(&self, chunk: &Chunk) -> Result<(Vec<SkimRecord>, Cutflow)> {
        let events = self.plan.decode(&chunk.batch, &chunk.partition)?;
        let mut cutflow = self.new_cutflow();
        let records = self.process_events(events, &mut cutflow);
        Ok((records, cutflow))
    }

    /// Process every chunk of `source` in parallel on the current rayon pool.
    ///
    /// Chunks are decoded as workers pull them and dropped once processed;
    /// only the selected records and one cutflow per chunk are kept.
    pub fn run(&self, source: &RecordSource) -> Result<SkimOutput> {
        let mut parts: Vec<(usize, Vec<SkimRecord>, Cutflow)> = source
            .chunks()
            .enumerate()
            .par_bridge()
            .map(|(index, chunk)| -> Result<(usize, Vec<SkimRecord>, Cutflow)> {
                let (records, cutflow) = self.process_chunk(&chunk?)?;
                Ok((index, records, cutflow))
            })
            .collect::<Result<_>>()?;
        // workers finish chunks in any order
        parts.sort_unstable_by_key(|(index, ..)| *index);
        tracing::debug!(chunks = parts.len(), "processed");

        let mut cutflow = self.new_cutflow();
        let mut records = Vec::with_capacity(parts.iter().map(|(_, r, _)| r.len()).sum());
        for (_, r, cf) in parts {
            cutflow.merge(&cf)?;
            records.extend(r);
        }

        let runs_schema = source
            .runs_schema()
            .ok_or_else(|| Error::Input("record source has no partitions".into()))?;
        Ok(SkimOutput { records, runs_schema, runs: source.runs(), cutflow })
    }
}

/// Everything a run produced, before it is written.
#[derive(Debug, Clone)]
pub struct SkimOutput {
    pub records: Vec<SkimRecord>,
    pub runs_schema: SchemaRef,
    pub runs: Vec<RecordBatch>,
    pub cutflow: Cutflow,
}

/// Result of [`run_skim`].
#[derive(Debug, Clone, Serialize)]
pub struct SkimSummary {
    pub output_dir: PathBuf,
    pub files: OutputPaths,
    pub input_partitions: usize,
    pub input_events: usize,
    pub selected_events: usize,
    pub cutflow: Vec<CutflowEntry>,
}

/// Validate `cfg`, skim every input and write the outputs.
pub fn run_skim(cfg: &SkimConfig) -> Result<SkimSummary> {
    cfg.validate()?;
    let pipeline = SkimPipeline::from_config(cfg)?;
    tracing::info!(dataset = %cfg.dataset, stages = pipeline.cut_names().len(), "pipeline built");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.threads)
        .build()
        .map_err(|e| Error::Config(format!("cannot build thread pool: {e}")))?;

    let (source, output) = pool.install(|| -> Result<_> {
        let opts = SourceOptions::from_config(cfg);
        let source = RecordSource::open(&cfg.files, pipeline.plan(), &opts)?;
        let output = pipeline.run(&source)?;
        Ok((source, output))
    })?;

    let materializer = OutputMaterializer::new(cfg.output_dir(), &cfg.triggers);
    let files = materializer.write(
        &output.records,
        output.runs_schema.clone(),
        &output.runs,
        &output.cutflow,
    )?;

    let cutflow = output.cutflow.entries();
    for e in &cutflow {
        tracing::info!(
            stage = %e.name,
            pass = e.pass,
            all = e.all,
            eff = %format!("{:.2}%", 100.0 * e.eff),
            cumulative = %format!("{:.2}%", 100.0 * e.cumulative_eff),
            "cutflow"
        );
    }

    Ok(SkimSummary {
        output_dir: materializer.dir().to_path_buf(),
        files,
        input_partitions: source.n_partitions(),
        input_events: source.n_events(),
        selected_events: output.records.len(),
        cutflow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::testutil::{event_with_jets, jets};
    use crate::trigger::MANDATORY_FLAGS;
    use approx::assert_relative_eq;

    fn dijet_event(run: u32, lumi: u32, ids: &[i32]) -> Event {
        let n = ids.len();
        let mut j = jets(&[50.0, 48.0, 10.0][..n], &[0.5, 1.8, 0.2][..n], &[0.0, 3.0, 1.0][..n]);
        j.jet_id = ids.to_vec();
        let mut e = event_with_jets(j);
        e.run = run;
        e.luminosity_block = lumi;
        e.triggers = vec![true];
        e.flags = vec![true; MANDATORY_FLAGS.len()];
        e
    }

    fn pipeline(golden: Option<&str>) -> SkimPipeline {
        let mask = golden.map(|g| Arc::new(GoldenJson::from_json_str(g).unwrap()));
        SkimPipeline::new(Dataset::Dijet, &["HLT_PFJet40".to_string()], mask, 6)
    }

    #[test]
    fn stages_are_declared_in_evaluation_order() {
        let p = pipeline(Some(r#"{"1": [[1, 10]]}"#));
        assert_eq!(
            p.cut_names(),
            [
                "Golden JSON",
                "nJet > 0",
                "nJet > 1",
                "One jet in barrel",
                "alpha < 1.0",
                "1.3 > pT1/pT2 > 0.7",
                "HLT_PFJet40",
                MANDATORY_FLAGS.join(" && ").as_str(),
            ]
        );
        assert_eq!(pipeline(None).cut_names()[0], "nJet > 0");
    }

    #[test]
    fn surviving_event_carries_observables() {
        let p = pipeline(Some(r#"{"1": [[1, 10]]}"#));
        let mut cf = p.new_cutflow();
        let rec = p.process_event(dijet_event(1, 5, &[6, 6, 6]), &mut cf).unwrap();

        assert_eq!(rec.n_jet, 3);
        assert_eq!(rec.tag.label, 0);
        assert_relative_eq!(rec.observables.db_ratio, 0.96);
        assert_eq!(rec.observables.weight, 1.0);
        assert_eq!(cf.total_passed(), 1);
    }

    #[test]
    fn dropped_events_do_not_reach_later_stages() {
        let p = pipeline(Some(r#"{"1": [[1, 10]]}"#));
        let mut cf = p.new_cutflow();
        let events = vec![
            dijet_event(1, 5, &[6, 6, 6]),
            dijet_event(1, 15, &[6, 6, 6]),
            dijet_event(2, 1, &[6, 6, 6]),
            // one tight jet left: fails "nJet > 1"
            dijet_event(1, 2, &[6, 2, 0]),
        ];
        let mut untriggered = dijet_event(1, 3, &[6, 6, 6]);
        untriggered.triggers = vec![false];

        let mut all = events;
        all.push(untriggered);
        let out = p.process_events(all, &mut cf);
        assert_eq!(out.len(), 1);

        let e = cf.entries();
        assert_eq!((e[0].pass, e[0].all), (3, 5));
        assert_eq!((e[1].pass, e[1].all), (3, 3));
        assert_eq!((e[2].pass, e[2].all), (2, 3));
        assert_eq!((e[6].pass, e[6].all), (1, 2));
        assert_eq!(e[7].all, 1);
        for w in e.windows(2) {
            assert!(w[1].cumulative_eff <= w[0].cumulative_eff);
        }
    }

    #[test]
    fn quality_filter_narrows_the_jets_seen_by_the_selection() {
        let p = pipeline(None);
        let mut cf = p.new_cutflow();
        let rec = p.process_event(dijet_event(1, 1, &[6, 6, 0]), &mut cf).unwrap();
        assert_eq!(rec.n_jet, 2);
        assert!(rec.activity.pt.abs() < 1e-9);
    }
}
