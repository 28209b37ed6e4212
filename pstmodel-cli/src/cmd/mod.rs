use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::Context;
use log::info;
use pstmodel::alphabet::Alphabet;
use pstmodel::learner::{learn, LearnParams, LearnThresholds};
use pstmodel::model::Model;
use pstmodel::smoothing::{BackoffSmoother, FloorSmoother, ModelProcessor, ProcessorChain};
use pstmodel::spectrum::KmerSpectrum;

use crate::cli::LearnArgs;
use crate::sequences::read_sequences;
use crate::PROGRESS_BAR;

pub(crate) mod describe;
pub(crate) mod generate;
pub(crate) mod score;

impl LearnArgs {
    /// Thresholds from the config file (or the defaults), overridden by the
    /// options given explicitly.
    pub fn thresholds(&self) -> anyhow::Result<LearnThresholds> {
        let mut thresholds = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Could not open {}", path.display()))?;
                LearnThresholds::from_json_reader(BufReader::new(file))?
            }
            None => LearnThresholds::default(),
        };

        if let Some(value) = self.branch_absolute_min {
            thresholds.branch_absolute_min = value;
        }
        if let Some(value) = self.branch_conditional_min {
            thresholds.branch_conditional_min = value;
        }
        if let Some(value) = self.p_ratio_min_max {
            thresholds.p_ratio_min_max = value;
        }
        if let Some(value) = self.max_depth {
            thresholds.max_depth = value;
        }

        Ok(thresholds)
    }

    fn processor(&self) -> ProcessorChain {
        let mut chain = ProcessorChain::new();
        if let Some(factor) = self.backoff_smoothing {
            chain = chain.with(BackoffSmoother::new(factor));
        }
        if let Some(floor) = self.floor {
            chain = chain.with(FloorSmoother::new(floor));
        }

        chain
    }
}

/// Reads the training sequences and learns a model from them.
pub(crate) fn learn_model(args: &LearnArgs) -> anyhow::Result<Model> {
    let thresholds = args.thresholds()?;
    let max_depth = thresholds.max_depth;

    let reader = args.train.as_reader()?;
    PROGRESS_BAR.start_bytes("Reading", reader.length()?.unwrap_or(0));
    info!("Training file: {}", args.train);
    let sequences = read_sequences(reader.into_buf_read(), &*PROGRESS_BAR)
        .context("Could not read the training sequences")?;
    info!("Read {} training sequences", sequences.len());

    PROGRESS_BAR.start_bytes("Counting", 0);
    let data: Vec<&[u8]> = sequences.iter().map(|sequence| sequence.data.as_slice()).collect();
    let spectrum = KmerSpectrum::from_sequences_with_progress(
        Alphabet::nucleotides(),
        max_depth,
        &data,
        &*PROGRESS_BAR,
    );

    PROGRESS_BAR.start_iters("Selecting contexts");
    let params = LearnParams::builder()
        .thresholds(thresholds)
        .automaton(!args.no_automaton)
        .progress_notifier(Arc::new(PROGRESS_BAR.clone()))
        .build();
    let processor = args.processor();
    let processor = if processor.is_empty() {
        None
    } else {
        Some(&processor as &dyn ModelProcessor)
    };

    let model = learn(&params, &spectrum, processor).context("Could not learn the model")?;
    Ok(model)
}
