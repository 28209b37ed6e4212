use std::io::Write;

use anyhow::Context;
use log::{info, warn};
use pstmodel::fragment::SequenceFragment;
use pstmodel::scorer::ScoringError;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::cli::LearnArgs;
use crate::cmd::learn_model;
use crate::csv_output::CsvOutput;
use crate::opts::{InputFile, OutputWriter};
use crate::sequences::read_sequences;
use crate::PROGRESS_BAR;

pub(crate) struct ScoreOptions<'a> {
    pub sequences: &'a InputFile,
    pub output: OutputWriter,
    pub per_sample: bool,
    pub csv: bool,
}

pub(crate) fn score(args: &LearnArgs, options: ScoreOptions) -> anyhow::Result<()> {
    let model = learn_model(args)?;

    let reader = options.sequences.as_reader()?;
    PROGRESS_BAR.start_bytes("Reading", reader.length()?.unwrap_or(0));
    let fragments: Vec<SequenceFragment> = read_sequences(reader.into_buf_read(), &*PROGRESS_BAR)
        .with_context(|| format!("Could not read sequences from {}", options.sequences))?
        .into_iter()
        .map(|sequence| sequence.into_fragment())
        .collect();
    info!("Scoring {} sequences", fragments.len());

    PROGRESS_BAR.start_iters("Scoring");
    let summaries: Vec<_> = fragments
        .par_iter()
        .map(|fragment| {
            let summary = model.score_summary(fragment);
            PROGRESS_BAR.inc(1);
            summary
        })
        .collect();
    PROGRESS_BAR.finish();

    let writer = options.output.into_write();
    let (csv, mut plain) = if options.csv {
        (CsvOutput::new(Some(writer)), None)
    } else {
        (CsvOutput::new(None), Some(writer))
    };
    csv.use_header(&["identifier", "scored", "skipped", "score"])?;

    for (fragment, summary) in fragments.iter().zip(summaries) {
        let summary =
            summary.with_context(|| format!("Could not score {}", fragment.identifier()))?;
        let score = match summary.value(options.per_sample) {
            Ok(score) => score.to_string(),
            Err(ScoringError::NothingScored) => {
                warn!("No symbol of {} could be scored", fragment.identifier());
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(plain) = &mut plain {
            writeln!(plain, "{}\t{}", fragment.identifier(), score)?;
        } else {
            csv.add_record([
                fragment.identifier().str().to_owned(),
                summary.scored.to_string(),
                summary.skipped.to_string(),
                score,
            ])?;
        }
    }
    csv.flush()?;
    if let Some(plain) = &mut plain {
        plain.flush()?;
    }

    Ok(())
}
