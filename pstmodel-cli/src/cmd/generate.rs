use std::io::Write;

use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::cli::LearnArgs;
use crate::cmd::learn_model;
use crate::opts::OutputWriter;
use crate::PROGRESS_BAR;

pub(crate) fn generate(
    args: &LearnArgs,
    output: OutputWriter,
    length: usize,
    count: usize,
    seed: u64,
) -> anyhow::Result<()> {
    let model = learn_model(args)?;
    info!(
        "Generating {} sequences of length {} (seed: {})",
        count, length, seed
    );

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut writer = output.into_write();
    PROGRESS_BAR.start_iters("Generating");
    for i in 0..count {
        let sequence = model.generate(length, &mut rng);
        if sequence.len() < length {
            info!("The model cannot generate any symbol");
        }

        writeln!(writer, ">generated_{}", i + 1)?;
        writer.write_all(&sequence)?;
        writeln!(writer)?;
        PROGRESS_BAR.inc(1);
    }
    writer.flush()?;

    Ok(())
}
