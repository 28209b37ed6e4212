use std::io;

use pstmodel::model::Model;
use pstmodel::spectrum::SpectrumSource;

use crate::cli::LearnArgs;
use crate::cmd::learn_model;
use crate::csv_output::CsvOutput;
use crate::PROGRESS_BAR;

pub(crate) fn describe(args: &LearnArgs, csv: bool) -> anyhow::Result<()> {
    let model = learn_model(args)?;
    PROGRESS_BAR.finish();

    let stats = ModelStats::new(&model);
    if csv {
        let output = CsvOutput::new(Some(Box::new(io::stdout())));
        output.use_header(&ModelStats::HEADER)?;
        output.add_record(stats.to_record())?;
        output.flush()?;
    } else {
        stats.print();
    }

    Ok(())
}

#[derive(Debug)]
struct ModelStats {
    kind: &'static str,
    identifier: String,
    training_symbols: u64,
    nodes: usize,
    leaves: usize,
    depth: usize,
    mean_entropy: f64,
}

impl ModelStats {
    const HEADER: [&'static str; 7] = [
        "kind",
        "identifier",
        "training_symbols",
        "nodes",
        "leaves",
        "depth",
        "mean_entropy",
    ];

    fn new(model: &Model) -> Self {
        Self {
            kind: if model.is_automaton() {
                "automaton"
            } else {
                "tree"
            },
            identifier: model.identifier().to_string(),
            training_symbols: model.tree().original_sequence_length(),
            nodes: model.size(),
            leaves: model.tree().leaves().count(),
            depth: model.depth(),
            mean_entropy: model.mean_entropy().get(),
        }
    }

    fn to_record(&self) -> [String; 7] {
        [
            self.kind.to_owned(),
            self.identifier.clone(),
            self.training_symbols.to_string(),
            self.nodes.to_string(),
            self.leaves.to_string(),
            self.depth.to_string(),
            format!("{:.6}", self.mean_entropy),
        ]
    }

    fn print(&self) {
        println!("Model {} ({}):", self.identifier, self.kind);
        println!("  Training symbols: {}", self.training_symbols);
        println!("  Nodes: {}", self.nodes);
        println!("  Leaves: {}", self.leaves);
        println!("  Depth: {}", self.depth);
        println!("  Mean entropy: {:.4} bits", self.mean_entropy);
    }
}
