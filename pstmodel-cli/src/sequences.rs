use std::io::BufRead;

use anyhow::Context;
use pstmodel::fragment::SequenceFragment;
use pstmodel::progress::{ByteNum, ProgressNotifier};

/// Sequence read from a text file, along with its name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NamedSequence {
    pub name: String,
    pub data: Vec<u8>,
}

impl NamedSequence {
    #[must_use]
    pub fn into_fragment(self) -> SequenceFragment {
        SequenceFragment::new(self.name, self.data)
    }
}

/// Reads one sequence per line. A line starting with `>` names the sequence
/// on the next line; sequences without a name are named after their position
/// in the file. Empty lines are skipped.
pub(crate) fn read_sequences<R, P>(
    reader: R,
    progress_notifier: &P,
) -> anyhow::Result<Vec<NamedSequence>>
where
    R: BufRead,
    P: ProgressNotifier + ?Sized,
{
    let mut sequences = Vec::new();
    let mut pending_name: Option<String> = None;

    for (line_num, line) in reader.split(b'\n').enumerate() {
        let mut line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        progress_notifier.processed_bytes(ByteNum::new(line.len() + 1));
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.first() == Some(&b'>') {
            pending_name = Some(String::from_utf8_lossy(&line[1..]).trim().to_owned());
        } else if !line.is_empty() {
            let name = pending_name
                .take()
                .unwrap_or_else(|| format!("seq{}", sequences.len() + 1));
            sequences.push(NamedSequence { name, data: line });
        }
    }

    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use pstmodel::progress::{ByteNum, ProgressNotifier};

    use crate::sequences::{read_sequences, NamedSequence};

    #[derive(Debug)]
    struct NoProgress;

    impl ProgressNotifier for NoProgress {
        fn processed_bytes(&self, _bytes: ByteNum) {}

        fn set_iter_num(&self, _num_iter: u64) {}

        fn inc_iter(&self) {}
    }

    fn named(name: &str, data: &str) -> NamedSequence {
        NamedSequence {
            name: name.to_owned(),
            data: data.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_read_sequences() {
        let input = ">first\nACGT\nGGNA\r\n\n> third \nTTT\n";

        let sequences = read_sequences(input.as_bytes(), &NoProgress).unwrap();

        assert_eq!(
            sequences,
            vec![
                named("first", "ACGT"),
                named("seq2", "GGNA"),
                named("third", "TTT"),
            ]
        );
    }

    #[test]
    fn test_read_sequences_empty() {
        assert!(read_sequences(">only a name\n".as_bytes(), &NoProgress)
            .unwrap()
            .is_empty());
    }
}
