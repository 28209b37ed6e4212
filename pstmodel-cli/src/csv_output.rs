use std::io::Write;
use std::sync::Mutex;

struct CsvOutputState {
    writer: csv::Writer<Box<dyn Write + Send>>,
    initialized: bool,
}

/// Writes records as CSV, or does nothing when disabled.
pub(crate) struct CsvOutput {
    writer: Option<Mutex<CsvOutputState>>,
}

impl CsvOutput {
    #[must_use]
    pub fn new(output: Option<Box<dyn Write + Send>>) -> Self {
        let writer = output.map(|output| {
            Mutex::new(CsvOutputState {
                writer: csv::Writer::from_writer(output),
                initialized: false,
            })
        });

        Self { writer }
    }

    pub fn use_header(&self, header: &[&str]) -> anyhow::Result<()> {
        if let Some(writer) = &self.writer {
            let mut state = writer.lock().unwrap();

            if !state.initialized {
                state.writer.write_record(header)?;
                state.initialized = true;
            }
        }

        anyhow::Ok(())
    }

    pub fn add_record<I, T>(&self, values: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if let Some(writer) = &self.writer {
            let mut state = writer.lock().unwrap();

            state.writer.write_record(values)?;
        }

        anyhow::Ok(())
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        if let Some(writer) = &self.writer {
            writer.lock().unwrap().writer.flush()?;
        }

        anyhow::Ok(())
    }
}
