use std::fmt::Display;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::info;

#[derive(Debug, Clone)]
pub struct InputFile {
    path: PathBuf,
}

impl Display for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

pub fn input_file(path: &str) -> Result<InputFile, String> {
    let input_path = Path::new(path);
    if !input_path.is_file() {
        return Err(format!("{} is not a file", input_path.display()));
    }

    Ok(InputFile {
        path: input_path.to_path_buf(),
    })
}

impl InputFile {
    pub fn as_reader(&self) -> anyhow::Result<InputReader> {
        InputReader::from_path(&self.path)
    }
}

pub fn input_stream(path: &str) -> Result<InputStream, String> {
    Ok(InputStream {
        path: PathBuf::from(path),
    })
}

#[derive(Debug, Clone)]
pub struct InputStream {
    path: PathBuf,
}

impl Display for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl InputStream {
    pub fn as_reader(&self) -> anyhow::Result<InputReader> {
        InputReader::from_path(&self.path)
    }
}

#[derive(Debug)]
pub enum InputReader {
    Stdin(io::Stdin),
    File(File),
}

impl InputReader {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let is_stdin = path.to_string_lossy() == "-";

        let val = if is_stdin {
            Self::Stdin(io::stdin())
        } else {
            Self::File(File::open(path)?)
        };
        Ok(val)
    }

    pub fn length(&self) -> anyhow::Result<Option<u64>> {
        let val = match self {
            InputReader::Stdin(_) => None,
            InputReader::File(file) => Some(file.metadata()?.len()),
        };
        Ok(val)
    }

    #[must_use]
    pub fn into_buf_read(self) -> Box<dyn BufRead + Send> {
        match self {
            InputReader::Stdin(stdin) => Box::new(BufReader::new(stdin)),
            InputReader::File(file) => Box::new(BufReader::new(file)),
        }
    }
}

#[derive(Debug)]
pub enum OutputWriter {
    Stdout(io::Stdout),
    File(File),
}

impl OutputWriter {
    pub fn from_path(output: &Option<PathBuf>) -> anyhow::Result<Self> {
        let path = output.clone().unwrap_or_else(|| PathBuf::from("-"));
        info!("Output file: {}", path.display());

        let writer = if path.to_string_lossy() == "-" {
            Self::Stdout(io::stdout())
        } else {
            Self::File(File::create(path)?)
        };

        Ok(writer)
    }

    pub fn into_write(self) -> Box<dyn Write + Send> {
        match self {
            OutputWriter::Stdout(stdout) => Box::new(stdout),
            OutputWriter::File(file) => Box::new(file),
        }
    }
}
