//! Image source for a programming session

use crate::cli::Input;
use gpioprog_core::session::Job;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Blocking byte stream handed to the session
pub struct ImageReader {
    inner: Box<dyn io::Read>,
}

impl ImageReader {
    pub fn new(inner: Box<dyn io::Read>) -> Self {
        Self { inner }
    }
}

impl embedded_io::ErrorType for ImageReader {
    type Error = io::Error;
}

impl embedded_io::Read for ImageReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.inner.read(buf)
    }
}

/// Open the image source before any line is touched
pub fn open(input: &Input) -> Result<Job<ImageReader>, InputError> {
    let reader: Box<dyn io::Read> = match input {
        Input::RestartOnly => return Ok(Job::RestartOnly),
        Input::Stdin => Box::new(io::stdin()),
        Input::File(path) => Box::new(File::open(path).map_err(|source| InputError::Open {
            path: path.clone(),
            source,
        })?),
    };
    Ok(Job::Program(ImageReader::new(reader)))
}
