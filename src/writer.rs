//! Output streams: one CSV destination per data product,
//! with optional .gz compression
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use csv::Writer;

#[cfg(feature = "flate2")]
use flate2::{write::GzEncoder, Compression};

use crate::{
    epoch::format_iso,
    prelude::Error,
    product::{DataProduct, Rows},
};

#[cfg(feature = "log")]
use log::debug;

/// Gzip compression level of compressed streams
#[cfg(feature = "flate2")]
const COMPRESSION_LEVEL: u32 = 6;

/// [BufferedWriter] is the byte sink of an [OutputStream]:
/// either a plain file or a gzip encoder wrapping it.
#[derive(Debug)]
pub enum BufferedWriter<W: Write> {
    /// Readable stream
    Plain(BufWriter<W>),
    /// Gzip compressed stream (non readable)
    #[cfg(feature = "flate2")]
    Gz(BufWriter<GzEncoder<W>>),
}

impl<W: Write> BufferedWriter<W> {
    /// Creates new Readable [BufferedWriter]
    pub fn plain(w: W) -> Self {
        Self::Plain(BufWriter::new(w))
    }
    #[cfg(feature = "flate2")]
    /// Creates new [BufferedWriter] to stream gzip encoded content with
    /// desired compression level. The higher the order, the lower the performance.
    pub fn gzip(w: W, compression_level: u32) -> Self {
        Self::Gz(BufWriter::new(GzEncoder::new(
            w,
            Compression::new(compression_level),
        )))
    }
    /// Flushes and terminates the stream (gzip trailer included)
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Self::Plain(writer) => writer.into_inner().map_err(|e| e.into_error()),
            #[cfg(feature = "flate2")]
            Self::Gz(writer) => writer.into_inner().map_err(|e| e.into_error())?.finish(),
        }
    }
}

impl<W: Write> Write for BufferedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(ref mut writer) => writer.write(buf),
            #[cfg(feature = "flate2")]
            Self::Gz(ref mut writer) => writer.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(ref mut writer) => writer.flush(),
            #[cfg(feature = "flate2")]
            Self::Gz(ref mut writer) => writer.flush(),
        }
    }
}

/// [OutputStream] writes the rows of one [DataProduct] to
/// `<dir>/<base name>_<stream name>.csv`
#[derive(Debug)]
pub struct OutputStream {
    path: PathBuf,
    writer: Writer<BufferedWriter<File>>,
    precisions: Vec<usize>,
    rows: usize,
}

impl OutputStream {
    /// Creates the destination of this [DataProduct], replacing any
    /// previous one, and writes the column header line.
    pub fn register(dir: &Path, base_name: &str, product: &DataProduct) -> Result<Self, Error> {
        let path = dir.join(format!("{}_{}.csv", base_name, product.stream_name()));
        let writer = BufferedWriter::plain(File::create(&path)?);
        Self::new(path, writer, product)
    }

    /// Creates the gzip compressed destination of this [DataProduct]
    /// (`.csv.gz`), replacing any previous one.
    #[cfg(feature = "flate2")]
    pub fn register_gzip(
        dir: &Path,
        base_name: &str,
        product: &DataProduct,
    ) -> Result<Self, Error> {
        let path = dir.join(format!("{}_{}.csv.gz", base_name, product.stream_name()));
        let writer = BufferedWriter::gzip(File::create(&path)?, COMPRESSION_LEVEL);
        Self::new(path, writer, product)
    }

    fn new(
        path: PathBuf,
        writer: BufferedWriter<File>,
        product: &DataProduct,
    ) -> Result<Self, Error> {
        let mut writer = Writer::from_writer(writer);
        let mut record = vec!["ISO 8601 Time"];
        record.extend(product.kind().columns());
        writer.write_record(&record)?;

        #[cfg(feature = "log")]
        debug!("registered {}", path.display());

        Ok(Self {
            path,
            writer,
            precisions: product.kind().precisions(),
            rows: 0,
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows written so far
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Appends these [Rows] and flushes. Rows are written in the order
    /// they are provided.
    pub fn write(&mut self, rows: &Rows) -> Result<(), Error> {
        let mut record = Vec::with_capacity(rows.values.nrows() + 1);
        for j in 0..rows.len() {
            record.clear();
            record.push(format_iso(rows.times[j]));
            for ch in 0..rows.values.nrows() {
                let precision = self.precisions.get(ch).copied().unwrap_or(4);
                record.push(format!("{:.*}", precision, rows.values[[ch, j]]));
            }
            self.writer.write_record(&record)?;
        }
        self.rows += rows.len();
        self.writer.flush()?;
        Ok(())
    }

    /// Terminates this stream and returns its path
    pub fn finish(self) -> Result<PathBuf, Error> {
        let writer = self.writer.into_inner().map_err(|e| e.into_error())?;
        writer.finish()?;
        Ok(self.path)
    }
}

/// Persists the side payload found after the end of data,
/// as `<dir>/<base name>_side.bin`
pub fn write_side_payload(dir: &Path, base_name: &str, payload: &[u8]) -> Result<PathBuf, Error> {
    let path = dir.join(format!("{}_side.bin", base_name));
    let mut fd = File::create(&path)?;
    fd.write_all(payload)?;
    Ok(path)
}
