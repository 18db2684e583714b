//! Logger file: wires header, sequence, pages, sensors and products
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    ops::Range,
    path::{Path, PathBuf},
};

use crate::{
    calibration::{CalibrationProvider, CalibrationTable},
    header::Header,
    options::DecodeOptions,
    page::{FileKind, Page, PageDecoder, PartialRecovery},
    prelude::Error,
    product::{self, DataProduct, Rows},
    sensor::SensorBank,
    sequence::{PageSequence, Sequence},
    writer::{write_side_payload, OutputStream},
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "log")]
use log::{debug, error, warn};

/// Outcome of [DataFile::convert]. Recoverable problems
/// are reported here, they do not abort the conversion.
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Pages decoded and written
    pub pages_written: usize,
    /// Pages expected from the file size
    pub expected_pages: usize,
    /// Pages lost to invalid mini headers
    pub recovery: Option<PartialRecovery>,
    /// Sensors that could not be reconstructed
    pub sensor_errors: Vec<Error>,
    /// Products that could not be generated
    pub product_errors: Vec<Error>,
    /// Page that could not be decoded (terminates the conversion)
    pub page_errors: Vec<Error>,
    /// Generated output streams
    pub outputs: Vec<PathBuf>,
    /// Persisted side payload
    pub side_payload: Option<PathBuf>,
    /// Side payload length (bytes)
    pub side_payload_len: usize,
}

impl DecodeReport {
    /// True if the whole file was converted without any problem
    pub fn is_complete(&self) -> bool {
        self.recovery.is_none()
            && self.sensor_errors.is_empty()
            && self.product_errors.is_empty()
            && self.page_errors.is_empty()
    }
}

/// [DataFile] is one logger file, opened for decoding
#[derive(Debug)]
pub struct DataFile<R> {
    base_name: String,
    header: Header,
    sequence: Sequence,
    page_sequence: PageSequence,
    decoder: PageDecoder<R>,
}

impl DataFile<BufReader<File>> {
    /// Opens a logger file. Its kind is deduced from the file extension.
    pub fn open(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let kind = FileKind::from_path(path)?;
        let fd = File::open(path)?;
        let file = Self::from_reader(BufReader::new(fd), kind, options)?;
        match path.file_stem() {
            Some(stem) => Ok(file.with_base_name(&stem.to_string_lossy())),
            None => Ok(file),
        }
    }
}

impl<R: Read + Seek + Send> DataFile<R> {
    /// Builds [DataFile] from any readable source. Fails on unusable header.
    pub fn from_reader(mut reader: R, kind: FileKind, options: &DecodeOptions) -> Result<Self, Error> {
        reader.seek(SeekFrom::Start(0))?;
        let mut prefix = Vec::with_capacity(kind.header_len());
        (&mut reader)
            .take(kind.header_len() as u64)
            .read_to_end(&mut prefix)?;

        let header = Header::parse(&prefix)?;
        let sequence = Sequence::build(&header);

        let data_start = options.data_start.unwrap_or(kind.data_start());
        let decoder = PageDecoder::new(reader, kind, data_start)?;
        let page_sequence = sequence.tile(decoder.page_capacity());

        let base_name = header.serial_number().unwrap_or("logger").to_string();

        #[cfg(feature = "log")]
        debug!(
            "{}: {} pages, {} slots per page",
            base_name,
            decoder.n_pages(),
            page_sequence.len()
        );

        Ok(Self {
            base_name,
            header,
            sequence,
            page_sequence,
            decoder,
        })
    }

    /// Copies and returns [DataFile] with output base name
    pub fn with_base_name(mut self, base_name: &str) -> Self {
        self.base_name = base_name.to_string();
        self
    }

    /// Output base name
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// File [Header]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Slot template of one major interval
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Slot ownership of one complete page
    pub fn page_sequence(&self) -> &PageSequence {
        &self.page_sequence
    }

    /// Page access
    pub fn decoder(&self) -> &PageDecoder<R> {
        &self.decoder
    }

    /// Number of valid pages
    pub fn n_pages(&self) -> usize {
        self.decoder.n_pages()
    }

    /// Decodes one page
    pub fn page(&self, index: usize) -> Result<Page, Error> {
        self.decoder.page(index)
    }

    /// Calibration stated in the header logger info block
    pub fn calibration(&self) -> Result<CalibrationTable, Error> {
        CalibrationTable::from_logger_info(self.header.logger_info())
    }

    /// Builds every enabled sensor, reports those that could not be built
    pub fn sensors(&self, provider: &dyn CalibrationProvider) -> (SensorBank, Vec<Error>) {
        SensorBank::new(&self.header, &self.page_sequence, provider)
    }

    /// Selects the products to generate
    pub fn products(
        &self,
        bank: &SensorBank,
        options: &DecodeOptions,
    ) -> (Vec<DataProduct>, Vec<Error>) {
        product::select(options.output_type, bank, options)
    }

    fn register(
        &self,
        dir: &Path,
        product: &DataProduct,
        options: &DecodeOptions,
    ) -> Result<OutputStream, Error> {
        #[cfg(feature = "flate2")]
        if options.gzip {
            return OutputStream::register_gzip(dir, &self.base_name, product);
        }
        #[cfg(not(feature = "flate2"))]
        if options.gzip {
            #[cfg(feature = "log")]
            warn!("gzip compression requires the flate2 feature");
        }
        OutputStream::register(dir, &self.base_name, product)
    }

    fn decode(
        &self,
        index: usize,
        products: &[DataProduct],
        average: bool,
    ) -> Result<(Page, Vec<Rows>), Error> {
        let page = self.decoder.page(index)?;
        let rows = products
            .iter()
            .map(|product| product.rows(&page, average))
            .collect();
        Ok((page, rows))
    }

    #[cfg(not(feature = "parallel"))]
    fn decode_pages(
        &self,
        pages: Range<usize>,
        products: &[DataProduct],
        average: bool,
    ) -> Vec<Result<(Page, Vec<Rows>), Error>> {
        pages
            .map(|index| self.decode(index, products, average))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn decode_pages(
        &self,
        pages: Range<usize>,
        products: &[DataProduct],
        average: bool,
    ) -> Vec<Result<(Page, Vec<Rows>), Error>> {
        pages
            .into_par_iter()
            .map(|index| self.decode(index, products, average))
            .collect()
    }

    /// Converts the whole file: every selected product is written to
    /// `out_dir`, page by page in ascending order.
    /// Only output errors abort the conversion, any other problem
    /// is reported in the returned [DecodeReport].
    pub fn convert(
        &self,
        provider: &dyn CalibrationProvider,
        options: &DecodeOptions,
        out_dir: &Path,
    ) -> Result<DecodeReport, Error> {
        let (bank, sensor_errors) = self.sensors(provider);
        let (products, product_errors) = self.products(&bank, options);

        let mut streams = products
            .iter()
            .map(|product| self.register(out_dir, product, options))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = DecodeReport {
            expected_pages: self.decoder.expected_pages(),
            recovery: self.decoder.recovery().cloned(),
            sensor_errors,
            product_errors,
            ..Default::default()
        };

        #[cfg(feature = "parallel")]
        let batch = rayon::current_num_threads().max(1);
        #[cfg(not(feature = "parallel"))]
        let batch = 1;

        let n_pages = self.n_pages();
        let mut start = 0;

        'pages: while start < n_pages {
            let end = (start + batch).min(n_pages);
            for decoded in self.decode_pages(start..end, &products, options.average) {
                let (page, rows) = match decoded {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        #[cfg(feature = "log")]
                        error!("page #{}: {}", report.pages_written, e);
                        report.page_errors.push(e);
                        break 'pages;
                    },
                };

                for (stream, rows) in streams.iter_mut().zip(rows.iter()) {
                    stream.write(rows)?;
                }

                if let Some(payload) = &page.side_payload {
                    report.side_payload = Some(write_side_payload(out_dir, &self.base_name, payload)?);
                    report.side_payload_len = payload.len();
                }

                report.pages_written += 1;
            }
            start = end;
        }

        for stream in streams {
            report.outputs.push(stream.finish()?);
        }

        #[cfg(feature = "log")]
        if !report.is_complete() {
            warn!(
                "{}: incomplete conversion, {}/{} pages",
                self.base_name, report.pages_written, report.expected_pages
            );
        }

        Ok(report)
    }
}
