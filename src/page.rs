//! Page decoding: file layout, mini header scan and sample runs
use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

use byteorder::{ByteOrder, LittleEndian};
use hifitime::{Duration, Epoch};
use num_integer::div_ceil;

use crate::{mini_header::MiniHeader, prelude::Error};

#[cfg(feature = "log")]
use log::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Multi page files are organized in pages of this size (bytes)
pub const PAGE_SIZE: u64 = 1024 * 1024;

/// Out of band sample value marking the end of recorded data
pub const END_OF_DATA: u16 = 0x8000;

/// Number of consecutive [END_OF_DATA] samples terminating the data
pub const END_OF_DATA_RUN: usize = 7;

/// Supported file kinds
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FileKind {
    /// `.lid` files: series of 1 MiB pages
    MultiPage,
    /// `.lis` files: one single page
    SinglePage,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::MultiPage => write!(f, "lid"),
            Self::SinglePage => write!(f, "lis"),
        }
    }
}

impl FromStr for FileKind {
    type Err = Error;
    /// Identifies [FileKind] from a file extension
    fn from_str(extension: &str) -> Result<Self, Self::Err> {
        match extension.trim().to_lowercase().as_str() {
            "lid" => Ok(Self::MultiPage),
            "lis" => Ok(Self::SinglePage),
            _ => Err(Error::UnsupportedFileKind(extension.to_string())),
        }
    }
}

impl FileKind {
    /// Identifies [FileKind] from a file path
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::UnsupportedFileKind(path.to_string_lossy().to_string()))?;
        Self::from_str(extension)
    }

    /// Size of the prefix holding the file header (bytes)
    pub fn header_len(&self) -> usize {
        match self {
            Self::MultiPage => 500,
            Self::SinglePage => 1000,
        }
    }

    /// Default offset of the data region (bytes)
    pub fn data_start(&self) -> u64 {
        match self {
            Self::MultiPage => 32768,
            Self::SinglePage => 4096,
        }
    }
}

/// Pages could not all be recovered
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialRecovery {
    /// Pages validated
    pub recovered: usize,
    /// Pages expected from the file size
    pub expected: usize,
    /// First failure
    pub reason: String,
}

impl std::fmt::Display for PartialRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "partial recovery: {} of {} expected ({})",
            self.recovered, self.expected, self.reason
        )
    }
}

/// One decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page index in file
    pub index: usize,
    /// Page start time, clock correction applied
    pub time: Epoch,
    /// Page start time (unix seconds)
    pub start: f64,
    /// Battery voltage (V) when stated
    pub voltage: Option<f64>,
    /// Raw samples, in stream order
    pub samples: Vec<u16>,
    /// Bytes following the end of data (last page only)
    pub side_payload: Option<Vec<u8>>,
}

impl Page {
    /// Builds a [Page] starting at `time`
    pub fn new(index: usize, time: Epoch, samples: Vec<u16>) -> Self {
        Self {
            index,
            time,
            start: time.to_unix_seconds(),
            voltage: None,
            samples,
            side_payload: None,
        }
    }

    /// Copies and returns [Page] with battery voltage
    pub fn with_voltage(&self, voltage: f64) -> Self {
        let mut s = self.clone();
        s.voltage = Some(voltage);
        s
    }

    /// Page start time (unix seconds)
    pub fn unix_seconds(&self) -> f64 {
        self.start
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if this page holds no sample
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Returns index of the first run of [END_OF_DATA_RUN] consecutive
/// [END_OF_DATA] samples
pub fn end_of_data(samples: &[u16]) -> Option<usize> {
    samples
        .windows(END_OF_DATA_RUN)
        .position(|run| run.iter().all(|s| *s == END_OF_DATA))
}

/// [PageDecoder] gives random access to the pages of one file.
/// Every page mini header is validated on construction: the scan stops
/// at the first invalid one, which is reported as a [PartialRecovery].
#[derive(Debug)]
pub struct PageDecoder<R> {
    source: Mutex<R>,
    kind: FileKind,
    data_start: u64,
    page_size: u64,
    mini_header_len: usize,
    mini_headers: Vec<MiniHeader>,
    expected: usize,
    recovery: Option<PartialRecovery>,
}

impl<R: Read + Seek> PageDecoder<R> {
    /// Builds a [PageDecoder], data region starting at `data_start`
    pub fn new(mut source: R, kind: FileKind, data_start: u64) -> Result<Self, Error> {
        let file_len = source.seek(SeekFrom::End(0))?;
        let data_len = file_len.saturating_sub(data_start);

        let (page_size, expected) = match kind {
            FileKind::MultiPage => (PAGE_SIZE, div_ceil(data_len, PAGE_SIZE) as usize),
            FileKind::SinglePage => (data_len, (data_len > 0) as usize),
        };

        let mut mini_headers = Vec::with_capacity(expected);
        let mut recovery = None;

        for index in 0..expected {
            let offset = data_start + index as u64 * page_size;
            match MiniHeader::read(&mut source, offset) {
                Ok(mini_header) => mini_headers.push(mini_header),
                Err(e) => {
                    #[cfg(feature = "log")]
                    warn!("page #{}: {}", index, e);
                    recovery = Some(PartialRecovery {
                        recovered: index,
                        expected,
                        reason: e.to_string(),
                    });
                    break;
                },
            }
        }

        let mini_header_len = mini_headers.first().map(|mh| mh.len()).unwrap_or(0);

        #[cfg(feature = "log")]
        debug!(
            "{} file: {}/{} pages, mini header {} bytes",
            kind,
            mini_headers.len(),
            expected,
            mini_header_len
        );

        Ok(Self {
            source: Mutex::new(source),
            kind,
            data_start,
            page_size,
            mini_header_len,
            mini_headers,
            expected,
            recovery,
        })
    }

    /// File kind
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Number of valid pages
    pub fn n_pages(&self) -> usize {
        self.mini_headers.len()
    }

    /// Number of pages expected from the file size
    pub fn expected_pages(&self) -> usize {
        self.expected
    }

    /// Reports pages that could not be recovered
    pub fn recovery(&self) -> Option<&PartialRecovery> {
        self.recovery.as_ref()
    }

    /// Mini header length (bytes), identical for all pages
    pub fn mini_header_len(&self) -> usize {
        self.mini_header_len
    }

    /// Number of sample slots in one complete page
    pub fn page_capacity(&self) -> usize {
        (self.page_size.saturating_sub(self.mini_header_len as u64) / 2) as usize
    }

    /// Returns [MiniHeader] of this page
    pub fn mini_header(&self, index: usize) -> Result<&MiniHeader, Error> {
        self.mini_headers
            .get(index)
            .ok_or(Error::PageOutOfRange(index))
    }

    /// Start time of this page. The firmware stamps every page
    /// but the first one second late.
    pub fn page_time(&self, index: usize) -> Result<Epoch, Error> {
        let clock = self.mini_header(index)?.clock();
        if index > 0 {
            Ok(clock - Duration::from_seconds(1.0))
        } else {
            Ok(clock)
        }
    }

    /// Start time of every valid page
    pub fn page_times(&self) -> Vec<Epoch> {
        (0..self.n_pages())
            .filter_map(|index| self.page_time(index).ok())
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, R>, Error> {
        self.source
            .lock()
            .map_err(|_| Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "page source lock poisoned",
            )))
    }

    /// Decodes one page. On the last page of the file, samples stop at the
    /// end of data marker and any following byte is exposed as side payload.
    /// Recovered files that lost their last pages have no such page.
    pub fn page(&self, index: usize) -> Result<Page, Error> {
        let time = self.page_time(index)?;
        let voltage = self.mini_header(index)?.battery_voltage();

        let offset = self.data_start + index as u64 * self.page_size + self.mini_header_len as u64;
        let capacity = self.page_size.saturating_sub(self.mini_header_len as u64);

        let mut bytes = Vec::with_capacity(capacity as usize);
        {
            let mut source = self.lock()?;
            source.seek(SeekFrom::Start(offset))?;
            (&mut *source).take(capacity).read_to_end(&mut bytes)?;
        }

        let even = bytes.len() - bytes.len() % 2;
        let mut samples = vec![0_u16; even / 2];
        LittleEndian::read_u16_into(&bytes[..even], &mut samples);

        let mut side_payload = None;
        if index + 1 == self.expected {
            if let Some(k) = end_of_data(&samples) {
                samples.truncate(k);
                let trailing = &bytes[(k + END_OF_DATA_RUN) * 2..];
                if !trailing.is_empty() {
                    #[cfg(feature = "log")]
                    debug!("page #{}: {} bytes side payload", index, trailing.len());
                    side_payload = Some(trailing.to_vec());
                }
            }
        }

        Ok(Page {
            index,
            time,
            start: time.to_unix_seconds(),
            voltage,
            samples,
            side_payload,
        })
    }
}
