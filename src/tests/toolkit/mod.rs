use crate::{calibration::Converter, header::Header, page::Page, sensor::Matrix};
use hifitime::Epoch;

use std::sync::atomic::{AtomicUsize, Ordering};

mod file;
pub use file::{
    mini_header, mini_header_clock, multi_page_file, multi_page_file_with, single_page_file,
    single_page_file_with,
};

/// Builds a [Header] from a list of tags
#[derive(Debug, Clone, Default)]
pub struct HeaderBuilder {
    tags: Vec<(String, String)>,
    logger_info: String,
}

impl HeaderBuilder {
    /// Appends one tag
    pub fn tag(mut self, tag: &str, value: &str) -> Self {
        self.tags.push((tag.to_string(), value.to_string()));
        self
    }

    /// Appends one line to the logger info block
    pub fn info(mut self, tag: &str, value: &str) -> Self {
        self.logger_info.push_str(&format!("{} {}\r\n", tag, value));
        self
    }

    /// Header content, as the firmware writes it
    pub fn bytes(&self) -> Vec<u8> {
        let mut content = String::from("HDS\r\n");
        for (tag, value) in self.tags.iter() {
            content.push_str(&format!("{} {}\r\n", tag, value));
        }
        content.push_str("LIS\r\n");
        content.push_str(&self.logger_info);
        content.push_str("LIE\r\nHDE\r\n");
        content.into_bytes()
    }

    pub fn build(&self) -> Header {
        Header::parse(&self.bytes()).unwrap()
    }
}

/// Builds a [Page] starting at `start` (unix seconds)
pub fn page(index: usize, start: f64, samples: Vec<u16>) -> Page {
    Page {
        start,
        ..Page::new(index, Epoch::from_unix_seconds(start), samples)
    }
}

/// Identity [Converter] counting its invocations
#[derive(Debug, Default)]
pub struct CountingConverter {
    calls: AtomicUsize,
}

impl CountingConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for CountingConverter {
    fn convert(&self, raw: &Matrix) -> Matrix {
        self.calls.fetch_add(1, Ordering::SeqCst);
        raw.clone()
    }
}
