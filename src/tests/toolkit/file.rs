//! Synthetic logger files
use hifitime::Epoch;

use super::HeaderBuilder;
use crate::page::{FileKind, END_OF_DATA, END_OF_DATA_RUN, PAGE_SIZE};

/// Clock stated by the mini header of page #`index`
pub fn mini_header_clock(index: usize) -> Epoch {
    Epoch::from_gregorian_utc(2018, 4, 12, 14, (index % 60) as u8, 0, 0)
}

/// Mini header of page #`index`
pub fn mini_header(index: usize) -> Vec<u8> {
    format!(
        "MHS\r\nCLK 2018-04-12 14:{:02}:00\r\nBAT 0E2B\r\nMHE\r\n",
        index % 60
    )
    .into_bytes()
}

fn temperature_header() -> HeaderBuilder {
    HeaderBuilder::default()
        .tag("SER", "1234567")
        .tag("TMP", "1")
        .tag("TRI", "1")
}

fn push_samples(content: &mut Vec<u8>, samples: &[u16]) {
    for sample in samples {
        content.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Multi page file of `n_pages`, temperature only
pub fn multi_page_file<F: Fn(usize) -> Vec<u16>>(
    n_pages: usize,
    samples: F,
    side_payload: Option<&[u8]>,
) -> Vec<u8> {
    multi_page_file_with(&temperature_header(), n_pages, samples, side_payload)
}

/// Multi page file of `n_pages`: `samples(i)` fills page #i,
/// every page but the last one is zero padded.
/// The last page is terminated by the end of data run when a
/// side payload is to be appended.
pub fn multi_page_file_with<F: Fn(usize) -> Vec<u16>>(
    header: &HeaderBuilder,
    n_pages: usize,
    samples: F,
    side_payload: Option<&[u8]>,
) -> Vec<u8> {
    let data_start = FileKind::MultiPage.data_start() as usize;
    let mut content = header.bytes();
    assert!(content.len() <= FileKind::MultiPage.header_len());
    content.resize(data_start, 0);

    for index in 0..n_pages {
        let page_start = content.len();
        content.extend(mini_header(index));
        push_samples(&mut content, &samples(index));
        assert!(content.len() <= page_start + PAGE_SIZE as usize);

        if index + 1 < n_pages {
            content.resize(page_start + PAGE_SIZE as usize, 0);
        } else if let Some(payload) = side_payload {
            push_samples(&mut content, &[END_OF_DATA; END_OF_DATA_RUN]);
            content.extend_from_slice(payload);
        }
    }
    content
}

/// Single page file, temperature only
pub fn single_page_file(samples: &[u16]) -> Vec<u8> {
    single_page_file_with(&temperature_header(), samples)
}

/// Single page file
pub fn single_page_file_with(header: &HeaderBuilder, samples: &[u16]) -> Vec<u8> {
    let mut content = header.bytes();
    assert!(content.len() <= FileKind::SinglePage.header_len());
    content.resize(FileKind::SinglePage.data_start() as usize, 0);
    content.extend(mini_header(0));
    push_samples(&mut content, samples);
    content
}
