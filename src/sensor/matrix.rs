//! Channel major sample matrices: one row per channel, one column per sample
use ndarray::{s, stack, Array1, Array2, ArrayView1, Axis};

/// Channel major matrix: shape is (channels, samples)
pub type Matrix = Array2<f64>;

/// Builds a [Matrix] from interleaved (sample major) data, as it appears
/// in the sample stream. A trailing incomplete sample is dropped.
pub fn deinterleave(channels: usize, mut interleaved: Vec<f64>) -> Matrix {
    if channels == 0 {
        return Matrix::zeros((0, 0));
    }
    let samples = interleaved.len() / channels;
    interleaved.truncate(samples * channels);
    match Array2::from_shape_vec((samples, channels), interleaved) {
        Ok(sample_major) => sample_major.reversed_axes().as_standard_layout().into_owned(),
        Err(_) => Matrix::zeros((channels, 0)),
    }
}

/// Builds a [Matrix] from its rows, truncated to the shortest one
pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
    let samples = rows.iter().map(|row| row.len()).min().unwrap_or(0);
    Array2::from_shape_fn((rows.len(), samples), |(ch, j)| rows[ch][j])
}

/// Applies `f(channel, sample, value)` to every value
pub fn map_indexed<F: Fn(usize, usize, f64) -> f64>(matrix: &Matrix, f: F) -> Matrix {
    Array2::from_shape_fn(matrix.dim(), |(ch, j)| f(ch, j, matrix[[ch, j]]))
}

/// Reduces consecutive groups of samples to their mean. `groups` are the
/// group lengths, in sample order. Samples past the last complete group
/// are dropped.
pub fn average_groups(matrix: &Matrix, groups: &[usize]) -> Matrix {
    let mut start = 0;
    let mut means: Vec<Array1<f64>> = Vec::with_capacity(groups.len());
    for len in groups.iter() {
        let end = start + len;
        if *len == 0 || end > matrix.ncols() {
            break;
        }
        if let Some(mean) = matrix.slice(s![.., start..end]).mean_axis(Axis(1)) {
            means.push(mean);
        }
        start = end;
    }
    let views: Vec<ArrayView1<f64>> = means.iter().map(|mean| mean.view()).collect();
    stack(Axis(1), &views).unwrap_or_else(|_| Matrix::zeros((matrix.nrows(), 0)))
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn interleaved_samples() {
        let m = deinterleave(3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(m.dim(), (3, 2));
        assert_eq!(m.row(0), array![1.0, 4.0]);
        assert_eq!(m.row(2), array![3.0, 6.0]);
        assert_eq!(deinterleave(0, vec![1.0]).dim(), (0, 0));
    }

    #[test]
    fn stacked_rows() {
        let m = from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0]]);
        assert_eq!(m, array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(from_rows(vec![]).dim(), (0, 0));
    }

    #[test]
    fn indexed_mapping() {
        let m = map_indexed(&array![[1.0, 2.0], [3.0, 4.0]], |ch, j, v| v * 10.0 + (ch + j) as f64);
        assert_eq!(m, array![[10.0, 21.0], [31.0, 42.0]]);
    }

    #[test]
    fn group_averaging() {
        let m = array![[1.0, 3.0, 5.0, 7.0, 9.0, 11.0], [2.0, 2.0, 4.0, 4.0, 6.0, 6.0]];
        assert_eq!(average_groups(&m, &[2, 2, 2]), array![[2.0, 6.0, 10.0], [2.0, 4.0, 6.0]]);
        // incomplete trailing group
        assert_eq!(average_groups(&m, &[4, 4]), array![[4.0], [3.0]]);
        assert_eq!(average_groups(&m, &[]).dim(), (2, 0));
    }
}
