//! Compact one-line rendering of a numeric series.

/// Glyph ramp, lowest to highest
pub const GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Default rendered width in glyphs
pub const DEFAULT_WIDTH: usize = 120;

/// Average consecutive chunks of `ceil(n / width)` values so at most `width` remain.
///
/// The last chunk may be shorter and is averaged over its own length.
pub fn downsample(values: &[f64], width: usize) -> Vec<f64> {
    let width = width.max(1);
    if values.len() <= width {
        return values.to_vec();
    }

    let size = values.len().div_ceil(width);
    values
        .chunks(size)
        .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
        .collect()
}

/// Render `values` scaled between their own min and max.
///
/// A flat series renders every position with the middle glyph.
pub fn render(values: &[f64], width: usize) -> String {
    if values.is_empty() {
        return String::new();
    }

    let data = downsample(values, width);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return GLYPHS[GLYPHS.len() / 2].to_string().repeat(data.len());
    }

    let top = (GLYPHS.len() - 1) as f64;
    data.iter()
        .map(|v| {
            let t = (v - min) / (max - min);
            let idx = (t * top).round().clamp(0.0, top) as usize;
            GLYPHS[idx]
        })
        .collect()
}

/// Render a peer-count series
pub fn render_counts(counts: &[u32], width: usize) -> String {
    let values: Vec<f64> = counts.iter().map(|&c| f64::from(c)).collect();
    render(&values, width)
}
