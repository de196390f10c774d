use crate::drivers::IndexedSample;
pub const DEFAULT_THRESHOLD: f64 = 20.0;
/// A sample counts as touched while its reading sits below the threshold.
///
/// Nothing is cached: callers re-evaluate against whatever threshold is live,
/// so a threshold change applies to the whole window on the next pass.
pub fn is_touched(sample: &IndexedSample, threshold: f64) -> bool {
    sample.touch_value < threshold
}
/// Interpret user text as a threshold. `None` for anything that is not a
/// finite number, including `"NaN"` and `"inf"`.
pub fn try_parse_threshold(input: &str) -> Option<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
/// Like `try_parse_threshold`, keeping `previous` when the text is rejected.
pub fn parse_threshold(input: &str, previous: f64) -> f64 {
    try_parse_threshold(input).unwrap_or(previous)
}
