/// Human-readable byte count: plain bytes up to 900, then KB, then MB above
/// 900 KiB. At most two decimals, trailing zeros dropped.
pub fn nice_bytes(bytes: u64) -> String {
    if bytes > 1024 * 900 {
        format!("{}MB", round2(bytes as f64 / 1024.0 / 1024.0))
    } else if bytes > 900 {
        format!("{}KB", round2(bytes as f64 / 1024.0))
    } else {
        format!("{}B", bytes)
    }
}

fn round2(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
