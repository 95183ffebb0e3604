/// Countdown display, `m:ss` with minutes unpadded.
pub fn format_mm_ss(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
