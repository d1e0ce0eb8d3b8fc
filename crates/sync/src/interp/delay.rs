/// Converts an observed round-trip estimate into a playback delay.
///
/// Bucketed on purpose: deriving the delay continuously from the RTT makes
/// the playback point chase every latency sample and oscillate. The steps
/// trade a little delay for a stable interpolation window.
pub fn playback_delay_ms(ping_ms: f64) -> f64 {
    if ping_ms < 50.0 {
        50.0
    } else if ping_ms < 100.0 {
        100.0
    } else if ping_ms < 200.0 {
        200.0
    } else if ping_ms < 400.0 {
        400.0
    } else if ping_ms < 600.0 {
        600.0
    } else {
        1000.0
    }
}
