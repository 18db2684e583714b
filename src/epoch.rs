//! Logger clock parsing and timestamp formatting
use hifitime::Epoch;

/// Parses a logger clock descriptor, formatted as `YYYY-MM-DD HH:MM:SS`.
/// The clock is always expressed in UTC.
pub fn parse_clock(content: &str) -> Option<Epoch> {
    let content = content.trim();
    let (date, time) = content.split_once(' ')?;

    let mut date = date.split('-');
    let y = date.next()?.parse::<i32>().ok()?;
    let m = date.next()?.parse::<u8>().ok()?;
    let d = date.next()?.parse::<u8>().ok()?;

    let mut time = time.trim().split(':');
    let hh = time.next()?.parse::<u8>().ok()?;
    let mm = time.next()?.parse::<u8>().ok()?;
    let ss = time.next()?.parse::<u8>().ok()?;

    if !(1..=12).contains(&m) || !(1..=31).contains(&d) || hh > 23 || mm > 59 || ss > 60 {
        return None;
    }
    Some(Epoch::from_gregorian_utc(y, m, d, hh, mm, ss, 0))
}

/// Formats given unix timestamp (s) as `YYYY-MM-DDTHH:MM:SS.mmm`
pub fn format_iso(unix_seconds: f64) -> String {
    let (y, m, d, hh, mm, ss, ns) = Epoch::from_unix_seconds(unix_seconds).to_gregorian_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        y,
        m,
        d,
        hh,
        mm,
        ss,
        ns / 1_000_000
    )
}
