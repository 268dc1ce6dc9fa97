//! Reading the `phones` tier of a Praat TextGrid.
//!
//! Files go through the `textgrid` crate first. It only accepts the layout
//! its own writer produces, so Praat and MFA output (blank line after the
//! header, `<exists>` in the short format, zero-length intervals) falls back
//! to a line scan over either text format.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use textgrid::{TextGrid, TierType};

use crate::types::Segment;

pub const PHONES_TIER: &str = "phones";

/// Intervals of the `phones` IntervalTier, matched case-insensitively.
pub fn phones(path: &Path) -> Result<Vec<Segment>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read TextGrid: {}", path.display()))?;

    // textgrid 0.1 panics on long-format point tiers
    if !contents.contains("\"TextTier\"") {
        match phones_with_textgrid_crate(path) {
            Ok(segments) => return Ok(segments),
            Err(e) => log::debug!("textgrid crate rejected {}: {:#}", path.display(), e),
        }
    }
    phones_from_str(&contents).with_context(|| format!("Failed to parse TextGrid: {}", path.display()))
}

fn phones_with_textgrid_crate(path: &Path) -> Result<Vec<Segment>> {
    let textgrid = TextGrid::from_file(path)?;
    let tier = textgrid
        .tiers
        .iter()
        .find(|tier| tier.tier_type == TierType::IntervalTier && tier.name.eq_ignore_ascii_case(PHONES_TIER))
        .ok_or_else(|| anyhow!("Missing IntervalTier named '{}'", PHONES_TIER))?;

    Ok(tier
        .intervals
        .iter()
        .map(|interval| Segment::new(interval.xmin, interval.xmax, &interval.text.replace("\"\"", "\"")))
        .collect())
}

/// Parse the `phones` tier out of TextGrid text in the long or short format.
///
/// Long-format lines are reduced to their values, which leaves the same
/// value stream the short format holds.
pub fn phones_from_str(contents: &str) -> Result<Vec<Segment>> {
    let mut lines = contents.trim_start_matches('\u{feff}').lines().map(str::trim);
    if !lines.next().is_some_and(|l| l.starts_with("File type = \"ooTextFile")) {
        bail!("Not a Praat text file");
    }
    if lines.next() != Some("Object class = \"TextGrid\"") {
        bail!("Not a TextGrid");
    }

    let mut values = lines.filter_map(field_value);
    number(&mut values)?;
    number(&mut values)?;
    let n_tiers = count(&mut values)?;

    for _ in 0..n_tiers {
        let class = string(&mut values)?;
        let name = string(&mut values)?;
        number(&mut values)?;
        number(&mut values)?;
        let n = count(&mut values)?;

        match class.as_str() {
            "IntervalTier" => {
                let mut segments = Vec::with_capacity(n);
                for _ in 0..n {
                    let start = number(&mut values)?;
                    let end = number(&mut values)?;
                    segments.push(Segment::new(start, end, &string(&mut values)?));
                }
                if name.eq_ignore_ascii_case(PHONES_TIER) {
                    return Ok(segments);
                }
            }
            "TextTier" => {
                for _ in 0..n {
                    number(&mut values)?;
                    string(&mut values)?;
                }
            }
            other => bail!("Unknown tier class '{}'", other),
        }
    }
    bail!("Missing IntervalTier named '{}'", PHONES_TIER)
}

fn field_value(line: &str) -> Option<&str> {
    if line.is_empty()
        || line.contains("<exists>")
        || line.starts_with("item [")
        || line.starts_with("intervals [")
        || line.starts_with("points [")
    {
        return None;
    }
    if line.starts_with('"') {
        return Some(line);
    }
    Some(line.split_once(" = ").map_or(line, |(_, v)| v.trim()))
}

fn next_value<'a>(values: &mut impl Iterator<Item = &'a str>) -> Result<&'a str> {
    values.next().context("Unexpected end of TextGrid")
}

fn number<'a>(values: &mut impl Iterator<Item = &'a str>) -> Result<f64> {
    let v = next_value(values)?;
    v.parse().with_context(|| format!("Expected a number, found '{}'", v))
}

fn count<'a>(values: &mut impl Iterator<Item = &'a str>) -> Result<usize> {
    let v = next_value(values)?;
    v.parse().with_context(|| format!("Expected a count, found '{}'", v))
}

fn string<'a>(values: &mut impl Iterator<Item = &'a str>) -> Result<String> {
    let v = next_value(values)?;
    let inner = v
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .with_context(|| format!("Expected a quoted string, found '{}'", v))?;
    Ok(inner.replace("\"\"", "\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use textgrid::{Interval, Tier};

    const LONG: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0
xmax = 0.65
tiers? <exists>
size = 2
item []:
    item [1]:
        class = "IntervalTier"
        name = "words"
        xmin = 0
        xmax = 0.65
        intervals: size = 1
        intervals [1]:
            xmin = 0
            xmax = 0.65
            text = "cat"
    item [2]:
        class = "IntervalTier"
        name = "phones"
        xmin = 0
        xmax = 0.65
        intervals: size = 3
        intervals [1]:
            xmin = 0
            xmax = 0.1
            text = "sil"
        intervals [2]:
            xmin = 0.1
            xmax = 0.3
            text = "K"
        intervals [3]:
            xmin = 0.3
            xmax = 0.65
            text = ""
"#;

    const SHORT: &str = r#"File type = "ooTextFile"
Object class = "TextGrid"

0
1.5
<exists>
2
"TextTier"
"events"
0
1.5
1
0.75
"click"
"IntervalTier"
"PHONES"
0
1.5
2
0
0.5
"a ""quoted"" label"
0.5
1.5
"b"
"#;

    fn write(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("utt.TextGrid");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let segs = phones(&write(dir.path(), LONG)).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1], Segment::new(0.1, 0.3, "K"));
        assert_eq!(segs[2].label, "");
    }

    #[test]
    fn test_short_format_with_point_tier() {
        let dir = tempfile::tempdir().unwrap();
        let segs = phones(&write(dir.path(), SHORT)).unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].label, "a \"quoted\" label");
        assert_eq!(segs[1], Segment::new(0.5, 1.5, "b"));
    }

    #[test]
    fn test_praat_layout_needs_line_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), LONG);
        assert!(phones_with_textgrid_crate(&path).is_err());
        assert_eq!(phones_from_str(LONG).unwrap().len(), 3);
    }

    #[test]
    fn test_reads_textgrid_crate_output() {
        let mut tg = TextGrid::new(0.0, 0.6).unwrap();
        tg.add_tier(Tier {
            name: "Phones".to_string(),
            tier_type: TierType::IntervalTier,
            xmin: 0.0,
            xmax: 0.6,
            intervals: vec![
                Interval { xmin: 0.0, xmax: 0.2, text: "sil".into() },
                Interval { xmin: 0.2, xmax: 0.6, text: "AA1".into() },
            ],
            points: Vec::new(),
        })
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        for short in [false, true] {
            let path = dir.path().join(format!("out-{short}.TextGrid"));
            tg.to_file(&path, short).unwrap();
            let expected = vec![Segment::new(0.0, 0.2, "sil"), Segment::new(0.2, 0.6, "AA1")];
            assert_eq!(phones_with_textgrid_crate(&path).unwrap(), expected);
            assert_eq!(phones(&path).unwrap(), expected);
        }
    }

    #[test]
    fn test_missing_phones_tier() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &LONG.replace("\"phones\"", "\"syllables\""));
        let err = phones(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Missing IntervalTier named 'phones'"));
    }

    #[test]
    fn test_phones_must_be_interval_tier() {
        let swapped = SHORT.replace("\"PHONES\"", "\"words\"").replace("\"events\"", "\"phones\"");
        assert!(phones_from_str(&swapped).is_err());
    }

    #[test]
    fn test_rejects_non_textgrid() {
        assert!(phones_from_str("File type = \"ooTextFile\"\nObject class = \"Pitch\"\n").is_err());
        assert!(phones_from_str("").is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(phones(&dir.path().join("absent.TextGrid")).is_err());
    }

    #[test]
    fn test_truncated_file() {
        let truncated = &LONG[..LONG.find("intervals [3]").unwrap()];
        assert!(phones_from_str(truncated).is_err());
    }

    #[test]
    fn test_byte_order_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &format!("\u{feff}{}", LONG));
        assert_eq!(phones(&path).unwrap().len(), 3);
    }
}
