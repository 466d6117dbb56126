//! Request templating.
//!
//! Paths and bodies may embed `{{...}}` placeholders that are resolved
//! again on every dispatch, so repeated warmup passes do not hit the
//! same cache key over and over:
//!
//! | Placeholder | Renders as |
//! |---|---|
//! | `{{currentTimestamp}}` | unix time in milliseconds |
//! | `{{currentDate}}` | UTC date, `YYYY-MM-DD` |
//! | `{{currentDate\|days+N}}` | UTC date shifted by N days (`days-N` also accepted) |
//! | `{{random\|MIN-MAX}}` | integer in `MIN..=MAX` |
//! | `{{element\|a,b,c}}` | one of the listed values |
//!
//! Placeholders are validated once when the request is parsed. Day
//! offsets are limited to [`MAX_DAY_OFFSET`] so date arithmetic stays in
//! range when rendering.

use std::sync::LazyLock;

use chrono::{TimeDelta, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::error::{ConfigError, ConfigResult};

/// Largest accepted `currentDate` shift, in days, either direction.
pub const MAX_DAY_OFFSET: i64 = 36_500;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placeholder {
    CurrentTimestamp,
    CurrentDate { offset_days: i64 },
    Random { min: i64, max: i64 },
    Element(Vec<String>),
}

/// A string with zero or more placeholders, parsed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> ConfigResult<Self> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for captures in PLACEHOLDER.captures_iter(source) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Literal(source[cursor..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(parse_placeholder(captures[1].trim())?));
            cursor = whole.end();
        }
        if cursor < source.len() {
            segments.push(Segment::Literal(source[cursor..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The unrendered template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether rendering can produce different output on each call.
    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)))
    }

    /// Resolve every placeholder against the current time and a fresh RNG draw.
    pub fn render(&self) -> String {
        if !self.is_dynamic() {
            return self.source.clone();
        }

        let mut rng = rand::thread_rng();
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(Placeholder::CurrentTimestamp) => {
                    out.push_str(&Utc::now().timestamp_millis().to_string());
                }
                Segment::Placeholder(Placeholder::CurrentDate { offset_days }) => {
                    let now = Utc::now();
                    let date = TimeDelta::try_days(*offset_days)
                        .and_then(|delta| now.checked_add_signed(delta))
                        .unwrap_or(now);
                    out.push_str(&date.format("%Y-%m-%d").to_string());
                }
                Segment::Placeholder(Placeholder::Random { min, max }) => {
                    out.push_str(&rng.gen_range(*min..=*max).to_string());
                }
                Segment::Placeholder(Placeholder::Element(values)) => {
                    if let Some(value) = values.choose(&mut rng) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

fn parse_placeholder(raw: &str) -> ConfigResult<Placeholder> {
    let (name, args) = match raw.split_once('|') {
        Some((name, args)) => (name.trim(), Some(args.trim())),
        None => (raw, None),
    };

    let invalid = |reason: &str| ConfigError::InvalidPlaceholder {
        placeholder: raw.to_string(),
        reason: reason.to_string(),
    };

    match (name, args) {
        ("currentTimestamp", None) => Ok(Placeholder::CurrentTimestamp),
        ("currentDate", None) => Ok(Placeholder::CurrentDate { offset_days: 0 }),
        ("currentDate", Some(offset)) => {
            let amount = offset
                .strip_prefix("days")
                .ok_or_else(|| invalid("expected `days+N` or `days-N`"))?;
            let offset_days = amount
                .trim_start_matches('+')
                .parse::<i64>()
                .map_err(|_| invalid("day offset is not an integer"))?;
            if !(-MAX_DAY_OFFSET..=MAX_DAY_OFFSET).contains(&offset_days) {
                return Err(invalid(&format!(
                    "day offset must be within ±{MAX_DAY_OFFSET}"
                )));
            }
            TimeDelta::try_days(offset_days)
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .ok_or_else(|| invalid("day offset is out of range"))?;
            Ok(Placeholder::CurrentDate { offset_days })
        }
        ("random", Some(range)) => {
            // Split on the last '-' that follows a digit so negative bounds still parse.
            let split = range
                .char_indices()
                .skip(1)
                .filter(|(_, c)| *c == '-')
                .map(|(i, _)| i)
                .find(|&i| range[..i].parse::<i64>().is_ok())
                .ok_or_else(|| invalid("expected `MIN-MAX`"))?;
            let min = range[..split]
                .parse::<i64>()
                .map_err(|_| invalid("lower bound is not an integer"))?;
            let max = range[split + 1..]
                .parse::<i64>()
                .map_err(|_| invalid("upper bound is not an integer"))?;
            if min > max {
                return Err(invalid("lower bound exceeds upper bound"));
            }
            Ok(Placeholder::Random { min, max })
        }
        ("element", Some(list)) => {
            let values: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            if values.is_empty() {
                return Err(invalid("element list is empty"));
            }
            Ok(Placeholder::Element(values))
        }
        ("random" | "element", None) => Err(invalid("missing arguments")),
        _ => Err(ConfigError::UnknownPlaceholder(raw.to_string())),
    }
}
