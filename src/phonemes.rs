/*!
Where phoneme segments come from.

Real alignment is done by an external aligner. This module holds the seam it
plugs into, a naive placeholder that splits text evenly over the audio, and a
reader for segment lists saved as JSON.
*/

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    model::PhonemeSegment,
};

/// Phoneme used for segments that do not name one.
pub const DEFAULT_PHONEME: &str = "a";
/// Length given to segments that do not have an end.
pub const DEFAULT_SEGMENT_LENGTH: f64 = 0.2;

/// Produces timed phoneme segments for a line of text.
pub trait PhonemeSource {
    fn segments(&self, text: &str, total_duration: f64) -> Vec<PhonemeSegment>;
}

/// Normalize user text before alignment.
///
/// Ideographic spaces and line breaks become plain spaces, whitespace runs are
/// collapsed and the result is trimmed.
pub fn normalize_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{3000}')
        .filter(|v| !v.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

const A_ROW: &str = "あぁかがさざただなはばぱまやゃらわゎ";
const I_ROW: &str = "いぃきぎしじちぢにひびぴみりゐ";
const U_ROW: &str = "うぅくぐすずつづぬふぶぷむゆゅるゔ";
const E_ROW: &str = "えぇけげせぜてでねへべぺめれゑ";
const O_ROW: &str = "おぉこごそぞとどのほぼぽもよょろを";

/// Map katakana onto hiragana, leaving everything else alone.
fn to_hiragana(c: char) -> char {
    match c {
        '\u{30A1}'..='\u{30F6}' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
        _ => c,
    }
}

fn vowel_of(c: char) -> Option<&'static str> {
    let c = to_hiragana(c);

    if A_ROW.contains(c) {
        Some("a")
    } else if I_ROW.contains(c) {
        Some("i")
    } else if U_ROW.contains(c) {
        Some("u")
    } else if E_ROW.contains(c) {
        Some("e")
    } else if O_ROW.contains(c) {
        Some("o")
    } else if c == 'ん' {
        Some("n")
    } else {
        match c.to_ascii_lowercase() {
            'a' => Some("a"),
            'i' => Some("i"),
            'u' => Some("u"),
            'e' => Some("e"),
            'o' => Some("o"),
            _ => None,
        }
    }
}

/// Reduce text to a sequence of mouth shapes.
///
/// Kana map to the vowel they end on, `ん` to `n`, romaji vowels to
/// themselves. Small `ゃゅょ` turn a preceding `i` into their own vowel, the
/// long vowel mark repeats the previous vowel, and `っ` is silent. Kanji and
/// other letters fall back to [DEFAULT_PHONEME]. Punctuation and whitespace
/// are skipped.
pub fn text_to_phonemes(text: &str) -> Vec<String> {
    let mut r: Vec<String> = vec![];

    for c in text.chars() {
        let hira = to_hiragana(c);

        match hira {
            'ゃ' | 'ゅ' | 'ょ' if r.last().map(|v| v == "i").unwrap_or(false) => {
                if let (Some(last), Some(vowel)) = (r.last_mut(), vowel_of(hira)) {
                    *last = vowel.to_string();
                }
                continue;
            }
            'ー' => {
                if let Some(last) = r.last().cloned() {
                    r.push(last);
                }
                continue;
            }
            'っ' => continue,
            _ => {}
        }

        if let Some(vowel) = vowel_of(c) {
            r.push(vowel.to_string());
        } else if c.is_alphabetic() {
            r.push(DEFAULT_PHONEME.to_string());
        }
    }

    r
}

/// Placeholder source that gives every phoneme of the text an equal share of
/// the audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvenSplit;

impl PhonemeSource for EvenSplit {
    fn segments(&self, text: &str, total_duration: f64) -> Vec<PhonemeSegment> {
        let phonemes = text_to_phonemes(text);
        if phonemes.is_empty() || total_duration <= 0.0 {
            return vec![];
        }

        let step = total_duration / phonemes.len() as f64;

        phonemes
            .into_iter()
            .enumerate()
            .map(|(i, p)| PhonemeSegment::new(p, i as f64 * step, (i + 1) as f64 * step))
            .collect()
    }
}

/// Segment list as written by hand or by the timeline editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineEdits {
    pub segments: Vec<PhonemeSegment>,
    pub overlap_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    phoneme: Option<String>,
    #[serde(alias = "start_time", default)]
    start: f64,
    #[serde(alias = "end_time")]
    end: Option<f64>,
}

impl From<RawSegment> for PhonemeSegment {
    fn from(value: RawSegment) -> Self {
        PhonemeSegment::new(
            value
                .phoneme
                .unwrap_or_else(|| DEFAULT_PHONEME.to_string()),
            value.start,
            value.end.unwrap_or(value.start + DEFAULT_SEGMENT_LENGTH),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentFile {
    List(Vec<RawSegment>),
    Timeline {
        #[serde(default)]
        phoneme_segments: Vec<RawSegment>,
        overlap_rate: Option<f64>,
    },
}

/// Parse either a bare segment list or a timeline editor document.
pub fn parse_timeline(data: &str) -> Result<TimelineEdits> {
    let r = match serde_json::from_str::<SegmentFile>(data)? {
        SegmentFile::List(v) => TimelineEdits {
            segments: v.into_iter().map(PhonemeSegment::from).collect(),
            overlap_rate: None,
        },
        SegmentFile::Timeline {
            phoneme_segments,
            overlap_rate,
        } => TimelineEdits {
            segments: phoneme_segments
                .into_iter()
                .map(PhonemeSegment::from)
                .collect(),
            overlap_rate,
        },
    };

    Ok(r)
}

pub fn load_timeline(path: &Path) -> Result<TimelineEdits> {
    let data = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

    let r = parse_timeline(&data).map_err(|e| match e {
        Error::Json { error, .. } => Error::json(path, error),
        e => e,
    })?;

    log::debug!(
        "Loaded {} segments from {}",
        r.segments.len(),
        path.display()
    );

    Ok(r)
}

/// Read only the segments of a segment file.
pub fn load_segments(path: &Path) -> Result<Vec<PhonemeSegment>> {
    Ok(load_timeline(path)?.segments)
}
