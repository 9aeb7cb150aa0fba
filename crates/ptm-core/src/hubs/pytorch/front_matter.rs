//! Front matter of PyTorch Hub model pages.
//!
//! Each page starts with a block of `key: value` lines between two `---`
//! delimiters:
//!
//! ```text
//! ---
//! layout: hub_detail
//! title: ResNet
//! github-link: https://github.com/pytorch/vision/blob/main/torchvision/models/resnet.py
//! tags: [vision, scriptable]
//! ---
//! ```

use crate::record::RawRecord;
use serde_json::Value;

const DELIMITER: &str = "---";
const SEPARATOR: &str = ": ";

/// Corpus files that are not model pages.
const SKIPPED_FILES: [&str; 3] = ["README", "CONTRIBUTING", "CODE_OF_CONDUCT"];

pub fn is_model_page(file_name: &str) -> bool {
    !SKIPPED_FILES.iter().any(|skip| file_name.contains(skip))
}

/// Parse the text between the first pair of `---` delimiters.
///
/// Keys and values are split on the first `": "` and trimmed; lines without
/// the separator are ignored. Returns `None` when the text has no front
/// matter block.
pub fn parse_front_matter(text: &str) -> Option<RawRecord> {
    let mut sections = text.split(DELIMITER);
    sections.next()?;
    let block = sections.next()?;
    // A single delimiter does not open a block.
    sections.next()?;

    let fields = block
        .lines()
        .filter_map(|line| line.split_once(SEPARATOR))
        .map(|(key, value)| (key.trim().to_string(), Value::String(value.trim().to_string())))
        .filter(|(key, _)| !key.is_empty())
        .collect();
    Some(fields)
}
