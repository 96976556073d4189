//! Restoration prompt and preset instructions.
//!
//! Every prompt string the library sends lives here, so unit tests can
//! inspect them without a live model.
//!
//! Callers can override the template via
//! [`crate::config::RestorationConfig::prompt_template`]; the constant below is
//! used only when no override is provided.

use serde::Serialize;

/// Fixed restoration prompt sent with every image.
pub const RESTORATION_PROMPT: &str = r#"DOCUMENT RESTORATION SYSTEM:

CORE TASK:
1. DETECT SKEW: Identify the tilt angle of the document in the image.
2. AUTO-STRAIGHTEN (DESKEW): Rotate and realign the document so it is perfectly vertical/horizontal. Output must be a straight document.
3. PROPORTIONALITY: Maintain original document aspect ratio but fix any perspective distortion (warp).

TEXT ENHANCEMENT:
- Scan all numbers and text characters.
- Convert gray/faded ink to BOLD PURE BLACK (#000000).
- Ensure maximum contrast against backgrounds.
- Remove paper grain, noise, and photocopy artifacts.

COLORIZATION STYLE:
- Use professional digital colors (Excel-like).
- Header: Navy Blue or Forest Green with White Text.
- Grid: Dark Gray solid lines.
- Rows: Clean White or very light gray alternates.

FINAL OUTPUT:
- A perfectly straight, clear, and professional-looking digital table/document."#;

/// Label stored in history when a transform ran without any instruction.
pub const DEFAULT_INSTRUCTION_LABEL: &str = "Auto-Aligned Restoration";

/// Build the full prompt: the template, plus the user's instruction verbatim
/// when it is non-empty.
pub fn build_prompt(template: &str, instruction: &str) -> String {
    if instruction.is_empty() {
        template.to_string()
    } else {
        format!("{template}\n\nADDITIONAL USER REQUEST: {instruction}")
    }
}

/// A named, fixed instruction offered as a one-click alternative to free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub label: &'static str,
    pub prompt: &'static str,
}

/// The preset catalog, in display order.
pub const PRESETS: [Preset; 3] = [
    Preset {
        label: "Ultra Sharp Excel",
        prompt: "Prioritize text sharpness. Pure black ink, crisp characters, Excel blue headers. Auto-straighten and deskew the document.",
    },
    Preset {
        label: "High Contrast Green",
        prompt: "Maximum contrast between text and background. Emerald green theme. Auto-straighten and deskew.",
    },
    Preset {
        label: "Digital Scan (Clean)",
        prompt: "Make it look like a high-quality digital PDF. No grain, no noise, very bold text. Auto-straighten and align.",
    },
];

/// Look a preset up by label (case-insensitive) or by 1-based index.
pub fn find_preset(key: &str) -> Option<&'static Preset> {
    let key = key.trim();
    if let Ok(n) = key.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| PRESETS.get(i));
    }
    PRESETS.iter().find(|p| p.label.eq_ignore_ascii_case(key))
}
