/// Glyph shown for labels outside the known vocabulary.
pub const UNKNOWN_EMOJI: &str = "❓";

const GESTURE_EMOJIS: [(&str, &str); 10] = [
    ("thumbs_up", "👍"),
    ("call_me", "🤙"),
    ("fingers_crossed", "🤞"),
    ("index_up", "☝️"),
    ("okay", "👌"),
    ("paper", "🖐️"),
    ("rock", "👊"),
    ("rock_on", "🤘"),
    ("scissor", "✌️"),
    ("spock", "🖖"),
];

pub fn known_labels() -> impl Iterator<Item = &'static str> {
    GESTURE_EMOJIS.iter().map(|(label, _)| *label)
}

pub fn emoji_for(label: &str) -> &'static str {
    GESTURE_EMOJIS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, emoji)| *emoji)
        .unwrap_or(UNKNOWN_EMOJI)
}

/// `rock_on` -> `Rock On`. Each run of letters starts upper-case, the rest is lowered.
pub fn pretty_name(label: &str) -> String {
    let mut pretty = String::with_capacity(label.len());
    let mut previous_is_letter = false;
    for c in label.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                pretty.extend(c.to_lowercase());
            } else {
                pretty.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            pretty.push(c);
            previous_is_letter = false;
        }
    }
    pretty
}

/// What the result popup displays for a label.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub emoji: &'static str,
    pub title: String,
}

impl PopupContent {
    pub fn from_label(label: &str) -> Self {
        Self {
            emoji: emoji_for(label),
            title: pretty_name(label),
        }
    }
}
