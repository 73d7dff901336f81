use serde::Serialize;

use reco_core::domain::feedback::{PmfScore, ReactionAction};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

/// Serializes as Telegram's `InlineKeyboardMarkup`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.inline_keyboard.iter().flatten()
    }
}

#[derive(Default)]
pub struct KeyboardBuilder {
    rows: Vec<Vec<InlineButton>>,
    current: Vec<InlineButton>,
}

impl KeyboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn button(mut self, label: impl Into<String>, data: &CallbackData) -> Self {
        self.current.push(InlineButton::new(label, data.encode()));
        self
    }

    pub fn row(mut self) -> Self {
        if !self.current.is_empty() {
            self.rows.push(std::mem::take(&mut self.current));
        }
        self
    }

    pub fn build(self) -> InlineKeyboard {
        let Self { mut rows, current } = self;
        if !current.is_empty() {
            rows.push(current);
        }
        InlineKeyboard { inline_keyboard: rows }
    }
}

/// Payload carried by every button this bot sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackData {
    Pmf(PmfScore),
    WipeConfirm,
    WipeCancel,
    Reaction { action: ReactionAction, useful: bool },
    Unknown(String),
}

impl CallbackData {
    pub fn parse(raw: &str) -> Self {
        let unknown = || Self::Unknown(raw.to_owned());
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("pmf"), Some(score), None, None) => score
                .parse::<u8>()
                .ok()
                .and_then(|score| PmfScore::new(score).ok())
                .map_or_else(unknown, Self::Pmf),
            (Some("wipe"), Some("yes"), None, None) => Self::WipeConfirm,
            (Some("wipe"), Some("no"), None, None) => Self::WipeCancel,
            (Some("ux"), Some(action), Some(flag), None) => {
                let useful = match flag {
                    "1" => true,
                    "0" => false,
                    _ => return unknown(),
                };
                action
                    .parse::<ReactionAction>()
                    .map_or_else(|_| unknown(), |action| Self::Reaction { action, useful })
            }
            _ => unknown(),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Pmf(score) => format!("pmf:{}", score.value()),
            Self::WipeConfirm => "wipe:yes".to_owned(),
            Self::WipeCancel => "wipe:no".to_owned(),
            Self::Reaction { action, useful } => {
                format!("ux:{}:{}", action.as_str(), u8::from(*useful))
            }
            Self::Unknown(raw) => raw.clone(),
        }
    }
}

/// Scores 1-3 on the first row, 4-5 on the second.
pub fn pmf_keyboard() -> InlineKeyboard {
    (PmfScore::MIN..=PmfScore::MAX)
        .filter_map(|value| PmfScore::new(value).ok())
        .fold(KeyboardBuilder::new(), |builder, score| {
            let builder = if score.value() == 4 { builder.row() } else { builder };
            builder.button(score.value().to_string(), &CallbackData::Pmf(score))
        })
        .build()
}

pub fn wipe_keyboard() -> InlineKeyboard {
    KeyboardBuilder::new()
        .button("✅ Sí, borrar todo", &CallbackData::WipeConfirm)
        .button("❌ No, cancelar", &CallbackData::WipeCancel)
        .build()
}

pub fn usefulness_keyboard(action: ReactionAction) -> InlineKeyboard {
    KeyboardBuilder::new()
        .button("👍 Útil", &CallbackData::Reaction { action, useful: true })
        .button("👎 No", &CallbackData::Reaction { action, useful: false })
        .build()
}

#[cfg(test)]
mod tests {
    use reco_core::domain::feedback::{PmfScore, ReactionAction};

    use super::{pmf_keyboard, usefulness_keyboard, wipe_keyboard, CallbackData};

    #[test]
    fn pmf_keyboard_has_two_rows_of_scores() {
        let keyboard = pmf_keyboard();
        let rows: Vec<Vec<&str>> = keyboard
            .inline_keyboard
            .iter()
            .map(|row| row.iter().map(|button| button.callback_data.as_str()).collect())
            .collect();

        assert_eq!(rows, vec![vec!["pmf:1", "pmf:2", "pmf:3"], vec!["pmf:4", "pmf:5"]]);
    }

    #[test]
    fn keyboards_serialize_as_inline_markup() {
        let json = serde_json::to_value(wipe_keyboard()).expect("serialize");
        assert_eq!(json["inline_keyboard"][0][0]["callback_data"], "wipe:yes");
        assert_eq!(json["inline_keyboard"][0][1]["callback_data"], "wipe:no");
        assert_eq!(usefulness_keyboard(ReactionAction::Edit).buttons().count(), 2);
    }

    #[test]
    fn callback_payloads_parse() {
        assert_eq!(
            CallbackData::parse("pmf:4"),
            CallbackData::Pmf(PmfScore::new(4).expect("valid score"))
        );
        assert_eq!(CallbackData::parse("wipe:yes"), CallbackData::WipeConfirm);
        assert_eq!(CallbackData::parse("wipe:no"), CallbackData::WipeCancel);
        assert_eq!(
            CallbackData::parse("ux:query:0"),
            CallbackData::Reaction { action: ReactionAction::Query, useful: false }
        );
    }

    #[test]
    fn malformed_payloads_are_unknown() {
        for raw in ["pmf:6", "pmf:x", "wipe:maybe", "ux:list:1", "ux:save:2", "ux:save:1:extra", ""] {
            assert_eq!(CallbackData::parse(raw), CallbackData::Unknown(raw.to_owned()), "{raw}");
        }
    }

    #[test]
    fn encode_matches_parse() {
        let reaction = CallbackData::Reaction { action: ReactionAction::Delete, useful: true };
        assert_eq!(reaction.encode(), "ux:delete:1");
        assert_eq!(CallbackData::parse(&reaction.encode()), reaction);
    }
}
