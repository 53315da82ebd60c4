// src/bot/keyboards.rs
// Small inline-keyboard builders for the front door's own flows (reset
// confirmation, activation). The consent and profile-activation keyboards
// sent by the runners themselves live next to their generation logic.

use crate::transport::{CallbackToken, InlineKeyboard, KeyboardButton, ResetAction};

pub fn reset_confirmation(telegram_id: i64) -> InlineKeyboard {
    InlineKeyboard::single_row(vec![
        KeyboardButton {
            label: "Yes, reset".to_string(),
            callback_token: CallbackToken::Reset { action: ResetAction::Confirm, telegram_id },
        },
        KeyboardButton {
            label: "Cancel".to_string(),
            callback_token: CallbackToken::Reset { action: ResetAction::Cancel, telegram_id },
        },
    ])
}
