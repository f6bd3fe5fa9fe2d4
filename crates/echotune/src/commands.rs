// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator command and callback parsing.
//!
//! Commands arrive as `/name` chat messages with whitespace-split arguments;
//! `/name@botname` addressing is tolerated. Inline-button callbacks are
//! plain strings matched by prefix.

/// A fully parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { query: String },
    VPlay { query: String },
    Skip,
    Stop,
    Pause,
    Resume,
    Mute,
    Unmute,
    Seek { seconds: u64 },
    Speed { value: f64 },
    Loop { count: u32 },
    Remove { position: usize },
    Queue,
    Settings,
    Auth,
    Unauth,
    AuthList,
    Reload,
}

/// Loop counts are clamped to a small range to bound replay storms.
pub const MAX_LOOP: u32 = 10;

/// Parses a chat message into a command.
///
/// Returns `None` for non-command text or commands addressed to another
/// bot; `Some(Err(usage))` carries the reply for malformed arguments.
pub fn parse_command(text: &str, bot_username: &str) -> Option<Result<Command, String>> {
    let text = text.trim();
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let name = head.strip_prefix('/')?;

    // `/play@OtherBot` belongs to another bot in the same chat.
    let name = match name.split_once('@') {
        Some((name, addressee)) => {
            if !addressee.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => name,
    };

    let args: Vec<&str> = parts.collect();
    let arg_text = args.join(" ");

    let parsed = match name.to_ascii_lowercase().as_str() {
        "play" => Ok(Command::Play { query: arg_text }),
        "vplay" => Ok(Command::VPlay { query: arg_text }),
        "skip" => Ok(Command::Skip),
        "stop" | "end" => Ok(Command::Stop),
        "pause" => Ok(Command::Pause),
        "resume" => Ok(Command::Resume),
        "mute" => Ok(Command::Mute),
        "unmute" => Ok(Command::Unmute),
        "seek" => match arg_text.parse::<u64>() {
            Ok(seconds) if seconds >= 20 => Ok(Command::Seek { seconds }),
            Ok(_) => Err("The minimum seek time is 20 seconds.".to_string()),
            Err(_) => Err("Usage: /seek [seconds]".to_string()),
        },
        "speed" => match arg_text.parse::<f64>() {
            Ok(value) if (0.5..=4.0).contains(&value) => Ok(Command::Speed { value }),
            Ok(_) => Err("The speed must be between 0.5 and 4.0.".to_string()),
            Err(_) => Err("Usage: /speed [value between 0.5 and 4.0]".to_string()),
        },
        "loop" => match arg_text.parse::<u32>() {
            Ok(count) if count <= MAX_LOOP => Ok(Command::Loop { count }),
            Ok(_) => Err(format!("The loop count must be between 0 and {MAX_LOOP}.")),
            Err(_) => Err("Usage: /loop [count]".to_string()),
        },
        "remove" => match arg_text.parse::<usize>() {
            Ok(position) if position >= 1 => Ok(Command::Remove { position }),
            Ok(_) => Err("Track numbers start at 1.".to_string()),
            Err(_) => Err("Usage: /remove [track number]".to_string()),
        },
        "queue" => Ok(Command::Queue),
        "settings" => Ok(Command::Settings),
        "auth" => Ok(Command::Auth),
        "unauth" => Ok(Command::Unauth),
        "authlist" => Ok(Command::AuthList),
        "reload" => Ok(Command::Reload),
        _ => return None,
    };

    Some(parsed)
}

/// A parsed inline-button callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Skip,
    Stop,
    Pause,
    Resume,
    Mute,
    Unmute,
    AddToPlaylist,
    Close,
    Help(String),
    Settings { kind: String, value: String },
    SetLang(String),
}

/// Matches a callback payload by prefix.
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    match data {
        "play_skip" => return Some(CallbackAction::Skip),
        "play_stop" => return Some(CallbackAction::Stop),
        "play_pause" => return Some(CallbackAction::Pause),
        "play_resume" => return Some(CallbackAction::Resume),
        "play_mute" => return Some(CallbackAction::Mute),
        "play_unmute" => return Some(CallbackAction::Unmute),
        "play_add_to_list" => return Some(CallbackAction::AddToPlaylist),
        "vcplay_close" => return Some(CallbackAction::Close),
        _ => {}
    }

    if let Some(topic) = data.strip_prefix("help_") {
        return Some(CallbackAction::Help(topic.to_string()));
    }
    if let Some(code) = data.strip_prefix("setlang_") {
        return Some(CallbackAction::SetLang(code.to_string()));
    }
    if let Some(rest) = data.strip_prefix("settings_") {
        let (kind, value) = rest.split_once('_')?;
        return Some(CallbackAction::Settings {
            kind: kind.to_string(),
            value: value.to_string(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "EchotuneBot";

    fn ok(text: &str) -> Command {
        parse_command(text, BOT).unwrap().unwrap()
    }

    #[test]
    fn play_collects_the_full_query() {
        assert_eq!(
            ok("/play never gonna give you up"),
            Command::Play {
                query: "never gonna give you up".into()
            }
        );
        assert_eq!(
            ok("/vplay https://youtu.be/dQw4w9WgXcQ"),
            Command::VPlay {
                query: "https://youtu.be/dQw4w9WgXcQ".into()
            }
        );
    }

    #[test]
    fn bare_controls_parse() {
        assert_eq!(ok("/skip"), Command::Skip);
        assert_eq!(ok("/stop"), Command::Stop);
        assert_eq!(ok("/end"), Command::Stop);
        assert_eq!(ok("/pause"), Command::Pause);
        assert_eq!(ok("/resume"), Command::Resume);
        assert_eq!(ok("/mute"), Command::Mute);
        assert_eq!(ok("/unmute"), Command::Unmute);
        assert_eq!(ok("/queue"), Command::Queue);
        assert_eq!(ok("/reload"), Command::Reload);
    }

    #[test]
    fn addressed_commands_filter_by_bot() {
        assert_eq!(ok("/skip@EchotuneBot"), Command::Skip);
        assert_eq!(ok("/skip@echotunebot"), Command::Skip);
        assert!(parse_command("/skip@SomeOtherBot", BOT).is_none());
    }

    #[test]
    fn non_commands_are_ignored() {
        assert!(parse_command("hello there", BOT).is_none());
        assert!(parse_command("/unknowncommand", BOT).is_none());
        assert!(parse_command("", BOT).is_none());
    }

    #[test]
    fn seek_enforces_floor() {
        assert_eq!(ok("/seek 30"), Command::Seek { seconds: 30 });
        assert!(parse_command("/seek 5", BOT).unwrap().is_err());
        assert!(parse_command("/seek abc", BOT).unwrap().is_err());
        assert!(parse_command("/seek", BOT).unwrap().is_err());
    }

    #[test]
    fn speed_enforces_range() {
        assert_eq!(ok("/speed 1.5"), Command::Speed { value: 1.5 });
        assert!(parse_command("/speed 0.1", BOT).unwrap().is_err());
        assert!(parse_command("/speed 9", BOT).unwrap().is_err());
    }

    #[test]
    fn loop_enforces_range() {
        assert_eq!(ok("/loop 0"), Command::Loop { count: 0 });
        assert_eq!(ok("/loop 10"), Command::Loop { count: 10 });
        assert!(parse_command("/loop 11", BOT).unwrap().is_err());
    }

    #[test]
    fn remove_requires_positive_position() {
        assert_eq!(ok("/remove 2"), Command::Remove { position: 2 });
        assert!(parse_command("/remove 0", BOT).unwrap().is_err());
    }

    #[test]
    fn callback_prefix_table() {
        assert_eq!(parse_callback("play_skip"), Some(CallbackAction::Skip));
        assert_eq!(parse_callback("play_stop"), Some(CallbackAction::Stop));
        assert_eq!(parse_callback("play_pause"), Some(CallbackAction::Pause));
        assert_eq!(parse_callback("play_resume"), Some(CallbackAction::Resume));
        assert_eq!(parse_callback("play_mute"), Some(CallbackAction::Mute));
        assert_eq!(parse_callback("play_unmute"), Some(CallbackAction::Unmute));
        assert_eq!(
            parse_callback("play_add_to_list"),
            Some(CallbackAction::AddToPlaylist)
        );
        assert_eq!(parse_callback("vcplay_close"), Some(CallbackAction::Close));
        assert_eq!(
            parse_callback("help_commands"),
            Some(CallbackAction::Help("commands".into()))
        );
        assert_eq!(
            parse_callback("settings_playmode_admins"),
            Some(CallbackAction::Settings {
                kind: "playmode".into(),
                value: "admins".into()
            })
        );
        assert_eq!(
            parse_callback("setlang_de"),
            Some(CallbackAction::SetLang("de".into()))
        );
        assert_eq!(parse_callback("unrelated"), None);
    }
}
