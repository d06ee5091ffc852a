use log::debug;

use crate::{Collab, PlaylistError, RoomData, TransportKind};

const HELP_TEXT: &str = "Send a track id or a track link to add it to the playlist.\n\
/playlist - show the playlist\n\
/next, /prev, /pause, /now - control the player\n\
/notify <text> - show a message to everyone in the room\n\
/help - show this message";

/// A text command, as typed into a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Playlist,
    Transport(TransportKind),
    Notify(String),
    /// Anything that isn't a command is treated as a track reference
    Add(String),
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        let Some(rest) = text.strip_prefix('/') else {
            return Self::Add(text.to_string());
        };

        let (name, argument) = rest
            .split_once(char::is_whitespace)
            .map(|(name, argument)| (name, argument.trim()))
            .unwrap_or((rest, ""));

        // Chat clients address commands to a bot with `/next@bot`
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

        match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "playlist" => Self::Playlist,
            "next" => Self::Transport(TransportKind::Next),
            "prev" => Self::Transport(TransportKind::Prev),
            "pause" => Self::Transport(TransportKind::Pause),
            "now" => Self::Transport(TransportKind::Now),
            "notify" => Self::Notify(argument.to_string()),
            _ => Self::Unknown(text.to_string()),
        }
    }
}

impl Collab {
    /// Runs a text command against a room, returning a reply for the sender
    pub async fn execute(
        &self,
        room: &RoomData,
        command: Command,
    ) -> Result<String, PlaylistError> {
        debug!("Executing {:?} in room {}", command, room.code);

        let reply = match command {
            Command::Start => format!(
                "Room {} is ready. Send a track id or link to add it to the playlist.",
                room.code
            ),
            Command::Help => HELP_TEXT.to_string(),
            Command::Playlist => {
                let tracks = self.playlists.list_playlist(room).await?;

                if tracks.is_empty() {
                    "The playlist is empty.".to_string()
                } else {
                    tracks
                        .iter()
                        .filter_map(|t| t.metadata.as_ref())
                        .enumerate()
                        .map(|(i, m)| format!("{}. {} - {}", i + 1, m.artist, m.title))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Transport(kind) => {
                self.playlists.transport(room, kind);
                format!("Sent {}.", kind)
            }
            Command::Notify(message) if message.is_empty() => {
                "Usage: /notify <text>".to_string()
            }
            Command::Notify(message) => {
                self.playlists.notify(room, message);
                "Notification sent.".to_string()
            }
            Command::Add(reference) => match self.playlists.add_track(room, &reference).await {
                Ok(added) => {
                    let name = added
                        .track
                        .metadata
                        .as_ref()
                        .map(|m| format!("{} - {}", m.artist, m.title))
                        .unwrap_or_else(|| format!("track {}", added.track.track_id));

                    match added.warning {
                        Some(warning) => format!("Added {}.\n{}", name, warning),
                        None => format!("Added {}.", name),
                    }
                }
                Err(PlaylistError::InvalidTrackReference(e)) => e.to_string(),
                Err(PlaylistError::DuplicateTrack { .. }) => {
                    "That track is already in the playlist.".to_string()
                }
                Err(e) => return Err(e),
            },
            Command::Unknown(text) => format!(
                "Unknown command {}. Send /help for the list of commands.",
                text
            ),
        };

        Ok(reply)
    }
}
