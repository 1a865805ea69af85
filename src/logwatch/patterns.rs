//! Game log line recognition
//!
//! Maps one log line to at most one [`LogEvent`]. Only the handful of lines
//! the session machine cares about are recognized; everything else is `None`.

use thiserror::Error;

const MATCHMAKING_START: &str =
    "LogAthenaMatchmakingWidget: UFortAthenaMatchmakingWidgetLegacy::RequestMatchmakingStart";
const MATCHMAKING_CANCELED: &str = "LogMatchmakingServiceClient: HandleError - Type: 'Canceled'";
const PLAYLIST_BATTLE_STAGE: &str = "Playlist_PilgrimBattleStage";
const PLAYLIST_MAIN_STAGE: &str = "Playlist_PilgrimQuickplay";
const RETURN_TO_MAIN_MENU: &str = "LogOnlineGame: FortPC::ReturnToMainMenu";
const SONG_TO_PLAY: &str = "LogPilgrimMusicBattle: Client -1 received song to play:";
const SONG_ID_MARKER: &str = "received song to play:";
const SONG_ID_DELIMITER: &str = " - ";
const GEM_BREAK_INIT: &str = "LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init:";
const TRACK_MARKER: &str = "using track ";
const DIFFICULTY_MARKER: &str = " and Difficulty ";
const SLEEP_ENTERED: &str = "LogFortPlaytimeManager: UFortPlaytimeManager::SetPlaytimeState - Changing Playtime State from Unblocked to Sleep";
const SLEEP_LEFT: &str = "LogFortPlaytimeManager: UFortPlaytimeManager::SetPlaytimeState - Changing Playtime State from Sleep to Unblocked";

const QUICKPLAY_ENTERING: &str =
    "LogPilgrimQuickplayStateMachine: Display: (Client -1)Entering Pilgrim Quickplay state EPilgrimQuickplayState::";
const QUICKPLAY_LEAVING: &str =
    "LogPilgrimQuickplayStateMachine: Display: (Client -1)Leaving Pilgrim Quickplay state EPilgrimQuickplayState::";

/// Quickplay state machine transitions, keyed by (entering, state name)
const QUICKPLAY_TRANSITIONS: &[(bool, &str, LogEvent)] = &[
    (true, "Pregame", LogEvent::BackstageEntered),
    (false, "Pregame", LogEvent::BackstageLeft),
    (true, "Loading", LogEvent::LoadingStarted),
    (false, "SongGameplay", LogEvent::SongGameplayEnded),
    (true, "SongResults", LogEvent::SongResultsEntered),
    (false, "SongResults", LogEvent::SongResultsLeft),
];

/// A recognized game log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    MatchmakingStarted,
    MatchmakingCanceled,
    /// Battle Stage playlist
    BattleStageSelected,
    /// Main Stage (quickplay) playlist
    MainStageSelected,
    BackstageEntered,
    BackstageLeft,
    LoadingStarted,
    ReturnedToMainMenu,
    /// Song chosen for the round; id is lowercased
    SongSelected { song_id: String },
    SongGameplayEnded,
    SongResultsEntered,
    SongResultsLeft,
    /// Gameplay started for one part
    PartStarted {
        /// Lowercased instrument token (`guitar`, `drum`, `plasticbass`, ...)
        track: String,
        /// Difficulty token (`DifficultyHard`, ...)
        difficulty: String,
    },
    SleepEntered,
    SleepLeft,
}

impl LogEvent {
    /// Short name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::MatchmakingStarted => "matchmaking_started",
            LogEvent::MatchmakingCanceled => "matchmaking_canceled",
            LogEvent::BattleStageSelected => "battle_stage_selected",
            LogEvent::MainStageSelected => "main_stage_selected",
            LogEvent::BackstageEntered => "backstage_entered",
            LogEvent::BackstageLeft => "backstage_left",
            LogEvent::LoadingStarted => "loading_started",
            LogEvent::ReturnedToMainMenu => "returned_to_main_menu",
            LogEvent::SongSelected { .. } => "song_selected",
            LogEvent::SongGameplayEnded => "song_gameplay_ended",
            LogEvent::SongResultsEntered => "song_results_entered",
            LogEvent::SongResultsLeft => "song_results_left",
            LogEvent::PartStarted { .. } => "part_started",
            LogEvent::SleepEntered => "sleep_entered",
            LogEvent::SleepLeft => "sleep_left",
        }
    }
}

/// A line carried a known marker but not the expected token layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("song line has no song id")]
    MissingSongId,
    #[error("instrument/difficulty line does not match 'using track <track> and Difficulty <difficulty>'")]
    MalformedPart,
}

/// Recognize a single log line
pub fn recognize(line: &str) -> Result<Option<LogEvent>, PatternError> {
    if line.contains(MATCHMAKING_START) {
        return Ok(Some(LogEvent::MatchmakingStarted));
    }
    if line.contains(MATCHMAKING_CANCELED) {
        return Ok(Some(LogEvent::MatchmakingCanceled));
    }
    if line.contains(RETURN_TO_MAIN_MENU) {
        return Ok(Some(LogEvent::ReturnedToMainMenu));
    }
    if line.contains(SONG_TO_PLAY) {
        return parse_song_id(line).map(|song_id| Some(LogEvent::SongSelected { song_id }));
    }
    if line.contains(GEM_BREAK_INIT) {
        return parse_part(line).map(Some);
    }
    if let Some(event) = quickplay_transition(line) {
        return Ok(Some(event));
    }
    if line.contains(SLEEP_ENTERED) {
        return Ok(Some(LogEvent::SleepEntered));
    }
    if line.contains(SLEEP_LEFT) {
        return Ok(Some(LogEvent::SleepLeft));
    }
    if line.contains(PLAYLIST_BATTLE_STAGE) {
        return Ok(Some(LogEvent::BattleStageSelected));
    }
    if line.contains(PLAYLIST_MAIN_STAGE) {
        return Ok(Some(LogEvent::MainStageSelected));
    }
    Ok(None)
}

fn quickplay_transition(line: &str) -> Option<LogEvent> {
    let (entering, state) = if let Some((_, rest)) = line.split_once(QUICKPLAY_ENTERING) {
        (true, rest)
    } else if let Some((_, rest)) = line.split_once(QUICKPLAY_LEAVING) {
        (false, rest)
    } else {
        return None;
    };

    let state = state.split_whitespace().next().unwrap_or("");
    QUICKPLAY_TRANSITIONS
        .iter()
        .find(|(e, name, _)| *e == entering && *name == state)
        .map(|(_, _, event)| event.clone())
}

/// Text between the song marker and the following ` - `, lowercased
fn parse_song_id(line: &str) -> Result<String, PatternError> {
    let (_, rest) = line
        .split_once(SONG_ID_MARKER)
        .ok_or(PatternError::MissingSongId)?;
    let raw = rest
        .split_once(SONG_ID_DELIMITER)
        .map(|(id, _)| id)
        .unwrap_or(rest);
    let song_id = raw.trim().to_lowercase();

    if song_id.is_empty() {
        return Err(PatternError::MissingSongId);
    }
    Ok(song_id)
}

/// `... using track EPilgrimTrackType::TrackGuitar and Difficulty EPilgrimSongDifficulty::DifficultyHard`
fn parse_part(line: &str) -> Result<LogEvent, PatternError> {
    let (_, rest) = line
        .split_once(TRACK_MARKER)
        .ok_or(PatternError::MalformedPart)?;
    let (track, difficulty) = rest
        .split_once(DIFFICULTY_MARKER)
        .ok_or(PatternError::MalformedPart)?;

    let track = last_segment(track.trim()).replace("Track", "").to_lowercase();
    let difficulty = difficulty
        .split_whitespace()
        .next()
        .map(last_segment)
        .unwrap_or("")
        .to_string();

    if track.is_empty() || difficulty.is_empty() {
        return Err(PatternError::MalformedPart);
    }
    Ok(LogEvent::PartStarted { track, difficulty })
}

fn last_segment(token: &str) -> &str {
    token.rsplit("::").next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "[2024.06.01-19.21.07:123][512]";

    fn line(body: &str) -> String {
        format!("{}{}", PREFIX, body)
    }

    #[test]
    fn test_unrecognized_line() {
        assert_eq!(recognize("LogNet: Display: nothing to see").unwrap(), None);
        assert_eq!(recognize("").unwrap(), None);
    }

    #[test]
    fn test_matchmaking_lines() {
        assert_eq!(
            recognize(&line("LogAthenaMatchmakingWidget: UFortAthenaMatchmakingWidgetLegacy::RequestMatchmakingStart bCanMatchmake: 1")).unwrap(),
            Some(LogEvent::MatchmakingStarted)
        );
        assert_eq!(
            recognize(&line("LogMatchmakingServiceClient: HandleError - Type: 'Canceled' Code: 'None'")).unwrap(),
            Some(LogEvent::MatchmakingCanceled)
        );
    }

    #[test]
    fn test_playlist_variants() {
        assert_eq!(
            recognize(&line("LogFortPlaylist: Selected /PilgrimBattleStage/Playlist_PilgrimBattleStage.Playlist_PilgrimBattleStage")).unwrap(),
            Some(LogEvent::BattleStageSelected)
        );
        assert_eq!(
            recognize(&line("LogFortPlaylist: Selected /PilgrimQuickplay/Playlist_PilgrimQuickplay.Playlist_PilgrimQuickplay")).unwrap(),
            Some(LogEvent::MainStageSelected)
        );
    }

    #[test]
    fn test_quickplay_transitions() {
        let cases = [
            ("Entering", "Pregame", LogEvent::BackstageEntered),
            ("Leaving", "Pregame", LogEvent::BackstageLeft),
            ("Entering", "Loading", LogEvent::LoadingStarted),
            ("Leaving", "SongGameplay", LogEvent::SongGameplayEnded),
            ("Entering", "SongResults", LogEvent::SongResultsEntered),
            ("Leaving", "SongResults", LogEvent::SongResultsLeft),
        ];
        for (direction, state, expected) in cases {
            let text = line(&format!(
                "LogPilgrimQuickplayStateMachine: Display: (Client -1){} Pilgrim Quickplay state EPilgrimQuickplayState::{}",
                direction, state
            ));
            assert_eq!(recognize(&text).unwrap(), Some(expected), "{}", text);
        }
    }

    #[test]
    fn test_untracked_quickplay_state_is_ignored() {
        let text = line("LogPilgrimQuickplayStateMachine: Display: (Client -1)Entering Pilgrim Quickplay state EPilgrimQuickplayState::SongGameplay");
        assert_eq!(recognize(&text).unwrap(), None);
    }

    #[test]
    fn test_return_to_main_menu() {
        assert_eq!(
            recognize(&line("LogOnlineGame: FortPC::ReturnToMainMenu (reason: )")).unwrap(),
            Some(LogEvent::ReturnedToMainMenu)
        );
    }

    #[test]
    fn test_song_id_extraction() {
        let text = line("LogPilgrimMusicBattle: Client -1 received song to play: TestSong - Test Artist");
        assert_eq!(
            recognize(&text).unwrap(),
            Some(LogEvent::SongSelected {
                song_id: "testsong".to_string()
            })
        );
    }

    #[test]
    fn test_song_id_without_delimiter() {
        let text = line("LogPilgrimMusicBattle: Client -1 received song to play: AstronautInTheOcean  ");
        assert_eq!(
            recognize(&text).unwrap(),
            Some(LogEvent::SongSelected {
                song_id: "astronautintheocean".to_string()
            })
        );
    }

    #[test]
    fn test_song_line_without_id() {
        let text = line("LogPilgrimMusicBattle: Client -1 received song to play:  - ");
        assert_eq!(recognize(&text), Err(PatternError::MissingSongId));
    }

    #[test]
    fn test_part_started() {
        let text = line("LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: Player 0 using track EPilgrimTrackType::TrackPlasticGuitar and Difficulty EPilgrimSongDifficulty::DifficultyExpert");
        assert_eq!(
            recognize(&text).unwrap(),
            Some(LogEvent::PartStarted {
                track: "plasticguitar".to_string(),
                difficulty: "DifficultyExpert".to_string(),
            })
        );
    }

    #[test]
    fn test_part_started_with_trailing_text() {
        let text = line("LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: using track TrackDrum and Difficulty DifficultyEasy\r");
        assert_eq!(
            recognize(&text).unwrap(),
            Some(LogEvent::PartStarted {
                track: "drum".to_string(),
                difficulty: "DifficultyEasy".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_part_line() {
        let missing_difficulty = line("LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: using track EPilgrimTrackType::TrackGuitar");
        assert_eq!(recognize(&missing_difficulty), Err(PatternError::MalformedPart));

        let missing_track = line("LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: no track info");
        assert_eq!(recognize(&missing_track), Err(PatternError::MalformedPart));

        let empty_difficulty = line("LogPilgrimGemBreakListener: UPilgrimGemBreakListener::Init: using track TrackBass and Difficulty ");
        assert_eq!(recognize(&empty_difficulty), Err(PatternError::MalformedPart));
    }

    #[test]
    fn test_sleep_mode() {
        assert_eq!(
            recognize(&line(SLEEP_ENTERED)).unwrap(),
            Some(LogEvent::SleepEntered)
        );
        assert_eq!(recognize(&line(SLEEP_LEFT)).unwrap(), Some(LogEvent::SleepLeft));
    }
}
