//! Cue sounds played through an external command-line player.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use binsort_kernel::{Cue, Feedback};
use binsort_types::{SortError, WasteCategory};
use tracing::debug;

/// Plays `<sounds_dir>/<cue>.wav` with `player`, waiting for it to finish.
///
/// Blocks for the length of the clip, so wrap it in a
/// [`ThreadedFeedback`][binsort_kernel::ThreadedFeedback].
pub struct PlayerFeedback {
    player: String,
    sounds_dir: PathBuf,
}

impl PlayerFeedback {
    pub fn new(player: impl Into<String>, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sounds_dir: sounds_dir.into(),
        }
    }

    pub fn sound_for(&self, cue: Cue) -> PathBuf {
        self.sounds_dir.join(file_name(cue))
    }
}

fn file_name(cue: Cue) -> &'static str {
    match cue {
        Cue::Category(WasteCategory::Organic) => "organic.wav",
        Cue::Category(WasteCategory::NonOrganic) => "non-organic.wav",
        Cue::Category(WasteCategory::Hazardous) => "b3.wav",
        Cue::Category(WasteCategory::Unknown) | Cue::Unrecognized => "unrecognized.wav",
    }
}

fn audio_fault(path: &Path, details: impl std::fmt::Display) -> SortError {
    SortError::hardware("audio", format!("{}: {details}", path.display()))
}

impl Feedback for PlayerFeedback {
    fn play(&self, cue: Cue) -> Result<(), SortError> {
        let path = self.sound_for(cue);
        if !path.is_file() {
            return Err(audio_fault(&path, "sound file not found"));
        }
        debug!(?cue, player = %self.player, file = %path.display(), "[audio] playing");
        let status = Command::new(&self.player)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| audio_fault(&path, format!("cannot run {}: {e}", self.player)))?;
        if !status.success() {
            return Err(audio_fault(&path, format!("{} exited with {status}", self.player)));
        }
        Ok(())
    }
}
