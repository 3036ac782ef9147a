//! frogcore: a libretro core that turns a single loaded file (an AVI clip or
//! a still image) into a full-screen player, with a menu/background,
//! background music, and the render scheduler's priority ladder governing
//! what's on screen each tick.
//!
//! Configuration lives at `/mnt/sda1/ROMS/.frogpmp.cfg` (see
//! [`config::Settings`]); logging is bridged through [`log_sink`] to
//! whatever opaque sink the host negotiates.

mod audio;
mod avi;
mod background;
mod color;
mod config;
mod error;
mod font;
mod gfx;
mod image;
mod input;
mod log_sink;
mod music_player;
mod scheduler;
mod state;
mod video_player;
mod xvid;

use config::Settings;
use libretro_backend::{
    libretro_core, AudioVideoInfo, Core, CoreInfo, GameData, LoadGameResult, PixelFormat, RuntimeHandle,
};
use scheduler::Scheduler;
use std::path::{Path, PathBuf};

const SETTINGS_PATH: &str = "/mnt/sda1/ROMS/.frogpmp.cfg";

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "gif", "jpg", "jpeg", "webp"];

fn load_settings() -> Settings {
    match std::fs::read_to_string(SETTINGS_PATH) {
        Ok(text) => Settings::parse(&text),
        Err(_) => Settings::default(),
    }
}

/// The libretro core instance.
pub struct FrogCore {
    scheduler: Scheduler,
    game_data: Option<GameData>,
    loaded_path: Option<PathBuf>,
}

impl Default for FrogCore {
    fn default() -> Self {
        log_sink::init();
        Self {
            scheduler: Scheduler::new(Settings::default()),
            game_data: None,
            loaded_path: None,
        }
    }
}

impl FrogCore {
    /// Dispatch a loaded file to the video player or image viewer by
    /// extension. A `None` or unrecognized extension leaves the scheduler on
    /// its menu/background path.
    fn open_content(&mut self, path: &Path) -> Result<(), ()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("avi") => {
                let path_str = path.to_str().ok_or(())?;
                self.scheduler.open_video(path_str);
                Ok(())
            }
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => {
                let bytes = std::fs::read(path).map_err(|_| ())?;
                self.scheduler.open_image(bytes.len());
                self.scheduler.push_image_chunk(&bytes);
                Ok(())
            }
            _ => {
                log::warn!("unrecognized content extension: {:?}", ext);
                Ok(())
            }
        }
    }
}

impl Core for FrogCore {
    fn save_memory(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn rtc_memory(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn system_memory(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn video_memory(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn info() -> CoreInfo {
        // The marker file the host loads us with (a `.frogui` placeholder);
        // the AVI/image content the menu plays is opened later by path, not
        // handed in as ROM data.
        CoreInfo::new("FrogCore", "1.0.0").supports_roms_with_extension("frogui")
    }

    fn on_load_game(&mut self, game_data: GameData) -> LoadGameResult {
        self.game_data = Some(game_data);
        self.scheduler = Scheduler::new(load_settings());

        // A `.frogui` marker carries no playable content of its own; the core
        // comes up on its menu/background path and waits for the file
        // manager collaborator to hand it an AVI/image path later.
        let path = self.game_data.as_ref().unwrap().path().map(PathBuf::from);
        if let Some(path) = &path {
            if self.open_content(path).is_err() {
                return LoadGameResult::Failed(self.game_data.take().unwrap());
            }
        }
        self.loaded_path = path;

        let av_info = AudioVideoInfo::new()
            .video(320, 240, 30.0, PixelFormat::RGB565)
            .audio(22_050.0);
        LoadGameResult::Success(av_info)
    }

    fn on_unload_game(&mut self) -> GameData {
        self.scheduler.close_video();
        self.scheduler.close_image();
        state::clear_on_unload();
        self.loaded_path = None;

        self.game_data.take().unwrap()
    }

    fn on_run(&mut self, handle: &mut RuntimeHandle) {
        state::set_runtime_handle(handle);
        self.scheduler.tick(handle);
    }

    fn on_reset(&mut self) {
        self.scheduler.close_video();
        self.scheduler.close_image();
        self.scheduler = Scheduler::new(load_settings());

        if let Some(path) = self.loaded_path.clone() {
            let _ = self.open_content(&path);
        }
    }
}

libretro_core!(FrogCore);
