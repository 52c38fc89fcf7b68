//! LexiQuest engine: mouse, touch and camera hand-tracking input turned
//! into drag, reveal and pose interactions for a small set of educational
//! games, with match resolution and star scoring.
//!
//! Pipeline per tick:
//!
//! ```text
//! LandmarkStream -> GestureRecognizer -> PointerUnifier -> DragSessionManager -> GameVariant
//!        \-> pose landmarks --------------------------------------------------> PoseTargetChecker
//! ```
//!
//! [`engine::Engine`] owns all of it; [`replay`] drives it from a script.

pub mod config;
pub mod content;
pub mod detector;
pub mod drag;
pub mod engine;
pub mod events;
pub mod games;
pub mod geometry;
pub mod gesture;
pub mod landmarks;
pub mod matching;
pub mod pointer;
pub mod pose;
pub mod replay;
pub mod scoring;
pub mod sexp;
pub mod variant;

pub use config::EngineConfig;
pub use content::LevelContent;
pub use detector::{CameraError, Detection, LandmarkStream};
pub use engine::Engine;
pub use events::{EngineEvent, EngineHandler};
pub use games::GameRegistry;
pub use pointer::RawInput;
pub use variant::{GameVariant, VariantKind};
