//! Scripted sessions: a level, timed input and synthetic camera frames.
//!
//! A script is a sequence of s-expression commands:
//!
//! ```text
//! (level :variant matching :pairs ("cat" "dog"))
//! (mouse-down 45 70) (mouse-move 640 70) (mouse-up 640 70)
//! (touch-start 1 45 70) (touch-move 1 600 70) (touch-end 1 600 70) (touch-cancel 1)
//! (gesture-start) (gesture-stop)
//! (frame :index (0.1 0.2) :thumb (0.11 0.2))     ; hand, sticky until the next frame
//! (frame :pose ((left-shoulder 0.65 0.4) (right-wrist 0.62 0.42)))
//! (frame)                                        ; nothing in view
//! (camera :error permission-denied) (camera :secure nil) (detector-fail "lost")
//! (wait 800)                                     ; advance the clock tick by tick
//! (pause) (resume) (reset) (exit) (hint) (status)
//! ```
//!
//! Commands run back to back until a `wait`; the clock then advances one
//! tick per [`ReplayRunner::advance`] call until the wait is used up.

use std::collections::VecDeque;

use anyhow::{anyhow, bail, Context};
use lexpr::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::content::LevelContent;
use crate::detector::{
    error_sexp, CameraError, Detection, DetectorPoll, LandmarkStream, ScriptedDetector, ScriptedEnvironment,
    ScriptedFeed,
};
use crate::engine::Engine;
use crate::events::EngineEvent;
use crate::geometry::Point;
use crate::landmarks::{HandLandmark, Keypoint, PoseLandmark, HAND_LANDMARK_COUNT, POSE_LANDMARK_COUNT};
use crate::pointer::RawInput;
use crate::sexp::{atom_string, get_bool, get_float, get_keyword, get_value, head_symbol, list_items, number, quote};

/// Confidence given to scripted landmarks unless stated.
const SCRIPT_CONFIDENCE: f32 = 0.9;

// ── Commands ───────────────────────────────────────────────

/// Camera setup for the next `gesture-start`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSetup {
    pub secure: bool,
    pub error: Option<CameraError>,
}

impl Default for CameraSetup {
    fn default() -> Self {
        Self {
            secure: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Level { name: String, content: LevelContent },
    Input(RawInput),
    Wait(f64),
    Frame(Detection),
    Camera(CameraSetup),
    DetectorFail(String),
    GestureStart,
    GestureStop,
    Pause,
    Resume,
    Reset,
    Exit,
    Hint,
    Status,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level { .. } => "level",
            Self::Input(RawInput::MouseDown(_)) => "mouse-down",
            Self::Input(RawInput::MouseMove(_)) => "mouse-move",
            Self::Input(RawInput::MouseUp(_)) => "mouse-up",
            Self::Input(RawInput::TouchStart { .. }) => "touch-start",
            Self::Input(RawInput::TouchMove { .. }) => "touch-move",
            Self::Input(RawInput::TouchEnd { .. }) => "touch-end",
            Self::Input(RawInput::TouchCancel { .. }) => "touch-cancel",
            Self::Input(RawInput::Gesture(_)) => "gesture",
            Self::Wait(_) => "wait",
            Self::Frame(_) => "frame",
            Self::Camera(_) => "camera",
            Self::DetectorFail(_) => "detector-fail",
            Self::GestureStart => "gesture-start",
            Self::GestureStop => "gesture-stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Reset => "reset",
            Self::Exit => "exit",
            Self::Hint => "hint",
            Self::Status => "status",
        }
    }

    /// Parse one command form.
    pub fn from_sexp(form: &Value) -> anyhow::Result<Self> {
        let head = head_symbol(form).ok_or_else(|| anyhow!("command must start with a symbol: {}", form))?;
        let args: Vec<&Value> = list_items(form).into_iter().skip(1).collect();
        let command = match head {
            "level" => {
                let content = LevelContent::from_sexp(form)?;
                let name = get_keyword(form, "variant").unwrap_or_else(|| content.variant.as_str().to_string());
                Self::Level { name, content }
            }
            "mouse-down" => Self::Input(RawInput::MouseDown(point_args(&args, 0)?)),
            "mouse-move" => Self::Input(RawInput::MouseMove(point_args(&args, 0)?)),
            "mouse-up" => Self::Input(RawInput::MouseUp(point_args(&args, 0)?)),
            "touch-start" => Self::Input(RawInput::TouchStart {
                id: touch_id(&args)?,
                pos: point_args(&args, 1)?,
            }),
            "touch-move" => Self::Input(RawInput::TouchMove {
                id: touch_id(&args)?,
                pos: point_args(&args, 1)?,
            }),
            "touch-end" => Self::Input(RawInput::TouchEnd {
                id: touch_id(&args)?,
                pos: point_args(&args, 1)?,
            }),
            "touch-cancel" => Self::Input(RawInput::TouchCancel { id: touch_id(&args)? }),
            "wait" => {
                let ms = args.first().and_then(|v| number(v)).ok_or_else(|| anyhow!("wait needs milliseconds"))?;
                if ms < 0.0 {
                    bail!("wait must not be negative: {}", ms);
                }
                Self::Wait(ms)
            }
            "frame" => Self::Frame(parse_frame(form)?),
            "camera" => {
                let mut setup = CameraSetup::default();
                if let Some(secure) = get_bool(form, "secure") {
                    setup.secure = secure;
                }
                if let Some(name) = get_keyword(form, "error") {
                    setup.error = match name.as_str() {
                        "nil" => None,
                        other => Some(CameraError::from_str(other).ok_or_else(|| anyhow!("unknown camera error: {}", other))?),
                    };
                }
                Self::Camera(setup)
            }
            "detector-fail" => Self::DetectorFail(
                args.first()
                    .map(|v| atom_string(v))
                    .unwrap_or_else(|| "detector failed".to_string()),
            ),
            "gesture-start" => Self::GestureStart,
            "gesture-stop" => Self::GestureStop,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "reset" => Self::Reset,
            "exit" => Self::Exit,
            "hint" => Self::Hint,
            "status" => Self::Status,
            other => bail!("unknown command: {}", other),
        };
        Ok(command)
    }
}

fn point_args(args: &[&Value], start: usize) -> anyhow::Result<Point> {
    let x = args.get(start).and_then(|v| number(v));
    let y = args.get(start + 1).and_then(|v| number(v));
    match (x, y) {
        (Some(x), Some(y)) => Ok(Point::new(x as f32, y as f32)),
        _ => bail!("expected x and y coordinates"),
    }
}

fn touch_id(args: &[&Value]) -> anyhow::Result<u64> {
    args.first()
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow!("touch commands need a non-negative integer id"))
}

/// `(x y)` or `(x y confidence)` as a normalized keypoint.
fn parse_keypoint(value: &Value) -> anyhow::Result<Keypoint> {
    let nums: Vec<f32> = list_items(value)
        .into_iter()
        .map(|v| number(v).map(|n| n as f32).ok_or_else(|| anyhow!("landmark must be numbers, got {}", v)))
        .collect::<anyhow::Result<_>>()?;
    match nums[..] {
        [x, y] => Ok(Keypoint::new(x, y, SCRIPT_CONFIDENCE)),
        [x, y, confidence] => Ok(Keypoint::new(x, y, confidence)),
        _ => bail!("landmark needs (x y [confidence]), got {}", value),
    }
}

/// Build a detection from `:index`/`:thumb` (hand) and `:pose` (named
/// landmarks).  Landmarks not given are placed out of view.
fn parse_frame(form: &Value) -> anyhow::Result<Detection> {
    let mut detection = Detection::default();

    let index = get_value(form, "index").map(parse_keypoint).transpose()?;
    let thumb = get_value(form, "thumb").map(parse_keypoint).transpose()?;
    match (index, thumb) {
        (Some(index), Some(thumb)) => {
            let mut hand = vec![Keypoint::new(0.5, 0.8, SCRIPT_CONFIDENCE); HAND_LANDMARK_COUNT];
            hand[HandLandmark::IndexTip.index()] = index;
            hand[HandLandmark::ThumbTip.index()] = thumb;
            // `:confidence` overrides the whole hand.
            if let Some(c) = get_float(form, "confidence") {
                for k in &mut hand {
                    k.confidence = c as f32;
                }
            }
            detection.hand = Some(hand);
        }
        (None, None) => {}
        _ => bail!("frame needs both :index and :thumb for a hand"),
    }

    if let Some(list) = get_value(form, "pose") {
        let mut pose = vec![Keypoint::new(0.5, 0.5, 0.0); POSE_LANDMARK_COUNT];
        for entry in list_items(list) {
            let items = list_items(entry);
            let name = items
                .first()
                .map(|v| atom_string(v))
                .ok_or_else(|| anyhow!("pose entry needs a landmark name"))?;
            let landmark = PoseLandmark::from_str(&name).ok_or_else(|| anyhow!("unknown pose landmark: {}", name))?;
            let coords = match entry {
                Value::Cons(pair) => parse_keypoint(pair.cdr())?,
                _ => bail!("pose entry must be a list: {}", entry),
            };
            pose[landmark.index()] = coords;
        }
        detection.pose = Some(pose);
    }
    Ok(detection)
}

// ── Script ─────────────────────────────────────────────────

/// Parsed command sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub commands: Vec<Command>,
}

impl Script {
    /// Parse a whole script.  `;` comments are allowed.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let value = lexpr::from_str(&format!("(\n{}\n)", text)).context("malformed script")?;
        let commands = list_items(&value)
            .into_iter()
            .enumerate()
            .map(|(i, form)| Command::from_sexp(form).with_context(|| format!("command {}: {}", i + 1, form)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { commands })
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing script {}", path.display()))
    }

    /// Total scripted wait time (ms).
    pub fn duration_ms(&self) -> f64 {
        self.commands
            .iter()
            .map(|c| match c {
                Command::Wait(ms) => *ms,
                _ => 0.0,
            })
            .sum()
    }
}

// ── Runner ─────────────────────────────────────────────────

/// Drives an [`Engine`] through a script.  Output lines (events, hints,
/// status, camera errors) are s-expressions.
pub struct ReplayRunner {
    engine: Engine,
    feed: ScriptedFeed,
    camera: CameraSetup,
    environment: Option<ScriptedEnvironment>,
    pending: VecDeque<Command>,
    /// Remaining time of the current wait (ms).
    wait_ms: f64,
    tick_ms: f64,
    ticks: u64,
}

impl ReplayRunner {
    pub fn new(config: EngineConfig, script: Script) -> Self {
        let tick_ms = config.tick_ms as f64;
        let mut runner = Self {
            engine: Engine::new(config),
            feed: ScriptedFeed::new(),
            camera: CameraSetup::default(),
            environment: None,
            pending: script.commands.into(),
            wait_ms: 0.0,
            tick_ms,
            ticks: 0,
        };
        runner.attach_camera();
        runner
    }

    fn attach_camera(&mut self) {
        let mut environment = ScriptedEnvironment::default();
        environment.secure = self.camera.secure;
        environment.failure = self.camera.error.clone();
        environment.frame_interval_ms = self.tick_ms;
        self.engine.attach_stream(LandmarkStream::new(
            Box::new(environment.clone()),
            Box::new(ScriptedDetector::new(self.feed.clone())),
        ));
        self.environment = Some(environment);
    }

    /// Run every command up to the next wait, then advance one tick if a
    /// wait is in progress.
    pub fn advance(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        while self.wait_ms <= 0.0 {
            let command = match self.pending.pop_front() {
                Some(c) => c,
                None => return Ok(lines),
            };
            match command {
                Command::Wait(ms) => self.wait_ms += ms,
                other => lines.extend(self.execute(other)?),
            }
        }
        let dt = self.tick_ms.min(self.wait_ms);
        self.wait_ms -= dt;
        self.ticks += 1;
        lines.extend(event_lines(&self.engine.tick(dt)));
        Ok(lines)
    }

    /// Run the script to the end.
    pub fn run(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        while !self.is_finished() {
            lines.extend(self.advance()?);
        }
        Ok(lines)
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.wait_ms <= 0.0
    }

    fn execute(&mut self, command: Command) -> anyhow::Result<Vec<String>> {
        debug!("replay: {}", command.as_str());
        let events = match command {
            // Consumed by `advance`.
            Command::Wait(_) => Vec::new(),
            Command::Level { name, content } => self.engine.load_variant(&name, content)?,
            Command::Input(input) => self.engine.handle_input(&input),
            Command::Frame(detection) => {
                if detection.hand.is_none() && detection.pose.is_none() {
                    self.feed.clear();
                } else {
                    self.feed.set(detection);
                }
                Vec::new()
            }
            Command::Camera(setup) => {
                let events = self.engine.stop_gesture_input("camera-changed");
                self.camera = setup;
                self.attach_camera();
                events
            }
            Command::DetectorFail(reason) => {
                self.feed.push(DetectorPoll::Failed(reason));
                Vec::new()
            }
            Command::GestureStart => {
                if let Err(e) = self.engine.start_gesture_input() {
                    warn!("replay: gesture input refused: {}", e);
                    return Ok(vec![format!("(:type :camera-error :error {})", error_sexp(&e))]);
                }
                Vec::new()
            }
            Command::GestureStop => self.engine.stop_gesture_input("toggle"),
            Command::Pause => self.engine.pause(),
            Command::Resume => self.engine.resume(),
            Command::Reset => self.engine.reset(),
            Command::Exit => self.engine.exit_level(),
            Command::Hint => {
                let line = match self.engine.hint() {
                    Some(h) => format!(
                        "(:type :hint :target {} :entities ({}) :zones ({}))",
                        h.target.as_deref().map(quote).unwrap_or_else(|| "nil".to_string()),
                        h.entity_ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(" "),
                        h.zone_ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(" "),
                    ),
                    None => "(:type :hint :target nil)".to_string(),
                };
                return Ok(vec![line]);
            }
            Command::Status => {
                return Ok(vec![format!("(:type :status :engine {})", self.engine.status_sexp())]);
            }
        };
        Ok(event_lines(&events))
    }

    /// Stop gesture input and leave the level.
    pub fn shutdown(&mut self) -> Vec<String> {
        let mut events = self.engine.stop_gesture_input("shutdown");
        events.extend(self.engine.exit_level());
        info!("replay finished after {} ticks", self.ticks);
        event_lines(&events)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Cameras currently held by the scripted environment.
    pub fn open_cameras(&self) -> u32 {
        self.environment.as_ref().map_or(0, |e| e.open_cameras())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

fn event_lines(events: &[EngineEvent]) -> Vec<String> {
    events.iter().map(|e| e.to_sexp()).collect()
}

// ── Tests ──────────────────────────────────────────────────
