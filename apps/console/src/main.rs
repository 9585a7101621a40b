use std::{
    collections::HashMap,
    io::{self, Write},
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::Parser;
use client_core::{
    Axis, CommandAggregator, CoordinateForm, CraneSession, GripperMode, Key, RobotApi, SceneState,
};
use crossterm::{
    cursor,
    event::{
        Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{self, Clear, ClearType},
};
use futures::StreamExt;
use shared::{domain::CraneId, protocol::Action};
use tracing::warn;

/// Plain terminals deliver no key-up; a held key keeps refreshing through
/// auto-repeat, so a key silent for this long counts as released.
const HOLD_TIMEOUT: Duration = Duration::from_millis(600);
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the crane server.
    #[arg(long, default_value = "http://localhost:7777")]
    server_url: String,
    /// Identifier of the crane to operate.
    #[arg(long)]
    robot: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let args = Args::parse();

    let api = RobotApi::new(&args.server_url);
    let id = CraneId::new(&args.robot);
    let details = api.crane_details(&id).await?;
    println!("operating crane '{}' via {}", details.id, args.server_url);
    println!("w/s lift  a/d swing  j/l elbow  i/k wrist  space gripper");
    println!("g gripper mode  b debug  m move-to  q quit");

    let session = CraneSession::connect(
        &args.server_url,
        &id,
        SceneState::new(details.state, details.limits),
    )?;

    let _raw = RawTerminal::enter()?;
    run_console(&session).await
}

/// Raw-mode handle; restores the terminal on every exit path.
struct RawTerminal {
    enhanced: bool,
}

impl RawTerminal {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(Self { enhanced })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
        println!();
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Console {
    aggregator: CommandAggregator,
    updater: client_core::Updater,
    held: HashMap<Key, Instant>,
    move_form: Option<(CoordinateForm, Axis)>,
}

async fn run_console(session: &CraneSession) -> Result<()> {
    let mut state = session.state();
    let mut console = Console {
        aggregator: CommandAggregator::new(session.updater()),
        updater: session.updater(),
        held: HashMap::new(),
        move_form: None,
    };

    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(RENDER_INTERVAL);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&state.borrow(), &console)?;
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => {
                    if let Flow::Quit = console.handle_key(&state.borrow(), key) {
                        break;
                    }
                    render(&state.borrow(), &console)?;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => warn!(%err, "terminal event stream failed"),
                None => break,
            },
            _ = ticker.tick() => {
                console.release_stale();
                render(&state.borrow(), &console)?;
            }
        }
    }

    console.aggregator.release_all();
    Ok(())
}

impl Console {
    fn handle_key(&mut self, scene: &SceneState, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        if let KeyEventKind::Release = key.kind {
            if let Some(held_key) = translate(key.code) {
                self.held.remove(&held_key);
                self.aggregator.key_up(held_key);
            }
            return Flow::Continue;
        }

        if self.move_form.is_some() {
            return self.handle_form_key(key.code);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('b') => self.updater.update(Action::DebugMode(!scene.debug_mode)),
            KeyCode::Char('g') => self.aggregator.key_down(Key::Modifier),
            KeyCode::Char('m') => {
                self.aggregator.release_all();
                self.held.clear();
                self.move_form = Some((CoordinateForm::default(), Axis::X));
            }
            code => {
                if let Some(held_key) = translate(code) {
                    self.held.insert(held_key, Instant::now());
                    self.aggregator.key_down(held_key);
                }
            }
        }
        Flow::Continue
    }

    fn handle_form_key(&mut self, code: KeyCode) -> Flow {
        match code {
            KeyCode::Esc => self.move_form = None,
            KeyCode::Enter => {
                let submitted = self
                    .move_form
                    .as_ref()
                    .is_some_and(|(form, _)| form.submit(&self.updater));
                if submitted {
                    self.move_form = None;
                }
            }
            KeyCode::Tab | KeyCode::Char(' ') => {
                if let Some((_, axis)) = self.move_form.as_mut() {
                    *axis = match axis {
                        Axis::X => Axis::Y,
                        Axis::Y => Axis::Z,
                        Axis::Z => Axis::X,
                    };
                }
            }
            KeyCode::Backspace => {
                if let Some((form, axis)) = self.move_form.as_mut() {
                    let mut value = form.get(*axis).to_string();
                    value.pop();
                    form.set(*axis, &value);
                }
            }
            KeyCode::Char(c) => {
                if let Some((form, axis)) = self.move_form.as_mut() {
                    // The form refuses anything that is not a partial decimal.
                    let value = format!("{}{}", form.get(*axis), c);
                    form.set(*axis, &value);
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn release_stale(&mut self) {
        let now = Instant::now();
        let aggregator = &mut self.aggregator;
        self.held.retain(|key, last_seen| {
            if now.duration_since(*last_seen) > HOLD_TIMEOUT {
                aggregator.key_up(*key);
                false
            } else {
                true
            }
        });
    }
}

fn translate(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(' ') => Some(Key::Space),
        KeyCode::Char(c) => Some(Key::Char(c)),
        _ => None,
    }
}

fn render(scene: &SceneState, console: &Console) -> Result<()> {
    let crane = &scene.crane;
    let link = if scene.connected {
        "online"
    } else {
        "reconnecting"
    };
    let mode = match console.aggregator.gripper_mode() {
        GripperMode::Open => "open",
        GripperMode::Close => "close",
    };

    let mut line = format!(
        "[{link}] swing {:6.1} deg  lift {:6.0} mm  elbow {:5.1} deg  wrist {:5.1} deg  gripper {:5.1} mm | operators {} | gripper-mode {mode}",
        crane.swing_deg,
        crane.lift_mm,
        crane.elbow_deg,
        crane.wrist_deg,
        crane.gripper_mm,
        scene.users.len(),
    );
    if scene.debug_mode {
        line.push_str(" | debug");
    }
    if let Some((form, axis)) = &console.move_form {
        line.push_str(&format!(
            " | move-to x={} y={} z={} (editing {:?}, enter to send)",
            form.get(Axis::X),
            form.get(Axis::Y),
            form.get(Axis::Z),
            axis,
        ));
    }

    let mut stdout = io::stdout();
    execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    stdout.write_all(line.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
