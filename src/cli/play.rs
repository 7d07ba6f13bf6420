//! Terminal player
//!
//! Prints text tokens as they are revealed and reads commands from stdin.
//! Timers run against the wall clock.

use crate::runtime::debug::DebugConfig;
use crate::save::JsonFileStorage;
use crate::session::{Session, SessionConfig, SessionError};
use crate::source::FileSceneSource;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

/// How long to sleep when nothing is scheduled and auto-play is off
const IDLE_WAIT: Duration = Duration::from_secs(3600);

fn print_controls() {
    println!("=== shiori player ===");
    println!();
    println!("Controls:");
    println!("  Enter: next");
    println!("  a:     toggle auto-play");
    println!("  s:     quick save");
    println!("  l:     quick load");
    println!("  h:     history");
    println!("  q:     quit");
    println!();
}

fn print_history(session: &Session<JsonFileStorage>) {
    println!();
    println!("--- history ---");
    for page in session.history().pages() {
        println!("{}", page.text.trim_end());
        println!("~");
    }
    println!("---------------");
}

/// Play `scene` from `<scene_dir>/<scene>.txt`. Saves live in
/// `<scene_dir>/saves`.
pub async fn run_play(scene_dir: &Path, scene: &str, debug: bool) -> anyhow::Result<()> {
    let config = SessionConfig {
        debug: if debug {
            DebugConfig::verbose()
        } else {
            DebugConfig::default()
        },
    };
    let mut session = Session::open(
        FileSceneSource::new(scene_dir),
        JsonFileStorage::new(scene_dir.join("saves")),
        config,
    )
    .await?;

    session.on_text(|token| {
        print!("{token}");
        let _ = io::stdout().flush();
    });
    session.on_page(|| {
        println!();
        println!("{}", "-".repeat(40));
    });
    session.on_return(|| {
        println!();
        println!("[return reached, press q to quit]");
    });

    print_controls();
    let started = Instant::now();
    session.start(scene).await;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut auto = false;
    loop {
        if session.is_finished() {
            println!();
            println!("[end of scene]");
            break;
        }

        let timer_wait = session.next_deadline();
        let auto_wait = auto.then(|| session.settings().with(|s| s.auto_play_delay()));
        let wait = timer_wait.or(auto_wait).unwrap_or(IDLE_WAIT);

        tokio::select! {
            line = input.next_line() => {
                session.sync_clock(started.elapsed()).await;
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => session.next().await,
                    "q" => break,
                    "a" => {
                        auto = !auto;
                        println!("[auto-play {}]", if auto { "on" } else { "off" });
                    }
                    "s" => {
                        session.quick_save().await?;
                        println!("[saved]");
                    }
                    "l" => match session.quick_load().await {
                        Ok(()) => println!("[loaded]"),
                        Err(SessionError::EmptySlot(_)) => println!("[no quick save yet]"),
                        Err(err) => return Err(err.into()),
                    },
                    "h" => print_history(&session),
                    other => println!("[unknown command '{other}']"),
                }
            }
            _ = tokio::time::sleep(wait) => {
                session.sync_clock(started.elapsed()).await;
                if timer_wait.is_none() && auto {
                    session.next().await;
                }
            }
        }
    }

    if debug {
        let snapshot = session.create_save_state().to_bytes()?;
        println!("{}", String::from_utf8_lossy(&snapshot));
    }
    Ok(())
}
