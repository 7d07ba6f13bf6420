//! CLI entry point for shiori
//!
//! Plays a scene directory in the terminal.

use std::path::PathBuf;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug = args.iter().any(|arg| arg == "--debug");

    let filter = if debug { "shiori=trace" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let Some(command) = args.get(1) else {
        print_usage();
        process::exit(1);
    };

    match command.as_str() {
        "play" => {
            let positional: Vec<&String> = args[2..]
                .iter()
                .filter(|a| !a.starts_with("--"))
                .collect();
            let [scene_dir, scene] = positional.as_slice() else {
                eprintln!("Error: Expected a scene directory and a scene name");
                eprintln!();
                print_usage();
                process::exit(1);
            };
            run_play(PathBuf::from(scene_dir.as_str()), scene.as_str(), debug).await;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Error: Unknown command '{}'", command);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("shiori - Visual Novel Script Player");
    println!();
    println!("USAGE:");
    println!("    shiori play <scene-dir> <scene> [--debug]");
    println!();
    println!("COMMANDS:");
    println!("    play <scene-dir> <scene> [--debug]    Play <scene-dir>/<scene>.txt in the terminal");
    println!("    --help, -h                            Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --debug    Trace script execution and dump the final state");
    println!();
    println!("EXAMPLES:");
    println!("    shiori play scenes prologue");
    println!("    shiori play scenes prologue --debug");
}

async fn run_play(scene_dir: PathBuf, scene: &str, debug: bool) {
    if !scene_dir.is_dir() {
        eprintln!("Error: '{}' is not a directory", scene_dir.display());
        process::exit(1);
    }

    if let Err(err) = shiori::cli::play::run_play(&scene_dir, scene, debug).await {
        eprintln!("Error: Player failed");
        eprintln!("Reason: {}", err);
        process::exit(1);
    }
}
