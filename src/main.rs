//! Growing Cat save tool
//!
//! Inspects and maintains the save store the game uses. The game itself calls
//! the library directly; this binary is for support and recovery.

use std::env;
use std::fs;
use std::process::ExitCode;

use growing_cat::persistence::validation::validate;
use growing_cat::{KeyStore, SaveStore, StorageSettings};
use serde_json::Value;

fn print_usage() {
    eprintln!(
        "Commands:\n  status\n  load\n  save <payload-json-file>\n  reset\n  export-key"
    );
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return ExitCode::FAILURE;
    };

    let settings = StorageSettings::from_env();
    log::debug!("Using app directory {}", settings.app_dir.display());
    let store = SaveStore::open(settings);

    match (command.as_str(), args.len()) {
        ("status", 2) => status(&store),
        ("load", 2) => load(&store),
        ("save", 3) => save(&store, &args[2]),
        ("reset", 2) => {
            if store.reset_save() {
                println!("save data removed");
                ExitCode::SUCCESS
            } else {
                eprintln!("some save files could not be removed");
                ExitCode::FAILURE
            }
        }
        ("export-key", 2) => match store.keys().export_key_base64() {
            Ok(key) => {
                println!("{key}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("key unavailable: {err}");
                ExitCode::FAILURE
            }
        },
        _ => {
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn status(store: &SaveStore<KeyStore>) -> ExitCode {
    let settings = store.settings();
    println!("save file:  {}", settings.save_path().display());
    println!("key file:   {}", store.keys().key_path().display());

    if store.is_first_run() {
        println!("state:      first run (no save found)");
        return ExitCode::SUCCESS;
    }

    match store.try_load() {
        Ok(Some(loaded)) => {
            println!("state:      ok");
            println!("location:   {} ({})", loaded.location.as_str(), loaded.path.display());
            println!("format:     {}", loaded.format.as_str());
            println!("key:        {:?}", loaded.key_match);
            println!("migrated:   {}", loaded.migrated);
            println!(
                "progress:   day {} {}, {} coins, {} the {}",
                loaded.payload.day,
                loaded.payload.time_phase.as_str(),
                loaded.payload.money,
                loaded.payload.cat.name,
                loaded.payload.cat.stage.as_str()
            );
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("state:      first run (no save found)");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("state:      rejected");
            println!("reason:     {err}");
            println!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

fn load(store: &SaveStore<KeyStore>) -> ExitCode {
    let Some(payload) = store.load() else {
        eprintln!("no usable save");
        return ExitCode::FAILURE;
    };
    let printed = payload
        .to_mapping()
        .map_err(|e| e.to_string())
        .and_then(|map| serde_json::to_string_pretty(&map).map_err(|e| e.to_string()));
    match printed {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("could not print payload: {err}");
            ExitCode::FAILURE
        }
    }
}

fn save(store: &SaveStore<KeyStore>, path: &str) -> ExitCode {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("cannot read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let map = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            eprintln!("payload must be a json object");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("invalid payload json: {err}");
            return ExitCode::FAILURE;
        }
    };
    let payload = match validate(map) {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("invalid payload: {err}");
            return ExitCode::FAILURE;
        }
    };

    if store.save(payload) {
        println!("saved to {}", store.settings().save_path().display());
        ExitCode::SUCCESS
    } else {
        eprintln!("save failed");
        ExitCode::FAILURE
    }
}
