use clap::{Arg, Command}; // Command-line parsing, builder style
use log::{error, info, LevelFilter};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use file_auth::config::load_settings;
use file_auth::hashing::{encode_secret, generate_salt_string};
use file_auth::utils::initialize_logging;
use file_auth::{Authenticator, ClientIdentity, Reloader};

const RELOAD_COMMAND: &str = "!reload";

fn cli() -> Command {
    Command::new("file-auth")
        .about("Authenticate clients against a credential file")
        .arg(
            Arg::new("settings")
                .long("settings")
                .short('s')
                .help("Path to the JSON settings file")
                .value_name("FILE")
                .default_value("settings.json")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("Default log level (overridden by RUST_LOG)")
                .value_name("LEVEL")
                .default_value("info")
                .value_parser(|s: &str| s.parse::<LevelFilter>().map_err(|e| e.to_string())),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("check")
                .about("Check a username and password once")
                .arg(Arg::new("username").help("The username to check").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("The password (prompted for when omitted)"),
                ),
        )
        .subcommand(
            Command::new("hash")
                .about("Print the credential-file form of a password under the configured policy")
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("The password (prompted for when omitted)"),
                )
                .arg(
                    Arg::new("salt")
                        .long("salt")
                        .help("Salt to use (random when omitted)"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Answer 'username password' lines from stdin while reloading in the background"),
        )
}

fn read_password(given: Option<&String>) -> io::Result<String> {
    match given {
        Some(password) => Ok(password.clone()),
        None => rpassword::prompt_password("Password: "),
    }
}

fn run_check(settings: PathBuf, username: &str, password: String) -> Result<bool, Box<dyn Error>> {
    let reloader = Reloader::open(settings)?;
    let authenticator = Authenticator::new(
        Arc::clone(reloader.store()),
        Arc::clone(reloader.cache()),
    );
    let identity = ClientIdentity::new(None, "file-auth-cli");
    Ok(authenticator.authenticate(&identity, Some(username), Some(&password)))
}

fn run_hash(settings: PathBuf, password: String, salt: Option<&String>) -> Result<String, Box<dyn Error>> {
    let policy = load_settings(&settings)?.policy()?;
    let salt = salt.cloned().unwrap_or_else(generate_salt_string);
    Ok(encode_secret(&policy, &password, &salt)?)
}

fn run_serve(settings: PathBuf) -> Result<(), Box<dyn Error>> {
    let reloader = Arc::new(Reloader::open(settings)?);
    let authenticator = Authenticator::new(
        Arc::clone(reloader.store()),
        Arc::clone(reloader.cache()),
    );
    let handle = Arc::clone(&reloader).spawn()?;
    info!("Ready; enter 'username password' per line, '{}' to reload", RELOAD_COMMAND);

    let identity = ClientIdentity::new(None, "stdin");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        // Trailing whitespace may be part of the password
        let line = line.trim_start();
        if line.trim_end().is_empty() {
            continue;
        }
        if line.trim_end() == RELOAD_COMMAND {
            handle.trigger();
            continue;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let username = parts.next();
        let password = parts.next().map(str::trim_start);
        let granted = authenticator.authenticate(&identity, username, password);
        writeln!(stdout, "{}", if granted { "granted" } else { "denied" })?;
        stdout.flush()?;
    }

    handle.stop();
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<LevelFilter>("log-level")
        .copied()
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = initialize_logging(level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let settings = matches
        .get_one::<PathBuf>("settings")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("settings.json"));

    let result = match matches.subcommand() {
        Some(("check", sub_matches)) => {
            let username = sub_matches
                .get_one::<String>("username")
                .cloned()
                .unwrap_or_default();
            read_password(sub_matches.get_one::<String>("password"))
                .map_err(Box::<dyn Error>::from)
                .and_then(|password| run_check(settings, &username, password))
                .map(|granted| {
                    println!("{}", if granted { "granted" } else { "denied" });
                    if granted {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(1)
                    }
                })
        }
        Some(("hash", sub_matches)) => read_password(sub_matches.get_one::<String>("password"))
            .map_err(Box::<dyn Error>::from)
            .and_then(|password| run_hash(settings, password, sub_matches.get_one::<String>("salt")))
            .map(|stored| {
                println!("{}", stored);
                ExitCode::SUCCESS
            }),
        Some(("serve", _)) => run_serve(settings).map(|_| ExitCode::SUCCESS),
        _ => Ok(ExitCode::from(2)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
