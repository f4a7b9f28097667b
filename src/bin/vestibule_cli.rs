//!
//! Vestibule CLI binary
//! --------------------
//! Command-line companion for the access gate: record and clear logins,
//! check what the guard would decide for a path, validate the configured
//! directory source, or browse interactively as if navigating the site.

use std::env;
use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use vestibule::{DirectorySource, Gate, GateConfig, GateError, Outcome, SessionStore};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [options] login <code>      resolve a member code and record the session\n  {program} [options] logout            clear the session (prints the login path to navigate to)\n  {program} [options] status            show the current session; exits 3 when there is none\n  {program} [options] check <path>      decide a page path; exit 0 = allowed, 1 = redirect\n  {program} [options] validate          load the directory source and report members or conflicts\n  {program} [options] browse            interactive mode: each entered path is a fresh page visit\n\nOptions (flags override VESTIBULE_* environment variables):\n  --json                 machine-readable output\n  --directory <kind>     static | remote\n  --roster <file>        roster file (static source, or legacy reference for remote)\n  --remote-url <url>     remote directory endpoint\n  --token <token>        bearer token for the remote endpoint\n  --timeout-ms <n>       remote fetch timeout in milliseconds\n  --state-dir <dir>      where the session record lives (default .vestibule)\n  --login-path <path>    login entry point (default /login.html)\n  -h | --help            this help\n\nInteractive commands in browse mode:\n  /some/page.html        decide that path\n  login <code>           record a login\n  logout                 clear the session\n  status                 show the current session\n  help                   show this help\n  quit | exit            leave browse mode"
    );
}

fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut cfg = match GateConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    };
    let mut json = false;
    let mut command: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => {
                json = true;
                i += 1;
            }
            "--directory" => {
                let value = flag_value(&args, i, "--directory", &program);
                match DirectorySource::parse(&value) {
                    Ok(kind) => cfg.directory = kind,
                    Err(err) => {
                        eprintln!("error: {err}");
                        std::process::exit(2);
                    }
                }
                i += 2;
            }
            "--roster" => {
                cfg.roster_file = Some(flag_value(&args, i, "--roster", &program).into());
                i += 2;
            }
            "--remote-url" => {
                cfg.remote_url = Some(flag_value(&args, i, "--remote-url", &program));
                i += 2;
            }
            "--token" => {
                cfg.remote_token = Some(flag_value(&args, i, "--token", &program));
                i += 2;
            }
            "--timeout-ms" => {
                let value = flag_value(&args, i, "--timeout-ms", &program);
                match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => cfg.fetch_timeout = std::time::Duration::from_millis(ms),
                    _ => {
                        eprintln!("--timeout-ms requires a positive integer, got '{value}'");
                        std::process::exit(2);
                    }
                }
                i += 2;
            }
            "--state-dir" => {
                cfg.state_dir = flag_value(&args, i, "--state-dir", &program).into();
                i += 2;
            }
            "--login-path" => {
                cfg.login_path = flag_value(&args, i, "--login-path", &program);
                i += 2;
            }
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            unk if unk.starts_with('-') => {
                eprintln!("Unrecognized option: {unk}");
                print_usage(&program);
                std::process::exit(2);
            }
            word => {
                if command.is_none() {
                    command = Some(word.to_string());
                } else {
                    positional.push(word.to_string());
                }
                i += 1;
            }
        }
    }

    let Some(command) = command else {
        print_usage(&program);
        std::process::exit(2);
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    match command.as_str() {
        // Store-only commands: these must keep working even when the
        // directory source is misconfigured or unreachable.
        "status" => {
            let store = open_store(&cfg, json);
            match store.get() {
                Some(session) => {
                    if json {
                        println!("{}", pretty(&serde_json::json!({"status": "ok", "session": session})));
                    } else {
                        println!(
                            "logged in as {} ({}) since {}",
                            session.display_name, session.user_id, session.logged_in_at
                        );
                    }
                    Ok(())
                }
                None => {
                    if json {
                        println!("{}", pretty(&serde_json::json!({"status": "none"})));
                    } else {
                        println!("no session");
                    }
                    std::process::exit(GateError::NoSession.exit_code());
                }
            }
        }
        "logout" => {
            let store = open_store(&cfg, json);
            if let Err(err) = store.clear() {
                fail(err, json);
            }
            if json {
                println!("{}", pretty(&serde_json::json!({"status": "ok", "login_path": cfg.login_path})));
            } else {
                println!("logged out; navigate to {}", cfg.login_path);
            }
            Ok(())
        }
        "login" => {
            let code = expect_arg(&positional, 0, "login <code>", &program);
            let gate = build_gate(cfg, json);
            match rt.block_on(gate.login(&code)) {
                Ok(session) => {
                    if json {
                        println!("{}", pretty(&serde_json::json!({"status": "ok", "session": session})));
                    } else {
                        println!("logged in as {} ({})", session.display_name, session.user_id);
                    }
                    Ok(())
                }
                Err(err) => fail(err, json),
            }
        }
        "check" => {
            let path = expect_arg(&positional, 0, "check <path>", &program);
            let gate = build_gate(cfg, json);
            let visit = gate.begin_visit(path);
            let outcome = rt.block_on(gate.evaluate(&visit));
            std::process::exit(print_outcome(&outcome, json));
        }
        "validate" => {
            let gate = build_gate(cfg, json);
            match rt.block_on(gate.provider().load()) {
                Ok(dir) => {
                    let active = dir.records().filter(|r| r.is_active()).count();
                    if json {
                        println!(
                            "{}",
                            pretty(&serde_json::json!({
                                "status": "ok",
                                "source": gate.provider().source(),
                                "members": dir.len(),
                                "active": active,
                            }))
                        );
                    } else {
                        println!(
                            "{} directory ok: {} members, {active} active",
                            gate.provider().source(),
                            dir.len()
                        );
                    }
                    Ok(())
                }
                Err(err) => {
                    if !json {
                        // The typed directory error is more precise than the
                        // folded gate error; show it before exiting.
                        eprintln!("validation failed: {err}");
                    }
                    fail(GateError::from(err), json)
                }
            }
        }
        "browse" => {
            let gate = build_gate(cfg, json);
            run_browse(rt, gate, json, &program)
        }
        unk => {
            eprintln!("Unrecognized command: {unk}");
            print_usage(&program);
            std::process::exit(2);
        }
    }
}

fn run_browse(rt: tokio::runtime::Runtime, gate: Gate, json: bool, program: &str) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    println!("vestibule browse mode. Type 'help' for commands.");
    loop {
        input.clear();
        print!("> ");
        let _ = stdout.flush();
        if stdin.read_line(&mut input).is_err() {
            break;
        }
        if input.is_empty() {
            break; // EOF
        }
        let line = input.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if lower == "quit" || lower == "exit" {
            break;
        }
        if lower == "help" {
            print_usage(program);
            continue;
        }
        if lower == "status" {
            match gate.session() {
                Some(session) => println!(
                    "logged in as {} ({}) since {}",
                    session.display_name, session.user_id, session.logged_in_at
                ),
                None => println!("no session"),
            }
            continue;
        }
        if lower == "logout" {
            match gate.logout() {
                Ok(login_path) => println!("logged out; navigate to {login_path}"),
                Err(err) => eprintln!("error: {err}"),
            }
            continue;
        }
        if lower.starts_with("login ") {
            let code = line[6..].trim();
            match rt.block_on(gate.login(code)) {
                Ok(session) => {
                    println!("logged in as {} ({})", session.display_name, session.user_id)
                }
                Err(err) => eprintln!("error: {err}"),
            }
            continue;
        }
        if !line.starts_with('/') {
            println!("paths start with '/' (or use: login <code>, logout, status, help, quit)");
            continue;
        }
        // Each entered path is a brand-new page visit.
        let visit = gate.begin_visit(line);
        let outcome = rt.block_on(gate.evaluate(&visit));
        let _ = print_outcome(&outcome, json);
    }
    Ok(())
}

fn print_outcome(outcome: &Outcome, json: bool) -> i32 {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string()));
    } else {
        match outcome {
            Outcome::Allowed { user: None } => println!("allowed (public path)"),
            Outcome::Allowed { user: Some(user) } => {
                let marker = if user.verified { "" } else { " [unverified]" };
                println!("allowed: {} ({}){marker}", user.display_name, user.id);
            }
            Outcome::Redirect { location, reason } => {
                println!("redirect -> {location} ({})", reason.as_str());
            }
        }
    }
    if outcome.is_allowed() {
        0
    } else {
        1
    }
}

fn build_gate(cfg: GateConfig, json: bool) -> Gate {
    match Gate::new(cfg) {
        Ok(gate) => gate,
        Err(err) => fail(err, json),
    }
}

fn open_store(cfg: &GateConfig, json: bool) -> SessionStore {
    match SessionStore::open(&cfg.state_dir) {
        Ok(store) => store,
        Err(err) => fail(err, json),
    }
}

fn fail(err: GateError, json: bool) -> ! {
    if json {
        println!("{}", pretty(&serde_json::json!({"status": "error", "error": err})));
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(err.exit_code());
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn flag_value(args: &[String], i: usize, flag: &str, program: &str) -> String {
    if i + 1 >= args.len() {
        eprintln!("{flag} requires a value");
        print_usage(program);
        std::process::exit(2);
    }
    args[i + 1].clone()
}

fn expect_arg(positional: &[String], idx: usize, usage: &str, program: &str) -> String {
    match positional.get(idx) {
        Some(value) => value.clone(),
        None => {
            eprintln!("usage: {usage}");
            print_usage(program);
            std::process::exit(2);
        }
    }
}
