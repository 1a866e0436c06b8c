use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use bangtags::bangtag::{process, Outcome};
use bangtags::cli::{self, CliArgs};
use bangtags::config::Config;
use bangtags::error::{Error, Result};
use bangtags::host::{Actor, Authorization};
use bangtags::memory::MemoryHost;
use bangtags::post::Post;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("bangtags: {e}");
            eprintln!("Usage: bangtags [-c<config>] [-V<varsfile>] [-u<user>] [-ajm] [<file>]");
            return ExitCode::FAILURE;
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_env("BANGTAGS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bangtags: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<()> {
    // ── Engine config ─────────────────────────────────────────────────────────
    let config = match &args.config {
        None => Config::default(),
        Some(path) => {
            let (config, errors) =
                Config::load_file(path).map_err(|source| Error::Io { path: path.clone(), source })?;
            for e in errors {
                eprintln!("bangtags: {}: {e}", path.display());
            }
            config
        }
    };

    // ── Post text ─────────────────────────────────────────────────────────────
    let text = match &args.input {
        Some(path) => {
            std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.clone(), source })?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| Error::Io { path: PathBuf::from("<stdin>"), source })?;
            buf
        }
    };

    // ── Host ──────────────────────────────────────────────────────────────────
    let vars_file = cli::resolve_vars_file(args.vars_file.as_ref());
    let mut host = MemoryHost::new();
    host.load_vars_json(&vars_file)?;
    host.add_account(&format!("@{}", args.user));

    let authorization = if args.admin {
        Authorization::ADMIN
    } else if args.moderator {
        Authorization::MODERATOR
    } else {
        Authorization::default()
    };
    if args.admin {
        host.admins.push(args.user.clone());
    } else if args.moderator {
        host.moderators.push(args.user.clone());
    }
    let actor = Actor::new(args.user.as_str()).with_authorization(authorization);

    // ── Process ───────────────────────────────────────────────────────────────
    let mut post = Post::new(args.user.as_str(), text.trim_end_matches('\n'));
    let outcome = process(&mut host, &config, &actor, &mut post)?;
    host.save_vars_json(&vars_file)?;

    for call in &host.calls {
        tracing::info!(?call, "host side effect");
    }

    match outcome {
        Outcome::Discarded => println!("Bangtags processed successfully."),
        Outcome::Saved(_) if args.json => match serde_json::to_string_pretty(&post) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("bangtags: cannot encode post: {e}"),
        },
        Outcome::Saved(_) => {
            println!("{}", post.text);
            if let Some(footer) = &post.footer {
                println!("\n{footer}");
            }
        }
    }
    Ok(())
}
