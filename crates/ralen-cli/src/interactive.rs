//! Prompt loop used when `ralen` is started without a subcommand

use crate::cli::{Cli, Commands};
use crate::commands::{print_path_report, Session};
use anyhow::Result;
use clap::{CommandFactory, Parser};
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use ralen_core::{ConfigLoader, PathConfigurator};
use std::io::{self, BufRead, IsTerminal};

#[derive(Debug, PartialEq)]
enum ShellInput {
    Empty,
    Help,
    Exit,
    Command(Commands),
    Invalid(String),
}

pub async fn run_shell() -> Result<()> {
    let mut session = Session::open().await?;
    let terminal = io::stdin().is_terminal();

    println!("ralen interactive shell. Type `help` for commands, `exit` to leave.");
    if terminal {
        offer_path_setup(&mut session).await;
    }

    loop {
        let line = match tokio::task::spawn_blocking(move || read_line(terminal)).await? {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::debug!("Input closed: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            ShellInput::Empty => continue,
            ShellInput::Exit => break,
            ShellInput::Help => println!("{}", Cli::command().render_help()),
            ShellInput::Invalid(message) => eprintln!("{}", message.trim_end()),
            ShellInput::Command(command) => {
                let code = session.dispatch(command).await;
                if code != 0 {
                    log::debug!("Command finished with exit code {}", code);
                }
            }
        }
    }
    Ok(())
}

fn read_line(terminal: bool) -> io::Result<Option<String>> {
    if terminal {
        return Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("ralen")
            .allow_empty(true)
            .interact_text()
            .map(Some)
            .map_err(prompt_error);
    }

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn prompt_error(err: dialoguer::Error) -> io::Error {
    io::Error::other(err.to_string())
}

fn parse_line(line: &str) -> ShellInput {
    let Some(mut words) = shlex::split(line) else {
        return ShellInput::Invalid("Unbalanced quotes".to_string());
    };
    if words.first().is_some_and(|w| w == "ralen") {
        words.remove(0);
    }
    let Some(first) = words.first() else {
        return ShellInput::Empty;
    };

    match first.to_lowercase().as_str() {
        "exit" | "quit" => return ShellInput::Exit,
        "help" | "?" => return ShellInput::Help,
        _ => {}
    }

    match Cli::try_parse_from(std::iter::once("ralen".to_string()).chain(words)) {
        Ok(Cli {
            command: Some(command),
            ..
        }) => ShellInput::Command(command),
        Ok(_) => ShellInput::Empty,
        Err(e) => ShellInput::Invalid(e.to_string()),
    }
}

/// Configure PATH when enabled, otherwise ask once and remember the answer
async fn offer_path_setup(session: &mut Session) {
    let configure = if session.config.auto_add_to_path {
        true
    } else if session.config.path_prompt_shown {
        false
    } else {
        let answer = tokio::task::spawn_blocking(|| {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Add the ralen command to your PATH now?")
                .default(false)
                .interact()
        })
        .await;
        let answer = matches!(answer, Ok(Ok(true)));

        session.config.auto_add_to_path = answer;
        session.config.path_prompt_shown = true;
        if let Err(e) = ConfigLoader::save_to(&session.config, &session.home).await {
            log::warn!("Could not save the PATH preference: {}", e);
        }
        answer
    };

    if !configure {
        return;
    }
    match PathConfigurator::for_current_user().and_then(|c| c.configure(true)) {
        Ok(report) if report.changed() => print_path_report(&report, "configured"),
        Ok(_) => log::debug!("PATH already configured"),
        Err(e) => log::warn!("Could not configure PATH: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn quoted_arguments_stay_together() {
        let input = parse_line(r#"run "my project" --project "a b.ralenproj""#);
        assert_eq!(
            input,
            ShellInput::Command(Commands::Run {
                path: Some(PathBuf::from("my project")),
                project: Some(PathBuf::from("a b.ralenproj")),
                interactive: false,
            })
        );
    }

    #[test]
    fn builtins_and_blank_lines() {
        assert_eq!(parse_line("   "), ShellInput::Empty);
        assert_eq!(parse_line("EXIT"), ShellInput::Exit);
        assert_eq!(parse_line("quit"), ShellInput::Exit);
        assert_eq!(parse_line("help"), ShellInput::Help);
    }

    #[test]
    fn leading_program_name_is_ignored() {
        assert_eq!(parse_line("ralen list-known"), ShellInput::Command(Commands::ListKnown));
    }

    #[test]
    fn errors_are_reported_not_fatal() {
        assert!(matches!(parse_line("frobnicate"), ShellInput::Invalid(_)));
        assert!(matches!(parse_line("run \"unterminated"), ShellInput::Invalid(_)));
    }

    #[test]
    fn prompt_failures_keep_their_message() {
        let err = prompt_error(dialoguer::Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed")));
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.to_string().contains("terminal closed"));
    }
}
