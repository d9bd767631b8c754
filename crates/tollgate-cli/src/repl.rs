//! Subcommand: `tollgate run` — interactive page loop.
//!
//! Shows one page at a time, reads the user's choice and form fields from
//! stdin, and prints the feedback the [`SessionFlow`] produces. Passwords
//! are read as plain lines; there is no terminal echo control.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::flow::{LoginForm, Page, SessionFlow, SignupForm, WELCOME};

/// Run the page loop on stdin/stdout until the user quits or input ends.
pub async fn cmd_run(flow: SessionFlow) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_pages(flow, stdin.lock(), stdout.lock()).await
}

/// Drive `flow` from `input`, writing screens to `output`.
pub async fn run_pages<R: BufRead, W: Write>(
    mut flow: SessionFlow,
    mut input: R,
    mut output: W,
) -> Result<()> {
    loop {
        writeln!(output)?;
        writeln!(output, "== {} ==", flow.page().title())?;

        let page = flow.page().clone();
        let keep_going = match page {
            Page::Login => login_page(&mut flow, &mut input, &mut output).await?,
            Page::Signup => signup_page(&mut flow, &mut input, &mut output).await?,
            Page::Home { username } => home_page(&mut flow, &username, &mut input, &mut output)?,
        };

        if !keep_going {
            info!("user requested exit");
            writeln!(output, "Goodbye!")?;
            return Ok(());
        }
    }
}

async fn login_page<R: BufRead, W: Write>(
    flow: &mut SessionFlow,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    writeln!(output, "[l] Log in   [s] Sign up   [q] Quit")?;
    let Some(choice) = ask(input, output, "> ")? else {
        return Ok(false);
    };

    match choice.trim() {
        "l" | "login" => {
            let Some(username) = ask(input, output, "Username: ")? else {
                return Ok(false);
            };
            let Some(password) = ask(input, output, "Password: ")? else {
                return Ok(false);
            };
            let feedback = flow.log_in(&LoginForm { username, password }).await;
            writeln!(output, "{}: {}", feedback.outcome.as_str(), feedback.message)?;
        }
        "s" | "signup" => flow.go_to_signup(),
        "q" | "quit" | "exit" => return Ok(false),
        other => writeln!(output, "Unknown choice: {other}")?,
    }
    Ok(true)
}

async fn signup_page<R: BufRead, W: Write>(
    flow: &mut SessionFlow,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    writeln!(output, "[c] Create account   [b] Back to login   [q] Quit")?;
    let Some(choice) = ask(input, output, "> ")? else {
        return Ok(false);
    };

    match choice.trim() {
        "c" | "create" => {
            let Some(username) = ask(input, output, "Username: ")? else {
                return Ok(false);
            };
            let Some(email) = ask(input, output, "Email: ")? else {
                return Ok(false);
            };
            let Some(password) = ask(input, output, "Password: ")? else {
                return Ok(false);
            };
            let form = SignupForm {
                username,
                email,
                password,
            };
            let feedback = flow.sign_up(&form).await;
            writeln!(output, "{}: {}", feedback.outcome.as_str(), feedback.message)?;
        }
        "b" | "back" => flow.go_to_login(),
        "q" | "quit" | "exit" => return Ok(false),
        other => writeln!(output, "Unknown choice: {other}")?,
    }
    Ok(true)
}

fn home_page<R: BufRead, W: Write>(
    flow: &mut SessionFlow,
    username: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    writeln!(output, "{WELCOME}, {username}")?;
    writeln!(output, "[o] Log out   [q] Quit")?;
    let Some(choice) = ask(input, output, "> ")? else {
        return Ok(false);
    };

    match choice.trim() {
        "o" | "logout" => flow.log_out(),
        "q" | "quit" | "exit" => return Ok(false),
        other => writeln!(output, "Unknown choice: {other}")?,
    }
    Ok(true)
}

/// Print `prompt` and read one line without its line ending. `None` on EOF.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("failed to read input")?;
    if read == 0 {
        return Ok(None);
    }
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}
