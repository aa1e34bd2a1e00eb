//! `faq ask`: interactive question loop on the terminal.
//!
//! Answers stream to stdout as they arrive. Typing `stop` exits.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::assistant::warm_up;
use crate::config::Config;

const STOP_WORD: &str = "stop";

/// Whether `line` ends the session.
pub fn is_stop(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(STOP_WORD)
}

pub async fn run_ask(config: &Config) -> Result<()> {
    let assistant = warm_up(config.clone()).await?;

    println!(
        "Ask a question about {} (type '{}' to exit).",
        config.repo.slug(),
        STOP_WORD
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_stop(&line) {
            println!("Goodbye!");
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        let mut turn = assistant.ask(question, None);
        while let Some(delta) = turn.next().await {
            // The error itself is reported by `finish` below.
            let Ok(delta) = delta else {
                break;
            };
            print!("{}", delta);
            std::io::stdout().flush()?;
        }
        println!();

        if let Err(err) = turn.finish().await {
            tracing::error!("{:#}", err);
        }
    }

    Ok(())
}
