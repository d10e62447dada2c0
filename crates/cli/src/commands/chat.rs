//! Interactive chat command.
//!
//! Reads questions and slash commands from stdin. History is saved per user
//! after every message, feedback goes to the workspace feedback log.

use super::render::{answer_text, source_titles};
use clap::Args;
use cosmic_chat::{ChatPipeline, JsonFileStore, Judgment, Session, StateDelta};
use cosmic_core::{config::AppConfig, AppError, AppResult};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Kommandon:
  /ny                  ny konversation
  /lista               visa sparade konversationer
  /öppna <nr|id>       öppna en konversation
  /bra [alt]           markera senaste svaret som bra
  /dåligt [alt]        markera senaste svaret som dåligt
  /förtydliga <text>   förtydliga frågan efter ett dåligt svar
  /hjälp               visa den här hjälpen
  /avsluta             avsluta";

/// Interactive chat with saved history
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// User name, keys the saved history
    #[arg(short, long, env = "COSMIC_USER")]
    pub user: String,
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Question(String),
    New,
    List,
    Open(String),
    /// Judgment of an alternative of the latest answer, zero-based
    Judge(Judgment, usize),
    Clarify(String),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Question(line.to_string());
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "/ny" => Self::New,
            "/lista" => Self::List,
            "/öppna" if !rest.is_empty() => Self::Open(rest.to_string()),
            "/öppna" => Self::Invalid("Ange nummer eller id: /öppna <nr|id>".to_string()),
            "/bra" => Self::judge(Judgment::Positive, rest),
            "/dåligt" => Self::judge(Judgment::Negative, rest),
            "/förtydliga" if !rest.is_empty() => Self::Clarify(rest.to_string()),
            "/förtydliga" => Self::Invalid("Skriv förtydligandet: /förtydliga <text>".to_string()),
            "/hjälp" => Self::Help,
            "/avsluta" => Self::Quit,
            other => Self::Invalid(format!("Okänt kommando: {}", other)),
        }
    }

    fn judge(judgment: Judgment, rest: &str) -> Self {
        if rest.is_empty() {
            return Self::Judge(judgment, 0);
        }
        match rest.parse::<usize>() {
            Ok(n) if n >= 1 => Self::Judge(judgment, n - 1),
            _ => Self::Invalid(format!("Ogiltigt alternativ: {}", rest)),
        }
    }
}

/// The negatively judged answer a clarification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingClarification {
    message_index: usize,
    alternative_index: usize,
}

/// Clarification target after a judgment. `judged` is `None` for a repeat,
/// which leaves the target alone.
fn next_pending(
    current: Option<PendingClarification>,
    judgment: Judgment,
    judged: Option<PendingClarification>,
) -> Option<PendingClarification> {
    match (judgment, judged) {
        (_, None) => current,
        (Judgment::Negative, Some(target)) => Some(target),
        (Judgment::Positive, Some(target)) if current == Some(target) => None,
        (Judgment::Positive, Some(_)) => current,
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Starting chat for user '{}'", self.user);

        let store = Arc::new(JsonFileStore::new(config.history_dir()));
        let mut session = Session::open(self.user.as_str(), store)?;
        let pipeline = ChatPipeline::from_config(config)?;

        println!(
            "Cosmic-chatten ({}). Skriv /hjälp för kommandon.",
            pipeline.backend_name()
        );
        print_transcript(&session);

        let mut pending: Option<PendingClarification> = None;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            let command = ReplCommand::parse(&line);
            tracing::debug!("REPL command: {:?}", command);

            let result = match command {
                ReplCommand::Empty => Ok(()),
                ReplCommand::Quit => break,
                ReplCommand::Help => {
                    println!("{}", HELP);
                    Ok(())
                }
                ReplCommand::Invalid(message) => {
                    println!("{}", message);
                    Ok(())
                }
                ReplCommand::New => session.create_conversation().map(|id| {
                    pending = None;
                    println!("Ny konversation: {}", id);
                }),
                ReplCommand::List => {
                    print_conversations(&session);
                    Ok(())
                }
                ReplCommand::Open(target) => open_conversation(&mut session, &target).map(|_| {
                    pending = None;
                    print_transcript(&session);
                }),
                ReplCommand::Question(question) => pipeline
                    .on_submit_question(&mut session, &question)
                    .await
                    .map(|delta| {
                        pending = None;
                        print_answer(&delta);
                    }),
                ReplCommand::Judge(judgment, alternative_index) => {
                    judge_latest(&pipeline, &mut session, judgment, alternative_index)
                        .await
                        .map(|judged| {
                            pending = next_pending(pending, judgment, judged);
                            match (judgment, judged) {
                                (_, None) => {}
                                (Judgment::Negative, Some(_)) => {
                                    println!("Tack! Förtydliga med /förtydliga <text>.")
                                }
                                (Judgment::Positive, Some(_)) => println!("Tack för din feedback!"),
                            }
                        })
                }
                ReplCommand::Clarify(text) => match pending {
                    Some(target) => pipeline
                        .on_submit_clarification(
                            &mut session,
                            target.message_index,
                            target.alternative_index,
                            &text,
                        )
                        .await
                        .map(|delta| {
                            pending = None;
                            print_answer(&delta);
                        }),
                    None => {
                        println!("Markera först ett svar som dåligt med /dåligt.");
                        Ok(())
                    }
                },
            };

            // Handler errors are reported and the session keeps going
            if let Err(e) = result {
                tracing::warn!("Chat action failed: {}", e);
                println!("Fel: {}", e);
            }
        }

        tracing::info!("Chat for '{}' ended", self.user);
        Ok(())
    }
}

fn prompt() -> AppResult<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Judge an alternative of the newest assistant message.
///
/// Returns the judged target, or `None` when the judgment was a repeat.
async fn judge_latest(
    pipeline: &ChatPipeline,
    session: &mut Session,
    judgment: Judgment,
    alternative_index: usize,
) -> AppResult<Option<PendingClarification>> {
    let message_index = session
        .active_messages()
        .iter()
        .rposition(|m| m.is_assistant())
        .ok_or_else(|| AppError::Chat("Inget svar att bedöma ännu".to_string()))?;

    let delta = pipeline
        .on_submit_feedback(session, message_index, alternative_index, judgment)
        .await?;

    if delta.is_empty() {
        println!("Svaret är redan bedömt.");
        return Ok(None);
    }

    Ok(Some(PendingClarification {
        message_index,
        alternative_index,
    }))
}

/// Select a conversation by its 1-based list position or its id.
fn open_conversation(session: &mut Session, target: &str) -> AppResult<()> {
    let ids = session.list_conversations();
    let id = match target.parse::<usize>() {
        Ok(n) if n >= 1 && n <= ids.len() => ids[n - 1].clone(),
        _ => target.to_string(),
    };
    session.set_active(&id)
}

fn print_conversations(session: &Session) {
    let active = session.active_id();
    for (n, (id, title)) in session.conversation_titles().iter().enumerate() {
        let marker = if Some(id.as_str()) == active { "*" } else { " " };
        println!("{}{:>3}. {}  {}", marker, n + 1, id, title);
    }
}

fn print_transcript(session: &Session) {
    for message in session.active_messages() {
        if message.is_assistant() {
            println!("Assistent:\n{}\n", answer_text(message));
        } else {
            println!("Du: {}\n", message.content);
        }
    }
}

fn print_answer(delta: &StateDelta) {
    let Some(answer) = delta.answer() else {
        return;
    };

    println!("\n{}\n", answer_text(answer));

    let titles = source_titles(answer);
    if !titles.is_empty() {
        println!("Källor: {}\n", titles.join(", "));
    }
}
