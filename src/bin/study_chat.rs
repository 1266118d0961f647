//! Terminal study session against a running relay.
//!
//! Plain lines are sent to the current persona; lines starting with `/`
//! are commands (see `/help`).

use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use study_fast::catalog::{AI_MODELS, PERSONAS, find_persona};
use study_fast::client::ChatClient;
use study_fast::config::Config;
use study_fast::init_tracing;
use study_fast::models::{EducationLevel, Sender, UserProfile};
use study_fast::session::StudySession;
use study_fast::storage::{StudyStorage, open_store};

const HELP: &str = "\
Commands:
  /persona <id>                 switch teacher (ids: /personas)
  /personas                     list teachers
  /model <id>                   switch model (ids: /models)
  /models                       list models
  /questions [persona]          sample questions (current teacher by default)
  /ask [persona] <n>            ask sample question n
  /progress                     achievement progress with this teacher
  /profile                      show your profile
  /profile <level> [style...]   set education level (high_school, university, professional)
  /reset                        delete all history, counts and profile
  /debug                        endpoint URL, loading state and last error
  /quit                         exit";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Say(&'a str),
    Persona(&'a str),
    Personas,
    Model(&'a str),
    Models,
    Questions(Option<&'a str>),
    Ask {
        persona: Option<&'a str>,
        number: usize,
    },
    Progress,
    ShowProfile,
    SetProfile {
        level: &'a str,
        learning_style: &'a str,
    },
    Reset,
    Debug,
    Help,
    Quit,
}

fn parse_question_number(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(anyhow!("question number must be 1 or more, got '{raw}'")),
    }
}

fn parse_command<'a>(line: &'a str) -> Result<Command<'a>> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let require = |arg: &'a str| -> Result<&'a str> {
        if arg.is_empty() {
            Err(anyhow!("/{name} needs an argument"))
        } else {
            Ok(arg)
        }
    };

    Ok(match name {
        "persona" => Command::Persona(require(arg)?),
        "personas" => Command::Personas,
        "model" => Command::Model(require(arg)?),
        "models" => Command::Models,
        "questions" => Command::Questions((!arg.is_empty()).then_some(arg)),
        "ask" => {
            let arg = require(arg)?;
            match arg.split_once(char::is_whitespace) {
                Some((persona, number)) => Command::Ask {
                    persona: Some(persona),
                    number: parse_question_number(number.trim())?,
                },
                None => Command::Ask {
                    persona: None,
                    number: parse_question_number(arg)?,
                },
            }
        }
        "progress" => Command::Progress,
        "profile" if arg.is_empty() => Command::ShowProfile,
        "profile" => {
            let (level, learning_style) = match arg.split_once(char::is_whitespace) {
                Some((level, style)) => (level, style.trim()),
                None => (arg, ""),
            };
            Command::SetProfile {
                level,
                learning_style,
            }
        }
        "reset" => Command::Reset,
        "debug" => Command::Debug,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(anyhow!("unknown command /{other} (try /help)")),
    })
}

fn print_history(session: &StudySession) {
    let persona = session.persona();
    println!("--- {} {} ({}) ---", persona.avatar, persona.name, persona.subject);
    for message in session.messages() {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => persona.name,
        };
        println!("{who}: {}", message.text);
    }
}

async fn run_command(session: &mut StudySession, command: Command<'_>) -> Result<bool> {
    match command {
        Command::Say(text) => {
            if let Some(reply) = session.send(text).await? {
                println!("{}: {reply}", session.persona().name);
            }
        }
        Command::Persona(id) => {
            session.select_persona(id).await?;
            print_history(session);
        }
        Command::Personas => {
            for p in PERSONAS.iter() {
                println!("  {:<12} {} {} - {}", p.id, p.avatar, p.name, p.subject);
            }
        }
        Command::Model(id) => {
            let model = session.select_model(id)?;
            println!("Model: {} ({})", model.name, model.description);
        }
        Command::Models => {
            for m in AI_MODELS.iter() {
                println!("  {:<16} {}", m.id, m.description);
            }
        }
        Command::Questions(persona_id) => {
            let persona_id = persona_id.unwrap_or(session.persona().id);
            let persona = find_persona(persona_id)
                .ok_or_else(|| anyhow!("unknown persona '{persona_id}'"))?;
            println!("{} {} ({}):", persona.avatar, persona.name, persona.subject);
            for (i, question) in persona.sample_questions.iter().enumerate() {
                println!("  {}. {question}", i + 1);
            }
        }
        Command::Ask { persona, number } => {
            let persona_id = persona.unwrap_or(session.persona().id);
            let switching = persona_id != session.persona().id;
            if let Some(reply) = session.ask_sample(persona_id, number - 1).await? {
                if switching {
                    print_history(session);
                } else {
                    println!("{}: {reply}", session.persona().name);
                }
            }
        }
        Command::Progress => {
            let progress = session.progress().await?;
            let summary = session.summary().await?;
            println!(
                "{} {} -> {} {}: {:.0}%",
                progress.current.badge,
                progress.current.title,
                progress.next.badge,
                progress.next.title,
                progress.percent
            );
            println!(
                "Teachers chatted with: {}, total messages: {}",
                summary.teachers_chatted, summary.total_messages
            );
        }
        Command::ShowProfile => match session.user_profile().await? {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => println!("No profile saved"),
        },
        Command::SetProfile {
            level,
            learning_style,
        } => {
            let education_level: EducationLevel = level.parse().map_err(|e: String| anyhow!(e))?;
            let mut profile = session.user_profile().await?.unwrap_or(UserProfile {
                education_level,
                learning_style: String::new(),
                interests: Vec::new(),
                additional_info: String::new(),
            });
            profile.education_level = education_level;
            if !learning_style.is_empty() {
                profile.learning_style = learning_style.to_string();
            }
            session.save_user_profile(&profile).await?;
            println!("Profile saved");
        }
        Command::Reset => {
            session.reset().await?;
            println!("All study data cleared");
            print_history(session);
        }
        Command::Debug => {
            let diagnostics = session.diagnostics();
            println!(
                "API URL: {}",
                diagnostics.api_url.as_deref().unwrap_or("(custom endpoint)")
            );
            println!("Test mode: {}", diagnostics.test_mode);
            println!("Loading: {}", diagnostics.loading);
            match diagnostics.last_error {
                Some(error) => println!("Last error: {error}"),
                None => println!("Last error: none"),
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load();
    let client = ChatClient::from_config(&config).context("Failed to build chat client")?;
    let store = open_store(&config).await.context("Failed to open storage")?;
    let mut session = StudySession::new(Arc::new(client), StudyStorage::new(store));
    session.open_persona(PERSONAS[0].id).await?;

    println!("Chatting via {} (type /help for commands)", config.client.api_url);
    print_history(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let keep_going = match parse_command(&line) {
            Ok(command) => run_command(&mut session, command).await.unwrap_or_else(|e| {
                eprintln!("error: {e}");
                true
            }),
            Err(e) => {
                eprintln!("error: {e}");
                true
            }
        };
        if !keep_going {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(parse_command("  what is 2+2? ").unwrap(), Command::Say("what is 2+2?"));
    }

    #[test]
    fn commands_take_arguments() {
        assert_eq!(parse_command("/persona math").unwrap(), Command::Persona("math"));
        assert_eq!(parse_command("/model o3-mini").unwrap(), Command::Model("o3-mini"));
        assert_eq!(parse_command("/profile").unwrap(), Command::ShowProfile);
        assert_eq!(
            parse_command("/profile university hands-on labs").unwrap(),
            Command::SetProfile {
                level: "university",
                learning_style: "hands-on labs"
            }
        );
        assert_eq!(parse_command("/exit").unwrap(), Command::Quit);
    }

    #[test]
    fn bad_commands_are_errors() {
        assert!(parse_command("/persona").is_err());
        assert!(parse_command("/dance").is_err());
    }

    #[test]
    fn sample_question_commands() {
        assert_eq!(parse_command("/questions").unwrap(), Command::Questions(None));
        assert_eq!(
            parse_command("/questions physics").unwrap(),
            Command::Questions(Some("physics"))
        );
        assert_eq!(
            parse_command("/ask 2").unwrap(),
            Command::Ask {
                persona: None,
                number: 2
            }
        );
        assert_eq!(
            parse_command("/ask chemistry 5").unwrap(),
            Command::Ask {
                persona: Some("chemistry"),
                number: 5
            }
        );
        assert!(parse_command("/ask").is_err());
        assert!(parse_command("/ask 0").is_err());
        assert!(parse_command("/ask math two").is_err());
        assert_eq!(parse_command("/debug").unwrap(), Command::Debug);
    }
}
