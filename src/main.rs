//! Terminal front end for a case dialogue.
//!
//! Usage: `case-dialogue <case.yaml> <student name> [options.yaml] [persona | persona.yaml]`
//!
//! The last argument is either a built-in persona name or a persona override
//! file carrying its own instructions.
//!
//! Type messages at the prompt. `/proceed` runs the evaluation once the
//! feedback questions are done, `/restart` starts over and `/quit` exits.

use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use case_dialogue::adapters::ai::{ClientRegistry, RegistrySessionFactory};
use case_dialogue::adapters::{load_case, load_options, load_persona_override, CaseFileError};
use case_dialogue::application::{
    wait_until, ControllerError, ConversationController, ConversationSetup, Notice, TurnOutcome,
};
use case_dialogue::config::{AppConfig, ConfigError, LoggingConfig, ValidationError};
use case_dialogue::domain::conversation::{ChatOptions, ConversationPhase, Role};
use case_dialogue::domain::persona::{PersonaId, UnknownPersona};
use case_dialogue::ports::AIError;

const USAGE: &str =
    "usage: case-dialogue <case.yaml> <student name> [options.yaml] [persona | persona.yaml]";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error(transparent)]
    CaseFile(#[from] CaseFileError),

    #[error(transparent)]
    Persona(#[from] UnknownPersona),

    #[error(transparent)]
    Provider(#[from] AIError),

    #[error(transparent)]
    Conversation(#[from] ControllerError),

    #[error("Failed to encode evaluation: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct Args {
    case_path: String,
    student_name: String,
    options_path: Option<String>,
    persona: Option<String>,
}

fn parse_args() -> Result<Args, CliError> {
    let mut args = std::env::args().skip(1);
    let case_path = args.next().ok_or(CliError::Usage(USAGE))?;
    let student_name = args.next().ok_or(CliError::Usage(USAGE))?;
    let options_path = args.next();
    let persona = args.next();
    Ok(Args {
        case_path,
        student_name,
        options_path,
        persona,
    })
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate()?;

    let args = parse_args()?;
    let case = load_case(&args.case_path).await?;
    let options = match &args.options_path {
        Some(path) => load_options(path).await?,
        None => ChatOptions::default(),
    };

    let registry = ClientRegistry::from_config(&config.ai)?;
    let factory = Arc::new(RegistrySessionFactory::new(Arc::new(registry)));

    let mut setup = ConversationSetup::new(
        case,
        options,
        args.student_name,
        config.ai.default_model.clone(),
    )
    .with_evaluation_model(config.ai.evaluation_model())
    .with_retry_delay(config.chat.retry_delay())
    .with_generation(config.ai.generation());
    if let Some(persona) = &args.persona {
        if persona.ends_with(".yaml") || persona.ends_with(".yml") {
            let row = load_persona_override(persona).await?;
            setup = setup.with_persona(row.persona).with_persona_override(row);
        } else {
            setup = setup.with_persona(persona.parse::<PersonaId>()?);
        }
    }

    let mut controller = ConversationController::new(setup, factory);
    let speaker = controller.setup().case.protagonist.name.clone();

    println!("{}", controller.setup().case.title);
    render(&speaker, &controller.start()?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    "/quit" => break,
                    "/restart" => {
                        controller.restart();
                        render(&speaker, &controller.start()?);
                    }
                    "/proceed" => match controller.proceed_to_evaluation().await {
                        Ok(result) => {
                            println!("{}", serde_json::to_string_pretty(&result)?);
                            break;
                        }
                        Err(e) => eprintln!("! {}", e),
                    },
                    text => match controller.submit(text).await {
                        Ok(outcome) => render(&speaker, &outcome),
                        Err(e) => eprintln!("! {}", e),
                    },
                }
            }
            _ = wait_until(controller.retry_deadline()) => {
                if let Some(outcome) = controller.fire_retry().await {
                    println!();
                    render(&speaker, &outcome);
                }
            }
        }
    }

    if controller.transcript_consent() {
        tracing::info!(
            conversation_id = %controller.id(),
            "Learner consented to keeping the transcript"
        );
    }
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}

fn render(speaker: &str, outcome: &TurnOutcome) {
    for message in outcome.appended.iter().filter(|m| m.role == Role::Model) {
        println!("{}: {}", speaker, message.content);
    }
    if let Some(message) = &outcome.replaced {
        println!("{}: {}", speaker, message.content);
    }
    for notice in &outcome.notices {
        match notice {
            Notice::Error(text) => eprintln!("! {}", text),
            Notice::ClearError => {}
            Notice::Alert => eprint!("\x07"),
            Notice::HintRefused => {}
            Notice::Rejected(reason) => eprintln!("! {}", reason),
            Notice::TranscriptConsent(_) => {}
        }
    }
    if outcome.phase == ConversationPhase::FeedbackComplete {
        println!("(type /proceed for your evaluation)");
    }
}
