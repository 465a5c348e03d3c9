mod config;
mod courses;
mod error;
mod flags;
mod otp;
mod quiz;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use courses::Catalog;
use dotenv::dotenv;
use error::{FlowError, OtpError};
use flags::FlagStore;
use log::{debug, error, info, warn};
use otp::OtpChallenge;
use quiz::navigator::StepFlow;
use quiz::tutor::{push_capped, ChatLine, ChatRole, Tutor};
use quiz::{evaluator, FlowState, StepKind, PLACEHOLDER_TRANSCRIPT};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup},
    RequestError,
};

type StudyDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type DialogueStorage = std::sync::Arc<ErasedStorage<State>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveEmail,
    ReceiveOtp {
        challenge: OtpChallenge,
    },
    Onboarding {
        flow: FlowState,
    },
    ReceiveMenuChoice,
    BrowseCourses,
    CourseDetail {
        course_id: String,
    },
    Quiz {
        course_id: Option<String>,
        flow: FlowState,
    },
    Study {
        transcript: Vec<ChatLine>,
    },
}

/// Everything the handlers share: loaded step sets, the catalog, the tutor and the flag store.
pub struct App {
    config: Config,
    onboarding: StepFlow,
    quiz: StepFlow,
    catalog: Catalog,
    tutor: Tutor,
    flags: FlagStore,
}

#[tokio::main]
async fn main() -> HandlerResult {
    // The variables may just as well come from the environment.
    dotenv().ok();

    pretty_env_logger::init();
    info!("Starting study bot...");

    let config = Config::from_env()?;
    let bot = Bot::from_env();

    info!("Opening dialogue storage at {}", config.db_path);
    let storage: DialogueStorage = SqliteStorage::open(&config.db_path, Json).await?.erase();

    let flags = FlagStore::open(config.flags_path.clone()).await?;
    let quiz_flow = config.load_quiz()?;
    info!("Quiz loaded with {} questions", quiz_flow.len());

    let tutor = match &config.openai_api_key {
        Some(key) => {
            info!("Study chat answers through ChatGPT");
            Tutor::chat_gpt(key, Duration::from_secs(15))?
        }
        None => {
            info!("No OPENAI_API_KEY set, study chat uses canned replies");
            Tutor::canned(config.tutor_delay)
        }
    };

    let app = Arc::new(App {
        config,
        onboarding: quiz::steps::onboarding_profiler(),
        quiz: quiz_flow,
        catalog: Catalog::default(),
        tutor,
        flags,
    });

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::filter(|msg: Message| msg.text() == Some("/start")).endpoint(start))
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveEmail].endpoint(receive_email))
            .branch(dptree::case![State::ReceiveOtp { challenge }].endpoint(receive_otp))
            .branch(dptree::case![State::Onboarding { flow }].endpoint(onboarding))
            .branch(dptree::case![State::ReceiveMenuChoice].endpoint(receive_menu_choice))
            .branch(dptree::case![State::BrowseCourses].endpoint(browse_courses))
            .branch(dptree::case![State::CourseDetail { course_id }].endpoint(course_detail))
            .branch(dptree::case![State::Quiz { course_id, flow }].endpoint(take_quiz))
            .branch(dptree::case![State::Study { transcript }].endpoint(study)),
    )
    .dependencies(dptree::deps![storage, app])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

const BACK: &str = "⬅️ Back";
const QUIT_QUIZ: &str = "✖️ Quit quiz";
const RESEND_CODE: &str = "🔁 Resend code";
const MENU_COURSES: &str = "📚 My courses";
const MENU_QUIZ: &str = "📝 Take a quiz";
const MENU_STUDY: &str = "💬 Study chat";
const TAKE_COURSE_QUIZ: &str = "📝 Take the course quiz";
const END_CHAT: &str = "🏁 End chat";

fn keyboard(rows: Vec<Vec<&str>>) -> KeyboardMarkup {
    KeyboardMarkup::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>()),
    )
}

const GREETING_TEXT: &str = "Hey there! I’m BusyBuddy AI, your study sidekick. Let’s ace those exams!\n\nWhat's your email address? We'll send you a verification code.";
async fn start(bot: Bot, dialogue: StudyDialogue, app: Arc<App>, msg: Message) -> HandlerResult {
    if app.flags.is_onboarded(msg.chat.id.0).await {
        bot.send_message(msg.chat.id, "Welcome back!").await?;
        return show_menu(&bot, &dialogue, msg.chat.id).await;
    }

    bot.send_message(msg.chat.id, GREETING_TEXT)
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.update(State::ReceiveEmail).await?;
    Ok(())
}

async fn send_code(bot: &Bot, chat_id: ChatId, challenge: &OtpChallenge) -> Result<(), RequestError> {
    bot.send_message(
        chat_id,
        format!("We have sent an otp to {}", challenge.masked_email()),
    )
    .await?;
    // Stand-in for the email delivery.
    bot.send_message(chat_id, format!("📨 Your BusyBuddy code: {}", challenge.code()))
        .reply_markup(keyboard(vec![vec![RESEND_CODE]]))
        .await?;
    Ok(())
}

async fn receive_email(bot: Bot, dialogue: StudyDialogue, app: Arc<App>, msg: Message) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Please type your email address")
            .await?;
        return Ok(());
    };

    match OtpChallenge::issue(text, otp::now_secs(), app.config.otp_resend_secs) {
        Ok(challenge) => {
            info!("Verification code issued for chat {}", msg.chat.id);
            send_code(&bot, msg.chat.id, &challenge).await?;
            bot.send_message(msg.chat.id, "Enter the 6-digit code to continue")
                .await?;
            dialogue.update(State::ReceiveOtp { challenge }).await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, e.to_string()).await?;
        }
    }
    Ok(())
}

async fn receive_otp(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    challenge: OtpChallenge,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();

    if text == RESEND_CODE {
        match challenge.resend(otp::now_secs()) {
            Ok(fresh) => {
                send_code(&bot, msg.chat.id, &fresh).await?;
                dialogue.update(State::ReceiveOtp { challenge: fresh }).await?;
            }
            Err(OtpError::Cooldown { remaining }) => {
                bot.send_message(msg.chat.id, format!("Resend in {} sec", remaining))
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        return Ok(());
    }

    if let Err(e) = challenge.verify(text) {
        debug!("Chat {} failed verification: {}", msg.chat.id, e);
        bot.send_message(msg.chat.id, format!("{}. Please try again.", e))
            .await?;
        return Ok(());
    }

    info!("Chat {} verified, starting onboarding", msg.chat.id);
    bot.send_message(
        msg.chat.id,
        "Email verified! Before we dive in please kindly answer a few questions",
    )
    .await?;

    let flow = app.onboarding.restart();
    ask_step(&bot, msg.chat.id, &app.onboarding, &flow, None).await?;
    dialogue.update(State::Onboarding { flow }).await?;
    Ok(())
}

/// Sends the current question with a keyboard fitting its kind.
async fn ask_step(
    bot: &Bot,
    chat_id: ChatId,
    flow: &StepFlow,
    state: &FlowState,
    quit: Option<&str>,
) -> HandlerResult {
    let step = flow.current(state)?;

    let mut text = format!(
        "Question {} of {} ({})\n\n{}",
        state.current_index + 1,
        flow.len(),
        step.kind_name(),
        step.prompt
    );
    let hint = match &step.kind {
        StepKind::SingleChoice { .. } => "Choose one of the options",
        StepKind::FreeText => "Type your answer...",
        StepKind::AudioCapture => "Send a voice message with your answer",
    };
    text.push_str(&format!("\n\n{}", hint));
    if let Some(previous) = flow.previous_answer(state) {
        text.push_str(&format!("\nPrevious answer: {}", step.display_answer(previous)));
    }

    let mut rows: Vec<Vec<&str>> = step
        .options()
        .iter()
        .map(|o| vec![o.label.as_str()])
        .collect();
    let mut navigation = Vec::new();
    if state.current_index > 0 {
        navigation.push(BACK);
    }
    navigation.extend(quit);
    if !navigation.is_empty() {
        rows.push(navigation);
    }

    let markup: ReplyMarkup = if rows.is_empty() {
        KeyboardRemove::new().into()
    } else {
        keyboard(rows).into()
    };
    bot.send_message(chat_id, text).reply_markup(markup).await?;
    Ok(())
}

enum Progress {
    Moved(FlowState),
    Retry,
    Broken(FlowError),
}

/// Applies one user message to a flow: "Back" retreats, anything else is an answer.
/// The next question is sent unless the flow just completed.
async fn apply_answer(
    bot: &Bot,
    msg: &Message,
    flow: &StepFlow,
    state: &FlowState,
    quit: Option<&str>,
) -> Result<Progress, Box<dyn std::error::Error + Send + Sync>> {
    if msg.text() == Some(BACK) {
        let previous = match flow.step_back(state) {
            Ok(previous) => previous,
            Err(e) => return Ok(Progress::Broken(e)),
        };
        ask_step(bot, msg.chat.id, flow, &previous, quit).await?;
        return Ok(Progress::Moved(previous));
    }

    let step = match flow.current(state) {
        Ok(step) => step,
        Err(e) => return Ok(Progress::Broken(e)),
    };
    let answer = match (&step.kind, msg.text()) {
        (StepKind::SingleChoice { .. }, Some(text)) => {
            step.option_value_for(text).unwrap_or(text).to_string()
        }
        (StepKind::AudioCapture, _) if msg.voice().is_some() => PLACEHOLDER_TRANSCRIPT.to_string(),
        (_, text) => text.unwrap_or_default().to_string(),
    };

    match flow.advance(state, &answer) {
        Ok(next) => {
            debug!(
                "Chat {} answered step '{}' ({} of {})",
                msg.chat.id,
                step.id,
                state.current_index + 1,
                flow.len()
            );
            if !next.is_complete {
                ask_step(bot, msg.chat.id, flow, &next, quit).await?;
            }
            Ok(Progress::Moved(next))
        }
        Err(FlowError::Validation { reason, .. }) => {
            debug!("Chat {} gave an invalid answer: {}", msg.chat.id, reason);
            let prompt = match &step.kind {
                StepKind::SingleChoice { .. } => "Please choose one of the options",
                StepKind::FreeText => "Please type an answer before moving on",
                StepKind::AudioCapture => "Please record your answer first",
            };
            bot.send_message(msg.chat.id, prompt).await?;
            Ok(Progress::Retry)
        }
        Err(e) => Ok(Progress::Broken(e)),
    }
}

async fn onboarding(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    flow: FlowState,
    msg: Message,
) -> HandlerResult {
    let next = match apply_answer(&bot, &msg, &app.onboarding, &flow, None).await? {
        Progress::Moved(next) => next,
        Progress::Retry => return Ok(()),
        Progress::Broken(e) => {
            error!("Onboarding flow broke for chat {}: {}", msg.chat.id, e);
            bot.send_message(msg.chat.id, "Something went wrong, let's start over.")
                .await?;
            return start(bot, dialogue, app, msg).await;
        }
    };

    let Some(summary) = app.onboarding.result(&next) else {
        dialogue.update(State::Onboarding { flow: next }).await?;
        return Ok(());
    };

    app.flags.set_onboarded(msg.chat.id.0).await?;
    info!("Chat {} completed onboarding", msg.chat.id);

    let profile = app
        .onboarding
        .steps()
        .iter()
        .filter_map(|step| {
            let value = summary.collected_fields.get(&step.id)?;
            Some(format!("• {}\n  {}", step.prompt, step.display_answer(value)))
        })
        .collect::<Vec<_>>()
        .join("\n");
    bot.send_message(
        msg.chat.id,
        format!("You're all set! 🎉\n\nYour study profile:\n{}", profile),
    )
    .await?;

    show_menu(&bot, &dialogue, msg.chat.id).await
}

async fn show_menu(bot: &Bot, dialogue: &StudyDialogue, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, "What would you like to do?")
        .reply_markup(keyboard(vec![
            vec![MENU_COURSES],
            vec![MENU_QUIZ],
            vec![MENU_STUDY],
        ]))
        .await?;
    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

async fn receive_menu_choice(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(MENU_COURSES) => list_courses(&bot, &dialogue, &app, msg.chat.id).await,
        Some(MENU_QUIZ) => start_quiz(&bot, &dialogue, &app, msg.chat.id, None).await,
        Some(MENU_STUDY) => {
            bot.send_message(
                msg.chat.id,
                "Start a Conversation\nSend a message to begin chatting",
            )
            .reply_markup(keyboard(vec![vec![END_CHAT]]))
            .await?;
            dialogue
                .update(State::Study {
                    transcript: Vec::new(),
                })
                .await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .await?;
            Ok(())
        }
    }
}

async fn list_courses(bot: &Bot, dialogue: &StudyDialogue, app: &App, chat_id: ChatId) -> HandlerResult {
    let courses = app.catalog.courses();
    if courses.is_empty() {
        bot.send_message(chat_id, "No study history yet").await?;
        return show_menu(bot, dialogue, chat_id).await;
    }

    let text = courses
        .iter()
        .map(|c| format!("• {}: {}% ({})", c.title, c.progress, c.readiness()))
        .collect::<Vec<_>>()
        .join("\n");
    let mut rows: Vec<Vec<&str>> = courses.iter().map(|c| vec![c.title.as_str()]).collect();
    rows.push(vec![BACK]);

    bot.send_message(chat_id, format!("My courses\n\n{}", text))
        .reply_markup(keyboard(rows))
        .await?;
    dialogue.update(State::BrowseCourses).await?;
    Ok(())
}

async fn browse_courses(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return show_menu(&bot, &dialogue, msg.chat.id).await;
    }

    let Some(course) = app.catalog.find_by_title(text) else {
        bot.send_message(msg.chat.id, "Please choose a course").await?;
        return Ok(());
    };

    let mut rows = Vec::new();
    if course.has_quiz {
        rows.push(vec![TAKE_COURSE_QUIZ]);
    }
    rows.push(vec![BACK]);
    bot.send_message(msg.chat.id, course.outline())
        .reply_markup(keyboard(rows))
        .await?;
    dialogue
        .update(State::CourseDetail {
            course_id: course.id.clone(),
        })
        .await?;
    Ok(())
}

async fn course_detail(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    course_id: String,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(BACK) => list_courses(&bot, &dialogue, &app, msg.chat.id).await,
        Some(TAKE_COURSE_QUIZ) if app.catalog.find(&course_id).is_some_and(|c| c.has_quiz) => {
            start_quiz(&bot, &dialogue, &app, msg.chat.id, Some(course_id)).await
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .await?;
            Ok(())
        }
    }
}

async fn start_quiz(
    bot: &Bot,
    dialogue: &StudyDialogue,
    app: &App,
    chat_id: ChatId,
    course_id: Option<String>,
) -> HandlerResult {
    info!("Chat {} starts a quiz (course: {:?})", chat_id, course_id);
    bot.send_message(chat_id, "Great! Let's start the quiz!").await?;

    let flow = app.quiz.restart();
    ask_step(bot, chat_id, &app.quiz, &flow, Some(QUIT_QUIZ)).await?;
    dialogue.update(State::Quiz { course_id, flow }).await?;
    Ok(())
}

async fn take_quiz(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    (course_id, flow): (Option<String>, FlowState),
    msg: Message,
) -> HandlerResult {
    if msg.text() == Some(QUIT_QUIZ) {
        bot.send_message(msg.chat.id, "Quiz cancelled").await?;
        return show_menu(&bot, &dialogue, msg.chat.id).await;
    }

    let next = match apply_answer(&bot, &msg, &app.quiz, &flow, Some(QUIT_QUIZ)).await? {
        Progress::Moved(next) => next,
        Progress::Retry => return Ok(()),
        Progress::Broken(e) => {
            error!("Quiz flow broke for chat {}: {}", msg.chat.id, e);
            bot.send_message(msg.chat.id, "Something went wrong with this quiz, let's go back.")
                .await?;
            return show_menu(&bot, &dialogue, msg.chat.id).await;
        }
    };

    let Some(summary) = app.quiz.result(&next) else {
        dialogue
            .update(State::Quiz {
                course_id,
                flow: next,
            })
            .await?;
        return Ok(());
    };

    info!(
        "Chat {} finished the quiz with {} of {}",
        msg.chat.id, summary.correct_count, summary.total
    );
    let course_title = course_id
        .as_deref()
        .and_then(|id| app.catalog.find(id))
        .map(|c| format!("{}\n", c.title))
        .unwrap_or_default();
    bot.send_message(
        msg.chat.id,
        format!(
            "Quiz Complete 🎉\n{}\nYour Score: {}/{}\nConfidence Rate: {}%",
            course_title,
            summary.correct_count,
            summary.total,
            summary.percentage()
        ),
    )
    .reply_markup(KeyboardRemove::new())
    .await?;

    for mistake in evaluator::review(app.quiz.steps(), &next.answers) {
        // Only cosmetic, a failed chat action doesn't matter.
        let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

        let explanation = match app.tutor.explain_mistake(&mistake).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Tutor couldn't explain '{}': {}", mistake.step.id, e);
                format!(
                    "The correct answer is \"{}\". Be more attentive!",
                    mistake.step.display_answer(mistake.expected)
                )
            }
        };
        bot.send_message(
            msg.chat.id,
            format!("❌ {}\n\n{}", mistake.step.prompt, explanation),
        )
        .await?;
    }

    show_menu(&bot, &dialogue, msg.chat.id).await
}

async fn study(
    bot: Bot,
    dialogue: StudyDialogue,
    app: Arc<App>,
    transcript: Vec<ChatLine>,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == END_CHAT {
        return show_menu(&bot, &dialogue, msg.chat.id).await;
    }
    if text.trim().is_empty() {
        bot.send_message(msg.chat.id, "Send a message to begin chatting")
            .await?;
        return Ok(());
    }

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    let reply = match app.tutor.reply(&transcript, text).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Tutor failed to reply in chat {}: {}", msg.chat.id, e);
            bot.send_message(
                msg.chat.id,
                "Sorry, I couldn't come up with an answer right now. Please try again.",
            )
            .await?;
            return Ok(());
        }
    };

    let mut transcript = transcript;
    push_capped(&mut transcript, ChatLine::new(ChatRole::User, text.trim()));
    push_capped(&mut transcript, ChatLine::new(ChatRole::Assistant, &reply));

    bot.send_message(msg.chat.id, reply).await?;
    dialogue.update(State::Study { transcript }).await?;
    Ok(())
}
