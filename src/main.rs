use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_attempt_client::utils::retry::RetryPolicy;
use quiz_attempt_client::utils::time::format_mm_ss;
use quiz_attempt_client::{
    fetch_quiz_with_retry, ApiClient, AttemptEngine, AttemptPhase, Config, Countdown,
    ProgressStore, Question, QuizBackend, Results, StartOutcome, SubmitTrigger, TimerEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_attempt_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (quiz_id, user_id) = match (args.next(), args.next()) {
        (Some(quiz_id), Some(user_id)) => (quiz_id, user_id),
        _ => {
            eprintln!("usage: quiz-attempt-client <quiz-id> <user-id>");
            std::process::exit(2);
        }
    };

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(api_base_url = %config.api_base_url, "configuration loaded");

    let backend: Arc<dyn QuizBackend> = Arc::new(ApiClient::new(
        config.api_base_url.clone(),
        config.request_timeout(),
    )?);

    let quiz = fetch_quiz_with_retry(backend.as_ref(), &RetryPolicy::default(), &quiz_id)
        .await
        .context("could not load the quiz; check the backend and try again")?;

    println!("{}", quiz.title);
    if let Some(description) = &quiz.description {
        println!("{}", description);
    }
    println!(
        "{} questions, pass mark {}%, time limit {} minutes\n",
        quiz.questions.len(),
        quiz.passing_score,
        quiz.time_limit_minutes
            .unwrap_or(config.default_time_limit_minutes)
    );

    let engine = Arc::new(AttemptEngine::new(
        quiz,
        backend,
        ProgressStore::new(config.storage_dir.clone()),
        config.default_time_limit_minutes,
    ));

    match engine.start(&user_id).await? {
        StartOutcome::Restored { remaining_seconds } => println!(
            "Progress restored — {} remaining.\n",
            format_mm_ss(remaining_seconds)
        ),
        StartOutcome::Fresh => {}
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let countdown = Countdown::spawn(engine.clone(), config.tick_interval(), events_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut time_expired = false;

    'quiz: while engine.phase() == AttemptPhase::InProgress && !engine.all_answered() {
        let index = engine.current_question();
        let Some(question) = engine.quiz().questions.get(index).cloned() else {
            break;
        };
        print_question(index, engine.quiz().questions.len(), &question);
        println!("[{} remaining]", format_mm_ss(engine.remaining_seconds()));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read stdin")? else {
                        break 'quiz;
                    };
                    match parse_answer(&question, line.trim()) {
                        Some(token) => {
                            engine.select_answer(&question.id, &token)?;
                            engine.next_question();
                            break;
                        }
                        None if question.options.is_empty() => {
                            println!("Enter an answer:");
                        }
                        None => {
                            println!("Enter a number between 1 and {}:", question.options.len());
                        }
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Some(TimerEvent::TimeExpired(_)) => {
                            println!("\nTime is up — submitting your answers.");
                            time_expired = true;
                            break 'quiz;
                        }
                        Some(TimerEvent::TimerTick(tick))
                            if tick.remaining_seconds % 60 == 0 || tick.remaining_seconds <= 10 =>
                        {
                            println!("[{} remaining]", format_mm_ss(tick.remaining_seconds));
                        }
                        Some(_) => {}
                        None => break 'quiz,
                    }
                }
            }
        }
    }

    let results = match wait_for_results(&engine).await {
        Some(results) => results,
        None => {
            // after an observed expiry the auto-submit may have failed;
            // retry with partial answers allowed
            let trigger = if time_expired {
                SubmitTrigger::Expiry
            } else {
                SubmitTrigger::Manual
            };
            engine
                .submit(trigger)
                .await?
                .ok_or_else(|| anyhow!("submission already in flight"))?
        }
    };
    countdown.stop();

    print_results(&results);
    Ok(())
}

fn print_question(index: usize, total: usize, question: &Question) {
    println!("\nQuestion {}/{}: {}", index + 1, total, question.text);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}

/// Multiple choice answers are stored as the zero-based option index in
/// string form; free-text questions take the line as-is.
fn parse_answer(question: &Question, input: &str) -> Option<String> {
    if question.options.is_empty() {
        if input.is_empty() {
            return None;
        }
        return Some(input.to_string());
    }
    let n: usize = input.parse().ok()?;
    if n == 0 || n > question.options.len() {
        return None;
    }
    Some((n - 1).to_string())
}

/// The expiry path submits from the countdown task; wait for its result
/// before falling back to a manual submission.
async fn wait_for_results(engine: &AttemptEngine) -> Option<Results> {
    for _ in 0..100 {
        if let Some(results) = engine.results() {
            return Some(results);
        }
        if engine.phase() == AttemptPhase::InProgress && !engine.is_submitting() {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    engine.results()
}

fn print_results(results: &Results) {
    println!(
        "\nScore: {}% ({}/{} correct) — {}",
        results.score,
        results.correct_count,
        results.total_questions,
        if results.passed { "passed" } else { "failed" }
    );
    for detail in &results.detailed_results {
        let mark = if detail.is_correct { "correct" } else { "wrong" };
        let selected = detail.selected_answer.as_deref().unwrap_or("(no answer)");
        println!(
            "  {}: {} — answered {}, correct answer {}",
            detail.question_id, mark, selected, detail.correct_answer
        );
        if let Some(explanation) = &detail.explanation {
            println!("    {}", explanation);
        }
    }
}
