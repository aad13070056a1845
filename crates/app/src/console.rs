//! Line-oriented front end for one attempt.

use std::error::Error;

use exam_core::model::{Attempt, Position};
use services::{
    AttemptResult, AttemptSession, SelectOutcome, SessionProgress, SlotIndicator, WriteOutcome,
    run_countdown,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

enum Input {
    Show,
    Next,
    Previous,
    GoTo(Position),
    Choose(usize),
    Retry,
    Status,
    Submit,
    Quit,
    Help,
}

impl Input {
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Ok(Self::Show);
        };
        let arg = parts.next();
        match (word, arg) {
            ("show" | "s", None) => Ok(Self::Show),
            ("next" | "n", None) => Ok(Self::Next),
            ("prev" | "p", None) => Ok(Self::Previous),
            ("goto" | "g", Some(raw)) => raw
                .parse::<Position>()
                .map(Self::GoTo)
                .map_err(|_| format!("not a question number: {raw}")),
            ("answer" | "a", Some(raw)) => raw
                .parse::<usize>()
                .map(Self::Choose)
                .map_err(|_| format!("not a choice number: {raw}")),
            ("retry", None) => Ok(Self::Retry),
            ("status", None) => Ok(Self::Status),
            ("submit", None) => Ok(Self::Submit),
            ("quit" | "q", None) => Ok(Self::Quit),
            ("help" | "?", None) => Ok(Self::Help),
            _ => Err(format!("unrecognized command: {line}")),
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  show | s            show the current question");
    println!("  next | n, prev | p  move between questions");
    println!("  goto | g <n>        jump to question n");
    println!("  answer | a <k>      choose option k for the current question");
    println!("  retry               resend answers that failed to sync");
    println!("  status              time left and progress");
    println!("  submit              finish the attempt");
    println!("  quit | q            leave; the attempt stays open");
}

/// Drive an attempt from stdin until it is submitted, times out, or the user quits.
pub async fn run_session(session: AttemptSession) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut timer = tokio::spawn(run_countdown(session.clone()));
    let mut timer_running = true;

    print_question(&session);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Submit) => {
                        if submit(&session).await {
                            return Ok(());
                        }
                    }
                    Ok(input) => handle(&session, input).await,
                    Err(message) => println!("{message} (try `help`)"),
                }
            }
            finished = &mut timer, if timer_running => {
                timer_running = false;
                match finished? {
                    Some(Ok(result)) => {
                        println!("time is up, attempt submitted");
                        print_result(&result);
                        return Ok(());
                    }
                    Some(Err(err)) => println!("time is up but submission failed: {err}; use `retry` then `submit`"),
                    None => {}
                }
            }
        }
    }

    session.close().await;
    println!("left attempt {}; run `take` again to resume", session.id());
    Ok(())
}

async fn handle(session: &AttemptSession, input: Input) {
    match input {
        Input::Help => print_help(),
        Input::Show => print_question(session),
        Input::Next => {
            session.next();
            print_question(session);
        }
        Input::Previous => {
            session.previous();
            print_question(session);
        }
        Input::GoTo(position) => match session.go_to(position) {
            Ok(_) => print_question(session),
            Err(err) => println!("{err}"),
        },
        Input::Choose(index) => match session.select_current(index) {
            Ok(SelectOutcome::Dispatch(dispatch)) => {
                tokio::spawn(async move {
                    if let WriteOutcome::Failed { position, error, .. } = dispatch.run().await {
                        println!("answer to question {position} not saved yet ({error})");
                    }
                });
            }
            Ok(SelectOutcome::Queued | SelectOutcome::Suppressed) => {}
            Err(err) => println!("{err}"),
        },
        Input::Retry => match session.retry_pending().await {
            Ok(report) if report.is_clean() => {
                println!("{} answer(s) synced", report.confirmed.len());
            }
            Ok(report) => println!(
                "{} answer(s) synced, {} still failing",
                report.confirmed.len(),
                report.failed.len()
            ),
            Err(err) => println!("{err}"),
        },
        Input::Status => print_progress(&session.progress()),
        Input::Submit | Input::Quit => {}
    }
}

/// Returns `true` once the attempt is completed.
async fn submit(session: &AttemptSession) -> bool {
    let unsynced = session.unsynced_positions();
    if !unsynced.is_empty() {
        println!(
            "{} answer(s) have not reached the server yet; submitting retries them first",
            unsynced.len()
        );
    }
    match session.complete().await {
        Ok(result) => {
            print_result(&result);
            true
        }
        Err(err) => {
            warn!(attempt_id = %session.id(), error = %err, "submission failed");
            let positions = err.unsynced_positions();
            if positions.is_empty() {
                println!("submission failed: {err}");
            } else {
                let list: Vec<String> = positions.iter().map(ToString::to_string).collect();
                println!("submission failed, unsynced questions: {}", list.join(", "));
            }
            false
        }
    }
}

fn print_question(session: &AttemptSession) {
    let position = session.cursor();
    println!();
    println!(
        "[{}] question {position}/{}",
        session.progress().countdown_label(),
        session.total_questions()
    );
    let Some(question) = session.question(position) else {
        println!("  (question text unavailable)");
        return;
    };
    println!("  {}", question.content());
    let chosen = session.answer(position);
    for (index, option) in question.options().iter().enumerate() {
        let mark = if chosen == Some(option.id) { '*' } else { ' ' };
        println!("  {mark} {}. {}", index + 1, option.text);
    }
}

fn print_progress(progress: &SessionProgress) {
    let warning = if progress.is_low_time() { "  (low time)" } else { "" };
    println!("time left {}{warning}", progress.countdown_label());
    println!(
        "answered {}/{}, unsynced {}, sending {}",
        progress.answered, progress.total, progress.pending, progress.in_flight
    );
    let grid: String = progress
        .indicators
        .iter()
        .map(|indicator| match indicator {
            SlotIndicator::Current => '>',
            SlotIndicator::Answered => '#',
            SlotIndicator::Unanswered => '.',
        })
        .collect();
    println!("{grid}");
}

fn print_result(result: &AttemptResult) {
    println!(
        "score {:.1}% ({}/{} correct), {}",
        result.score,
        result.correct_answers,
        result.total_questions,
        if result.passed { "passed" } else { "not passed" }
    );
    if !result.weak_topics.is_empty() {
        println!("review: {}", result.weak_topics.join(", "));
    }
}

/// Print a finished attempt slot by slot.
pub fn print_review(attempt: &Attempt) {
    println!(
        "{} ({}), {} questions",
        attempt.test_type().title(),
        attempt.status().as_str(),
        attempt.total_questions()
    );
    for slot in attempt.slots() {
        let verdict = match slot.is_correct {
            Some(true) => "correct",
            Some(false) => "wrong",
            None if slot.answer.is_some() => "answered",
            None => "skipped",
        };
        let text = slot
            .question
            .as_ref()
            .map_or("(question text unavailable)", |q| q.content());
        println!("{:>3}. [{verdict}] {text}", slot.position.value());
    }
}
