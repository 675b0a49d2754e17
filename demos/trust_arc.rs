//! # Trust Arc
//!
//! Two days of finance conversation with one assistant. Day one starts from
//! nothing; the state file is saved, the session is dropped, and day two
//! reopens it. Shows per-context isolation (depth and session phase are part
//! of the fingerprint), hysteresis, a stress turn, and warm-start recovery.
//!
//! ```text
//! RUST_LOG=ccf_text=debug cargo run --example trust_arc
//! ```

use ccf_text::session::{SessionConfig, TrustSession, TurnReading};
use ccf_text::store::{self, LoadOutcome};
use tracing_subscriber::EnvFilter;

const TURNS: [&str; 30] = [
    "hi, I want to get better with money",
    "can you help me set up a budget?",
    "my salary is about 3k a month after tax",
    "rent takes almost half of it",
    "I also have a credit card with some debt on it",
    "what interest rate is normal for a credit card?",
    "mine is 24 percent, is that bad?",
    "should I pay the debt first or start savings?",
    "ok, how big should an emergency fund be?",
    "is a savings account enough or should I invest?",
    "what about index funds?",
    "how do I pick a broker?",
    "fees seem confusing, what should I look for?",
    "I think I can put 200 a month into investing",
    "what happens to my portfolio if the stock market drops?",
    "how often should I rebalance?",
    "my partner and I want to buy a house in five years",
    "how does a mortgage deposit work?",
    "should we open a joint account?",
    "what about pension contributions through work?",
    "does my employer match matter much?",
    "ok so the budget is rent, bills, debt, savings, invest",
    "I'm panicking, I just lost a big chunk of money on a crypto trade",
    "sorry, I calmed down. it was 500, not the end of the world",
    "should I keep any crypto at all?",
    "how do taxes work on investment gains?",
    "do I need an accountant?",
    "can you summarise my plan?",
    "thanks, this was really helpful",
    "talk tomorrow",
];

fn bar(v: f32) -> String {
    let filled = (v * 20.0).round() as usize;
    let empty = 20usize.saturating_sub(filled);
    format!("[{}{}] {:.2}", "█".repeat(filled), "░".repeat(empty), v)
}

fn print_turn(r: &TurnReading) {
    let marker = if r.phase != r.previous_phase {
        format!("  ← {} → {}", r.previous_phase, r.phase)
    } else {
        String::new()
    };
    println!(
        "  {:>2} {:<42} eff {}  {:<18}{}",
        r.turn,
        r.label,
        bar(r.effective_coherence),
        r.phase.label(),
        marker
    );
}

fn run_day(session: &mut TrustSession) {
    for (i, text) in TURNS.iter().enumerate() {
        // Turn 23 reads as acute stress; everything else as an engaged user.
        let instant = if i == 22 { 0.15 } else { 0.8 };
        let reading = session.begin_turn(text, Some(instant));
        print_turn(&reading);
        session.record_outcome(i != 22);
    }
}

fn main() -> ccf_text::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::temp_dir().join("ccf_trust_arc_demo.json");
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    let config = SessionConfig {
        state_path: Some(path.clone()),
        autosave_every: 5,
        base_prompt: "You are a personal finance assistant.".into(),
        ..SessionConfig::default()
    };

    println!("═══ Day 1: first conversation ═══");
    let mut day_one = TrustSession::open(config.clone())?;
    run_day(&mut day_one);
    day_one.save()?;
    println!("\n  contexts learned: {}", day_one.field().context_count());
    drop(day_one);

    if let LoadOutcome::Restored(state) = store::load(&path)? {
        println!(
            "  state file: {} contexts, written by {}",
            state.field.context_count(),
            state.ccf_version.as_deref().unwrap_or("unknown")
        );
    }

    println!("\n═══ Day 2: same topics, trust remembered ═══");
    let mut day_two = TrustSession::open(config)?;
    run_day(&mut day_two);
    day_two.save()?;

    println!("\n═══ Final system prompt ═══");
    let last = day_two.begin_turn("one more question about budgeting", None);
    println!("{}", last.system_prompt);

    std::fs::remove_file(&path)?;
    Ok(())
}
