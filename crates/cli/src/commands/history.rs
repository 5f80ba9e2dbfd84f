//! `parley history`: inspect or clear a session's turns.

use parley_core::message::SessionId;

use super::runtime;

pub async fn show(session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let (turns, _) = runtime::open_stores(&config).await?;

    let history = turns.load(&SessionId::from(session)).await?;
    if history.is_empty() {
        println!("No turns stored for session {session}.");
        return Ok(());
    }

    for turn in &history {
        println!(
            "[{}] {}: {}",
            turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
            turn.role.label(),
            turn.text
        );
    }
    Ok(())
}

pub async fn clear(session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    let (turns, _) = runtime::open_stores(&config).await?;

    turns.clear(&SessionId::from(session)).await?;
    println!("Cleared history for session {session}.");
    Ok(())
}
