//! Fact and history commands: `upload-facts`, `create-training-file`,
//! `kill-all-facts`, `clear-history`.

use super::CliResult;
use super::client::{GatewayClient, REQUEST_TIMEOUT, Target};
use serde_json::{Value, json};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub async fn clear_history(target: &Target) -> CliResult<()> {
    let client = GatewayClient::new(target, REQUEST_TIMEOUT)?;
    let reply = client.send("clear-history", Value::from("")).await?;
    println!("{}", reply.text);
    Ok(())
}

pub async fn upload(target: &Target, file: Option<&Path>) -> CliResult<()> {
    let client = GatewayClient::new(target, REQUEST_TIMEOUT)?;
    match file {
        Some(path) => upload_file(&client, path).await,
        None => upload_interactive(&client).await,
    }
}

async fn upload_file(client: &GatewayClient, path: &Path) -> CliResult<()> {
    println!("Uploading facts from {}...", path.display());
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;

    let (facts, rejected) = parse_fact_lines(&content);
    for (line, reason) in &rejected {
        warn!(line, reason = %reason, "Skipping malformed fact");
    }

    let mut stored = 0;
    for fact in facts {
        let reply = client.send("write-fact", fact).await?;
        println!("  {}", reply.text);
        stored += 1;
    }

    println!("Uploaded {stored} facts ({} skipped).", rejected.len());
    Ok(())
}

async fn upload_interactive(client: &GatewayClient) -> CliResult<()> {
    println!("Enter question/answer pairs. An empty question stops.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Question> ");
        std::io::stdout().flush()?;
        let Some(question) = lines.next_line().await? else { break };
        let question = question.trim().to_string();
        if question.is_empty() {
            break;
        }

        print!("Answer> ");
        std::io::stdout().flush()?;
        let Some(answer) = lines.next_line().await? else { break };

        let fact = json!({ "prompt": question, "completion": answer.trim() });
        let reply = client.send("write-fact", fact).await?;
        println!("{}", reply.text);
    }

    Ok(())
}

/// JSON objects from a JSONL document, plus `(line number, reason)` for
/// each non-blank line that is not one.
fn parse_fact_lines(content: &str) -> (Vec<Value>, Vec<(usize, String)>) {
    let mut facts = Vec::new();
    let mut rejected = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => facts.push(value),
            Ok(_) => rejected.push((i + 1, "not a JSON object".to_string())),
            Err(e) => rejected.push((i + 1, e.to_string())),
        }
    }

    (facts, rejected)
}

pub async fn create_training_file(target: &Target, newer_than: Option<&str>) -> CliResult<()> {
    match newer_than {
        Some(date) => println!("Creating training file with facts stored on or after {date}..."),
        None => println!("Creating training file from all facts..."),
    }

    let client = GatewayClient::new(target, REQUEST_TIMEOUT)?;
    let reply = client
        .send("create-training-file", Value::from(newer_than.unwrap_or_default()))
        .await?;
    println!("{}", reply.text);
    Ok(())
}

pub async fn kill_all(target: &Target) -> CliResult<()> {
    println!("Deleting all stored facts...");
    let client = GatewayClient::new(target, REQUEST_TIMEOUT)?;
    let reply = client.send("kill-all-facts", Value::from("")).await?;
    println!("{}", reply.text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_lines_skip_blanks_and_report_bad_lines() {
        let content = concat!(
            "{\"prompt\": \"Who wrote Dune?\", \"completion\": \"Frank Herbert\"}\n",
            "\n",
            "not json\n",
            "[1, 2]\n",
            "{\"prompt\": \"Capital of France?\", \"completion\": \"Paris\"}\n",
        );

        let (facts, rejected) = parse_fact_lines(content);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1]["completion"], "Paris");
        assert_eq!(rejected.iter().map(|(line, _)| *line).collect::<Vec<_>>(), vec![3, 4]);
    }
}
