//! `factchat chat` and `factchat ask`: questions answered by the gateway.

use super::CliResult;
use super::client::{GatewayClient, Target};
use factchat_agent::{Reply, ResponseKind};
use serde_json::Value;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn ask(target: &Target, question: &str) -> CliResult<()> {
    let client = GatewayClient::for_answers(target)?;
    let reply = client.send("get-response", Value::from(question)).await?;
    println!("{}", render(&reply));
    Ok(())
}

pub async fn interactive(target: &Target) -> CliResult<()> {
    let client = GatewayClient::for_answers(target)?;

    println!();
    println!("  factchat, interactive mode");
    println!("  Server: {}", target.server);
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            break;
        }

        match client.send("get-response", Value::from(question)).await {
            Ok(reply) => {
                println!();
                for line in render(&reply).lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn is_exit(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "exit" | "quit")
}

/// Terminal rendering of a tagged reply.
fn render(reply: &Reply) -> String {
    match reply.kind {
        ResponseKind::Text => reply.text.clone(),
        ResponseKind::Image => format!("[image] {}", reply.text),
        ResponseKind::Code => format!("```\n{}\n```", reply.text),
    }
}
