//! `toolloop demo`: a conversation with the offline demo model.

use std::io::Write;
use std::sync::Arc;

use toolloop_config::{EngineConfig, InvocationMode, ResponseMode};
use toolloop_engine::{LoopEvent, LoopSettings, Orchestrator, Outcome};
use tracing::debug;

use super::default_catalog;
use crate::demo_provider::DemoProvider;

pub struct DemoOptions {
    pub city: String,
    pub stream: bool,
    pub manual: bool,
    pub max_iterations: Option<u32>,
}

pub async fn run(options: DemoOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if options.stream {
        config.response_mode = ResponseMode::Streamed;
    }
    if options.manual {
        config.invocation_mode = InvocationMode::Manual;
    }
    if let Some(max) = options.max_iterations {
        config.max_iterations = max;
    }
    config.validate()?;
    debug!(
        model = %config.model,
        mode = ?config.invocation_mode,
        responses = ?config.response_mode,
        "Starting demo conversation"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(DemoProvider),
        default_catalog()?,
        LoopSettings::from_config(&config),
    );
    let mut conversation = orchestrator.start_conversation();
    let mut events = conversation.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let question = format!("What time is it, and what is the weather like in {}?", options.city);
    println!("> {question}");
    let mut outcome = orchestrator.submit(&mut conversation, &question).await;

    while let Outcome::Suspended { pending } = &outcome {
        println!("⏸  Waiting on {} tool call(s); running them here", pending.len());
        for call in pending {
            let result = orchestrator.invoke_pending(&mut conversation, &call.id).await?;
            println!("   {} ← {}", call.id, result.render());
        }
        outcome = orchestrator.resume(&mut conversation).await?;
    }

    let usage = conversation.usage();
    let iterations = conversation.iterations();
    // Closing the event channel lets the printer drain and finish
    drop(conversation);
    printer.await?;

    match outcome {
        Outcome::Completed { .. } => {
            println!();
            println!(
                "   {iterations} tool cycle(s), {} tokens ({} prompt, {} completion)",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
            Ok(())
        }
        Outcome::Failed { reason } => Err(reason.into()),
        Outcome::Suspended { .. } => Ok(()),
    }
}

fn print_event(event: &LoopEvent) {
    match event {
        LoopEvent::TextDelta { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        LoopEvent::ToolCall {
            id,
            function,
            arguments,
        } => {
            println!();
            println!("🔧 {function}({arguments}) [{id}]");
        }
        LoopEvent::ToolResult {
            id,
            success,
            output,
            ..
        } => {
            let mark = if *success { "✅" } else { "❌" };
            println!("   {mark} {id}: {output}");
        }
        LoopEvent::Suspended { .. } => {}
        LoopEvent::Completed { .. } => println!(),
        LoopEvent::Failed { reason } => {
            println!();
            println!("❌ {reason}");
        }
    }
}
