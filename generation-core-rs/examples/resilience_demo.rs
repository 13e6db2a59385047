//! Generation Resilience Demo
//!
//! Runs a simulated, unreliable story provider through the generation
//! service to show transport retries, fallback failover, circuit breaking
//! and quality-gated regeneration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use generation_core::{
    init_logging, CircuitBreakerConfig, ContentType, GenerationConfig, GenerationError,
    GenerationRequest, GenerationService, LoggingConfig, RawGenerationResult, RegenerationSettings,
    RetryConfig,
};

const STORY: &str = concat!(
    "Luna and the Lantern of Stars\n\n",
    "Once upon a time, in a quiet village by the sea, there lived a curious girl named Luna. Every night she watched the sparkling stars from her window and wondered why they glowed.\n\n",
    "One day, Luna found an ancient lantern in the attic of her grandmother. \"What is this?\" she asked. Her grandmother smiled. \"It is a magical lantern. It helps you discover the secrets of the sky.\"\n\n",
    "Luna was excited! That evening she climbed the hill with her friend Theo. Together they opened the lantern, and a gentle, golden light floated up toward the moon. Suddenly, the stars began to whisper. \"Count us, and you will learn our names,\" they said.\n\n",
    "Luna and Theo counted the stars one by one. They learned that stars are giant balls of burning gas, very far away. Theo was worried at first, but Luna was brave and helped him understand the shapes of the constellations.\n\n",
    "Finally, the lantern dimmed and the children walked home, proud and happy. From that day on, Luna and Theo explored the night sky together and shared what they learned with everyone in the village. The end.",
);

const WEAK_STORY: &str = "A cat sat. The end.";

fn story(content: &str, provider: &str) -> RawGenerationResult {
    RawGenerationResult::new(content, provider, "demo-model")
}

#[tokio::main]
async fn main() -> Result<(), GenerationError> {
    init_logging(Some(LoggingConfig {
        level: "info".to_string(),
        service_name: "resilience-demo".to_string(),
        ..LoggingConfig::default()
    }))?;

    println!("Generation Resilience Demo");
    println!("==========================\n");

    let config = GenerationConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.1,
            timeout_ms: 2000,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout_ms: 2000,
        },
        regeneration: RegenerationSettings {
            regeneration_delay_ms: 200,
            ..RegenerationSettings::default()
        },
        ..GenerationConfig::default()
    };
    let service = GenerationService::builder().config(config).build()?;
    let request = GenerationRequest::new(ContentType::StoryContent);

    // Step 1: a provider that drops the connection twice
    println!("RETRY");
    println!("-----");
    let calls = Arc::new(AtomicUsize::new(0));
    let result = service
        .generate(&request, || {
            let calls = Arc::clone(&calls);
            async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(50)).await;
                if attempt <= 2 {
                    println!("Provider call {}: connection reset", attempt);
                    Err(anyhow!("connection reset by peer"))
                } else {
                    println!("Provider call {}: story delivered", attempt);
                    Ok(story(STORY, "primary"))
                }
            }
        })
        .await?;
    println!(
        "Accepted '{}' after {} provider call(s), overall score {:?}\n",
        result.content.title(),
        result.resilience.attempt_count,
        result.validation.as_ref().map(|v| v.quality_score.overall)
    );

    // Step 2: the primary is down, a backup provider answers
    println!("FALLBACK");
    println!("--------");
    let result = service
        .generate_with_fallback(
            &request,
            || async { Err::<RawGenerationResult, _>(anyhow!("503 service unavailable")) },
            Some(|| async { Ok::<_, anyhow::Error>(story(STORY, "backup")) }),
        )
        .await?;
    println!(
        "Served by '{}' (fallback used: {}, provider calls: {})\n",
        result.raw.provider, result.resilience.fallback_used, result.resilience.attempt_count
    );

    // Step 3: repeated outages open the circuit
    println!("CIRCUIT BREAKER");
    println!("---------------");
    let outline = GenerationRequest::new(ContentType::StoryOutline);
    for i in 1..=3 {
        let outcome = service
            .generate(&outline, || async {
                Err::<RawGenerationResult, _>(anyhow!("network unreachable"))
            })
            .await;
        match outcome {
            Ok(_) => println!("Request {}: succeeded (unexpected)", i),
            Err(e) => println!("Request {}: {} [{}]", i, e.user_message(), e.code()),
        }
        println!(
            "Circuit for {}: {}",
            ContentType::StoryOutline,
            service.circuit_state(ContentType::StoryOutline)
        );
    }
    println!();

    // Step 4: weak content is regenerated until it passes the quality gate
    println!("QUALITY-GATED REGENERATION");
    println!("--------------------------");
    let drafts = Arc::new(AtomicUsize::new(0));
    let result = service
        .generate(&request, || {
            let drafts = Arc::clone(&drafts);
            async move {
                if drafts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok::<_, anyhow::Error>(story(WEAK_STORY, "primary"))
                } else {
                    Ok(story(STORY, "primary"))
                }
            }
        })
        .await?;
    println!(
        "Accepted on attempt {} (best overall {:?})",
        result.attempts, result.best_overall
    );
    for note in &result.improvement_feedback {
        println!("  feedback from rejected draft: {}", note);
    }

    service.shutdown();
    Ok(())
}
