//! Tests for the retry executor, circuit breaker and fallback orchestration
//!
//! Time-dependent tests run on a paused tokio clock so backoff waits are
//! measured exactly.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::anyhow;
    use tokio::time::Instant;

    use crate::error::{classify, ErrorKind};
    use crate::events::{drain_events, ChannelEventSink, EventName};
    use crate::resilience::{
        CircuitBreaker, CircuitBreakerConfig, CircuitState, ManualClock, Resilience, RetryConfig,
        RetryExecutor,
    };

    fn retry_config(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter_factor: 0.0,
            timeout_ms: 30_000,
        }
    }

    fn resilience(retry: RetryConfig, breaker: CircuitBreakerConfig) -> Resilience {
        Resilience::new(retry, breaker).unwrap()
    }

    fn gaps(stamps: &[Instant]) -> Vec<Duration> {
        stamps.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_exponential_and_capped() {
        let config = retry_config(5, 100, 2000);
        let expected: Vec<u64> = (1..=5).map(|n| config.backoff_delay(n).as_millis() as u64).collect();
        assert_eq!(expected, vec![100, 200, 400, 800, 1600]);

        let stamps = Arc::new(Mutex::new(Vec::new()));
        let r = resilience(config, CircuitBreakerConfig { failure_threshold: 10, ..Default::default() });

        let result = r
            .execute("op", || {
                let stamps = Arc::clone(&stamps);
                async move {
                    stamps.lock().unwrap().push(Instant::now());
                    Err::<(), _>(anyhow!("connection refused"))
                }
            })
            .await;

        assert!(!result.is_success());
        assert_eq!(result.metadata().attempt_count, 5);

        let stamps = stamps.lock().unwrap().clone();
        let observed = gaps(&stamps);
        assert_eq!(observed.len(), 4);
        for (gap, expected_ms) in observed.iter().zip([100u64, 200, 400, 800]) {
            let expected = Duration::from_millis(expected_ms);
            assert!(*gap >= expected, "gap {:?} shorter than {:?}", gap, expected);
            assert!(*gap < expected + Duration::from_millis(5), "gap {:?} longer than {:?}", gap, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_never_exceeds_max_delay() {
        let config = retry_config(4, 1000, 1500);
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let r = resilience(config, CircuitBreakerConfig { failure_threshold: 10, ..Default::default() });

        r.execute("op", || {
            let stamps = Arc::clone(&stamps);
            async move {
                stamps.lock().unwrap().push(Instant::now());
                Err::<(), _>(anyhow!("request timed out"))
            }
        })
        .await;

        let stamps = stamps.lock().unwrap().clone();
        for gap in gaps(&stamps) {
            assert!(gap < Duration::from_millis(1505), "gap {:?} exceeds cap", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_error_attempted_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let r = resilience(retry_config(5, 10, 100), CircuitBreakerConfig::default());

        let result = r
            .execute("op", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow!("401 Unauthorized: invalid api key"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.metadata().attempt_count, 1);
        assert_eq!(result.error().unwrap().kind, ErrorKind::Authentication);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_attempted_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let r = resilience(retry_config(3, 10, 100), CircuitBreakerConfig::default());

        let result = r
            .execute("op", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow!("invalid input: prompt is empty"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.error().unwrap().code(), "VALIDATION_ERROR");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_only_after_primary_exhausted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = resilience(retry_config(3, 10, 100), CircuitBreakerConfig::default());

        let primary = || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("primary");
                Err::<&str, _>(anyhow!("503 service unavailable"))
            }
        };
        let fallback = || {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("fallback");
                Ok::<_, anyhow::Error>("from fallback")
            }
        };

        let result = r
            .execute_with_retry_and_circuit_breaker("generate:story_content", primary, Some(fallback))
            .await;

        assert!(result.is_success());
        assert!(result.metadata().fallback_used);
        assert_eq!(result.metadata().attempt_count, 4);
        assert_eq!(result.data(), Some(&"from fallback"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["primary", "primary", "primary", "fallback"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_not_used_when_primary_succeeds() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let r = resilience(retry_config(3, 10, 100), CircuitBreakerConfig::default());

        let result = r
            .execute_with_retry_and_circuit_breaker(
                "op",
                || async { Ok::<_, anyhow::Error>(1) },
                Some(|| {
                    let calls = Arc::clone(&fallback_calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, anyhow::Error>(2)
                    }
                }),
            )
            .await;

        assert_eq!(result.into_result().unwrap(), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_after_is_honored() {
        assert_eq!(
            classify(anyhow!("rate limit exceeded, retry after 5")).kind,
            ErrorKind::RateLimit {
                retry_after: Some(Duration::from_millis(5000))
            }
        );

        let stamps = Arc::new(Mutex::new(Vec::new()));
        let r = resilience(retry_config(3, 100, 1000), CircuitBreakerConfig::default());

        let result = r
            .execute("op", || {
                let stamps = Arc::clone(&stamps);
                async move {
                    let mut stamps = stamps.lock().unwrap();
                    stamps.push(Instant::now());
                    if stamps.len() == 1 {
                        Err(anyhow!("rate limit exceeded, retry after 5"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert!(result.is_success());
        let stamps = stamps.lock().unwrap().clone();
        assert_eq!(stamps.len(), 2);
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_survives_error_context() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let r = resilience(retry_config(3, 100, 1000), CircuitBreakerConfig::default());

        let result = r
            .execute("op", || {
                let stamps = Arc::clone(&stamps);
                async move {
                    let mut stamps = stamps.lock().unwrap();
                    stamps.push(Instant::now());
                    if stamps.len() == 1 {
                        Err(anyhow!("rate limit exceeded, retry after 5")
                            .context("openai request failed"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert!(result.is_success());
        let stamps = stamps.lock().unwrap().clone();
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast_across_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (sink, mut events) = ChannelEventSink::new();
        let breaker = Arc::new(
            CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout_ms: 60_000,
            })
            .unwrap()
            .with_event_sink(Arc::new(sink.clone())),
        );
        let retry = RetryExecutor::new(retry_config(1, 10, 100), breaker)
            .unwrap()
            .with_event_sink(Arc::new(sink));
        let r = Resilience::from_executor(retry);

        let failing = || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow!("network unreachable"))
            }
        };

        r.execute("op", &failing).await;
        let second = r.execute("op", &failing).await;
        assert_eq!(second.metadata().circuit_breaker_state, CircuitState::Open);

        let third = r.execute("op", &failing).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.metadata().attempt_count, 0);
        assert_eq!(third.error().unwrap().code(), "SERVICE_UNAVAILABLE");

        let names: Vec<EventName> = drain_events(&mut events).into_iter().map(|e| e.name).collect();
        assert!(names.contains(&EventName::CircuitStateChanged));
        assert!(names.contains(&EventName::CircuitRejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_primary_does_not_starve_fallback() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let r = resilience(
            retry_config(1, 10, 100),
            CircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout_ms: 60_000,
            },
        );

        let primary = || {
            let calls = Arc::clone(&primary_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u8, _>(anyhow!("connection reset"))
            }
        };
        let fallback = || async { Ok::<_, anyhow::Error>(7u8) };

        for _ in 0..3 {
            let result = r
                .execute_with_retry_and_circuit_breaker("op", &primary, Some(&fallback))
                .await;
            assert_eq!(result.into_result().unwrap(), 7);
        }

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.circuit_state("op"), CircuitState::Open);
        assert_eq!(r.circuit_state("op:fallback"), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_circuit_recovers_through_half_open_trial() {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(
            CircuitBreaker::with_clock(
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    recovery_timeout_ms: 1000,
                },
                clock.clone(),
            )
            .unwrap(),
        );
        let r = Resilience::from_executor(RetryExecutor::new(retry_config(1, 10, 100), breaker).unwrap());

        let failed = r.execute("op", || async { Err::<(), _>(anyhow!("network down")) }).await;
        assert_eq!(failed.metadata().circuit_breaker_state, CircuitState::Open);

        let rejected = r.execute("op", || async { Ok::<_, anyhow::Error>(()) }).await;
        assert_eq!(rejected.metadata().attempt_count, 0);

        clock.advance(Duration::from_millis(1000));
        let recovered = r.execute("op", || async { Ok::<_, anyhow::Error>(()) }).await;
        assert!(recovered.is_success());
        assert_eq!(recovered.metadata().circuit_breaker_state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_half_open_trial_does_not_wedge_circuit() {
        let clock = Arc::new(ManualClock::new());
        let breaker = Arc::new(
            CircuitBreaker::with_clock(
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    recovery_timeout_ms: 100,
                },
                clock.clone(),
            )
            .unwrap(),
        );
        let r = Resilience::from_executor(RetryExecutor::new(retry_config(1, 10, 100), breaker).unwrap());

        r.execute("op", || async { Err::<(), _>(anyhow!("network down")) }).await;
        assert_eq!(r.circuit_state("op"), CircuitState::Open);

        // The caller gives up on the trial call long before it answers
        clock.advance(Duration::from_millis(100));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            r.execute("op", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, anyhow::Error>(())
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(r.circuit_state("op"), CircuitState::Open);

        clock.advance(Duration::from_millis(100));
        let recovered = r.execute("op", || async { Ok::<_, anyhow::Error>(()) }).await;
        assert!(recovered.is_success());
        assert_eq!(recovered.metadata().attempt_count, 1);
        assert_eq!(r.circuit_state("op"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_ledger_covers_primary_and_fallback() {
        let r = resilience(retry_config(2, 10, 100), CircuitBreakerConfig::default());

        let result = r
            .execute_with_retry_and_circuit_breaker(
                "op",
                || async { Err::<u32, _>(anyhow!("connection refused")) },
                Some(|| async { Ok::<_, anyhow::Error>(7) }),
            )
            .await;

        let metadata = result.metadata();
        assert_eq!(metadata.attempts.len() as u32, metadata.attempt_count);

        let operations: Vec<&str> =
            metadata.attempts.iter().map(|a| a.operation.as_str()).collect();
        assert_eq!(operations, vec!["op", "op", "op:fallback"]);
        let indexes: Vec<u32> = metadata.attempts.iter().map(|a| a.attempt).collect();
        assert_eq!(indexes, vec![1, 2, 1]);

        let network = classify(anyhow!("connection refused")).kind;
        assert_eq!(metadata.attempts[0].error, Some(network));
        assert_eq!(metadata.attempts[1].error, Some(network));
        assert!(metadata.attempts[2].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_share_the_correlation_id() {
        let (sink, mut events) = ChannelEventSink::new();
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()).unwrap());
        let retry = RetryExecutor::new(retry_config(2, 10, 100), breaker)
            .unwrap()
            .with_event_sink(Arc::new(sink));
        let r = Resilience::from_executor(retry);

        let result = r
            .execute_with_retry_and_circuit_breaker(
                "op",
                || async { Err::<(), _>(anyhow!("server error")) },
                Some(|| async { Err::<(), _>(anyhow!("server error")) }),
            )
            .await;

        let correlation_id = result.metadata().correlation_id.clone();
        let events = drain_events(&mut events);
        let retries = events.iter().filter(|e| e.name == EventName::RetryAttempt).count();
        assert_eq!(retries, 4);
        assert!(events.iter().any(|e| e.name == EventName::FallbackTriggered));
        assert!(events
            .iter()
            .all(|e| e.correlation_id.as_deref() == Some(correlation_id.as_str())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_base_delay_still_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = RetryConfig {
            jitter_factor: 0.5,
            ..retry_config(3, 0, 0)
        };
        let r = resilience(config, CircuitBreakerConfig::default());

        r.execute("op", || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow!("network down"))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
