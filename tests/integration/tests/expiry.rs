//! Periodic eviction of expired assertions.

use std::sync::Arc;
use std::time::Duration;

use sts_core::ValidationFailure;
use sts_integration_tests::StsFixture;
use sts_registry::{ExpiryScheduler, Sweep, TokenRegistrySweep};

#[tokio::test(start_paused = true)]
async fn scheduler_evicts_expired_assertions() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    let mut alice = fx.issue("alice")?;
    fx.issue("bob")?;

    let tokens = Arc::clone(fx.provider.store().tokens());
    assert_eq!(tokens.len(), 2);

    let sweep: Arc<dyn Sweep> = Arc::new(TokenRegistrySweep::new(tokens.clone(), fx.clock.clone()));
    let scheduler = ExpiryScheduler::new(Duration::from_secs(1), vec![sweep]);
    scheduler.start()?;

    // Still inside the window at the first tick.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(tokens.len(), 2);

    fx.clock.advance_millis(7_000);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(tokens.is_empty());

    let err = fx
        .sts
        .validate_token(&fx.caller(), &mut alice)
        .expect_err("evicted assertion validated");
    assert_eq!(err.validation_failure(), Some(ValidationFailure::Expired));

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    Ok(())
}

#[test]
fn sweep_keeps_live_assertions() -> anyhow::Result<()> {
    let fx = StsFixture::new()?;
    fx.issue("alice")?;
    fx.clock.advance_millis(3_000);
    fx.issue("bob")?;

    let tokens = Arc::clone(fx.provider.store().tokens());
    let sweeps: Vec<Arc<dyn Sweep>> =
        vec![Arc::new(TokenRegistrySweep::new(tokens.clone(), fx.clock.clone()))];
    let scheduler = ExpiryScheduler::new(Duration::from_secs(60), sweeps);

    fx.clock.advance_millis(4_500);
    assert_eq!(scheduler.run_once(), 1);
    assert_eq!(tokens.len(), 1);
    Ok(())
}
