//! Cross-device fan-out: re-execute tagged phases once per device profile.
//!
//! The fan-out reuses the one shared session, resizing its viewport per
//! device and restoring the original size before returning — including on
//! the error path, so a failed device pass never leaks a mobile viewport
//! into the next scenario.

use anyhow::{Context, Result};
use tracing::debug;

use crate::catalog::ScenarioDefinition;
use crate::executor::{PhaseContext, PhaseResult, execute_phase};

/// Re-execute every `cross-device` phase of the scenario per device profile,
/// sequentially on the shared session.
///
/// Honors zero-tolerance mode: a FAILED device phase stops the fan-out the
/// same way it stops the primary phase loop.
pub async fn run_for_devices(
    ctx: &PhaseContext<'_>,
    scenario: &ScenarioDefinition,
) -> Result<Vec<PhaseResult>> {
    let tagged = scenario.device_tagged_phases();
    if tagged.is_empty() || scenario.devices.is_empty() {
        return Ok(Vec::new());
    }

    let original = ctx
        .driver
        .viewport()
        .await
        .context("Failed to read viewport before device fan-out")?;

    let outcome = drive_devices(ctx, scenario).await;

    // Restore the shared viewport regardless of how the fan-out ended.
    let restore = ctx.driver.set_viewport(original).await;

    let mut results = outcome?;
    restore.context("Failed to restore viewport after device fan-out")?;

    debug!(
        scenario = %scenario.id,
        phases = results.len(),
        "device fan-out complete"
    );
    results.shrink_to_fit();
    Ok(results)
}

async fn drive_devices(
    ctx: &PhaseContext<'_>,
    scenario: &ScenarioDefinition,
) -> Result<Vec<PhaseResult>> {
    let mut results = Vec::new();

    'devices: for device in &scenario.devices {
        ctx.driver
            .set_viewport(device.viewport)
            .await
            .with_context(|| format!("Failed to set viewport for device {}", device.name))?;
        tokio::time::sleep(ctx.config.settle_delay).await;
        debug!(device = %device.name, viewport = %device.viewport, "device pass");

        for phase in scenario.device_tagged_phases() {
            let device_ctx = PhaseContext {
                driver: ctx.driver,
                recorder: ctx.recorder,
                monitor: ctx.monitor,
                config: ctx.config,
                device: Some(device),
            };
            let result = execute_phase(&device_ctx, phase).await;
            let failed = result.is_failed();
            results.push(result);

            if failed && ctx.config.zero_tolerance {
                debug!(device = %device.name, "zero-tolerance stop in device fan-out");
                break 'devices;
            }
        }
    }

    Ok(results)
}
