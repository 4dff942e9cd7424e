//! # Example: page_transition
//!
//! One simulated page change, start to finish.
//!
//! Demonstrates how to:
//! - Build a [`Stage`] around an in-memory surface and a timed effect factory.
//! - Attach [`LogWriter`] and print every event through `tracing`.
//! - Drive the navigation machine through a full exit/enter cycle.
//! - Watch one broken element degrade to a plain reveal.
//!
//! ## Flow
//! ```text
//! set_state(Navigating)
//!   ├─► play_exit(old cards)   ── Navigating → AnimatingExit
//!   ├─► remove_many(old) / append_many(new)   (scheduler, batch)
//!   ├─► set_state(AnimatingEnter)
//!   ├─► play_enter(new cards)  ── batches of 6, staggered; card 13 fails → revealed
//!   └─► set_state(Idle)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example page_transition --features logging
//! ```

use std::sync::{Arc, Mutex};

use stagehand::{
    AnimationConfig, AnimationOverrides, EffectFactory, EffectRef, ElementId, ElementPatch,
    Failure, LogWriter, NavState, Phase, Stage, Surface, TaskOptions, TimedEffect,
};

/// Surface that only remembers what happened to each element.
#[derive(Default)]
struct Page {
    log: Mutex<Vec<String>>,
}

impl Page {
    fn record(&self, line: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(line);
        }
    }
}

impl Surface for Page {
    fn append(&self, parent: ElementId, child: ElementId) -> Result<(), Failure> {
        self.record(format!("append {child} -> {parent}"));
        Ok(())
    }

    fn remove(&self, element: ElementId) -> Result<(), Failure> {
        self.record(format!("remove {element}"));
        Ok(())
    }

    fn patch(&self, element: ElementId, _: &ElementPatch) -> Result<(), Failure> {
        self.record(format!("patch {element}"));
        Ok(())
    }

    fn query(&self, _: &str) -> Result<Vec<ElementId>, Failure> {
        Ok(Vec::new())
    }

    fn reveal(&self, element: ElementId) -> Result<(), Failure> {
        self.record(format!("reveal {element}"));
        Ok(())
    }
}

/// Timed effects; card 13 has broken keyframes.
struct Cards;

impl EffectFactory for Cards {
    fn create(
        &self,
        element: ElementId,
        _: Phase,
        cfg: &AnimationConfig,
    ) -> Result<EffectRef, Failure> {
        if element == ElementId(13) {
            return Err(Failure::new("invalid keyframes"));
        }
        Ok(TimedEffect::start(cfg.duration))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let page = Arc::new(Page::default());
    let stage = Stage::builder()
        .with_surface(page.clone())
        .with_effects(Arc::new(Cards))
        .build()?;
    let _log = LogWriter::attach(stage.events());

    let old: Vec<ElementId> = (0..4).map(ElementId).collect();
    let new: Vec<ElementId> = (10..22).map(ElementId).collect();
    let root = ElementId(1000);

    stage.navigation().set_state(NavState::Navigating, Default::default())?;
    let exit = stage
        .orchestrator()
        .play_exit(&old, AnimationOverrides::new())
        .await;
    println!("[exit] {exit:?}");

    stage.scheduler().remove_many(old, TaskOptions::new())?;
    stage.scheduler().append_many(root, new.clone(), TaskOptions::new())?;
    stage.scheduler().wait_idle().await;

    stage.navigation().set_state(NavState::AnimatingEnter, Default::default())?;
    let enter = stage
        .orchestrator()
        .play_enter(&new, AnimationOverrides::new())
        .await;
    println!("[enter] {enter:?}");
    stage.scheduler().wait_idle().await;
    stage.navigation().set_state(NavState::Idle, Default::default())?;

    println!("[state] {}", stage.navigation().state());
    println!("[stats] {:?}", stage.scheduler().stats());
    println!("[surface] {} operations", page.log.lock().map(|l| l.len()).unwrap_or(0));
    for t in stage.navigation().history() {
        println!("[history] {} -> {}", t.from, t.to);
    }
    Ok(())
}
