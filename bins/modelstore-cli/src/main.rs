use anyhow::Context;
use modelstore_core::{Observer, Path, Store, StoreError, UpdateRef};
use modelstore_protocol::{decode_script, encode_report, read_paths, run_batch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs the value at a watched path each time it changes.
struct WatchObserver {
    path: Path,
}

impl Observer for WatchObserver {
    fn notify(&mut self, store: &mut Store, updates: &[UpdateRef]) -> Result<(), StoreError> {
        let kinds: Vec<String> = updates.iter().map(|u| u.kind().to_string()).collect();
        if self.path.is_field() {
            let fields = store.get(&self.path, None)?;
            tracing::info!(path = %self.path, ?fields, ?kinds, "Watched fields changed");
            return Ok(());
        }
        let value = store.get_value(&self.path, None)?;
        let rendered = value.map(|v| v.to_json()).unwrap_or(serde_json::Value::Null);
        tracing::info!(path = %self.path, value = %rendered, ?kinds, "Watched value changed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,modelstore_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(script_path) = std::env::args().nth(1) else {
        anyhow::bail!("usage: modelstore <script.json>");
    };
    let text = std::fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read {}", script_path))?;
    let script = decode_script(&text).with_context(|| format!("invalid script {}", script_path))?;

    tracing::info!(
        script = %script_path,
        batches = script.batches.len(),
        watches = script.watch.len(),
        "Running script"
    );

    let mut store = Store::with_config(script.config.clone());
    for path in &script.watch {
        let observer = store.register_observer(Box::new(WatchObserver { path: path.clone() }));
        store.add_observer(&observer, path)?;
    }

    for (index, batch) in script.batches.iter().enumerate() {
        let report = run_batch(&mut store, index, batch);
        for rejection in &report.rejected {
            tracing::warn!(batch = index, request = rejection.index, error = %rejection.error, "Request rejected");
        }
        for failure in &report.failures {
            tracing::warn!(
                batch = index,
                observer = %failure.observer,
                iteration = failure.iteration,
                error = %failure.error,
                "Observer failed"
            );
        }
        println!("{}", encode_report(&report)?);
    }

    let reads = read_paths(&mut store, &script.reads);
    println!("{}", serde_json::to_string_pretty(&reads)?);

    tracing::info!("Script complete");
    Ok(())
}
