use anyhow::Context;
use recordflow::engine::{ControlCommand, ControlResponse, Pipeline};
use recordflow::observability::init_tracing;
use recordflow::{ComponentRegistry, PipelineConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: recordflow <pipeline.json>")?;

    let config = PipelineConfig::load(&path)
        .with_context(|| format!("failed to load pipeline config from {}", path))?;
    init_tracing(&config.logging)?;

    let registry = ComponentRegistry::with_builtins();
    let mut pipeline = Pipeline::from_config(&config, &registry)?;
    pipeline.start().await?;

    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut console_open = true;

    let faulted = loop {
        tokio::select! {
            _ = pipeline.wait_for_fault(config.supervise_interval()) => break true,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping");
                break false;
            }
            line = console.next_line(), if console_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        console_open = false;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("control console closed: {}", e);
                        console_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<ControlCommand>(&line) {
                    Ok(command) => pipeline.handle_control(command),
                    Err(e) => ControlResponse::error(format!("bad command: {}", e)),
                };
                stdout.write_all(response.to_line().as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
    };

    for condition in pipeline.context().exceptions().exception_list() {
        tracing::error!("{}", condition);
    }
    if faulted {
        pipeline.abort().await?;
    } else {
        pipeline.stop().await?;
    }
    print!("{}", pipeline.report());

    pipeline.context().exceptions().rethrow_exception()?;
    Ok(())
}
