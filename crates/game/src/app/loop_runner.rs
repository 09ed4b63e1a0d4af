use std::process::ExitCode;

use skool_engine::{run_simulation, RunSummary};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let summary = match run_simulation(&app.config) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match render_summary(&summary) {
        Ok(json) => {
            println!("{json}");
            info!(
                ticks_run = summary.ticks_run,
                bells_rung = summary.bells_rung,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "summary_serialize_failed");
            ExitCode::FAILURE
        }
    }
}

fn render_summary(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}

#[cfg(test)]
mod tests {
    use skool_engine::{compile_content_from_str, run_content, LoopConfig, MetricsHandle};

    use super::*;

    #[test]
    fn summary_renders_as_json_with_world_state() {
        let database = compile_content_from_str(
            r#"<Defs>
                <Floor id="Bottom" y="10" minX="0" maxX="20"/>
                <Door id="Gate" x="15" topY="8" bottomY="10"/>
                <Character id="ERIC" kind="Eric" at="2,10" script="Wander"/>
                <CommandList id="Wander">
                    <Command kind="GoToXY" args="6 10"/>
                    <Command kind="ShutDoor" args="Gate"/>
                    <Command kind="SitStill"/>
                </CommandList>
            </Defs>"#,
        )
        .expect("compile");
        let config = LoopConfig {
            ticks: 20,
            ..LoopConfig::default()
        };
        let summary = run_content(&database, &config, &MetricsHandle::default());

        let json = render_summary(&summary).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse back");
        assert_eq!(value["ticks_run"], 20);
        assert_eq!(value["world"]["characters"][0]["id"], "ERIC");
        assert_eq!(value["world"]["characters"][0]["location"]["x"], 6);
        assert_eq!(value["world"]["doors"][0]["shut"], true);
        assert_eq!(value["content_fingerprint"], database.fingerprint.as_str());
    }
}
